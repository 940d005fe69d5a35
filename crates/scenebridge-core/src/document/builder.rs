//! Document builder
//!
//! An external parser drives a [`DocumentBuilder`] through callbacks in
//! document order: namespace imports first, then depth-first object creation
//! and member assignment. The builder turns each callback into bridge calls
//! and keeps every created object alive until [`DocumentBuilder::finish`].

use super::error::{BuildError, BuildResult};
use super::namespaces::NamespaceTable;
use super::probe::{Member, MemberProbe};
use crate::bridge::Bridge;
use crate::error::ConversionError;
use crate::events::{panic_message, EventHandler};
use crate::object::{ObjectRef, WeakObjectRef};
use crate::types::{builtins, Converter, ModuleResolver, TypeCategory, TypeRef, TypeRefExt};
use crate::value::convert::parse_text;
use crate::value::Value;
use rustc_hash::FxHashMap;
use scenebridge_sdk::{NativeHandle, TypeTag, WireValue};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Builder state, as of the last callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// No callback received yet
    Idle,
    /// Last callback created an object
    BuildingObject,
    /// Last callback assigned a member
    SettingProperty,
    /// Last callback imported a namespace
    ResolvingNamespace,
}

/// Per-parse data shared with the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallbackFrame {
    /// First object created by the document
    pub top_level: NativeHandle,
    /// Parser's opaque handle
    pub parser: u64,
    /// Parser flags
    pub flags: u32,
}

impl CallbackFrame {
    /// The parser is applying a property it postponed until after the
    /// element's children
    pub const SETTING_DELAYED_PROPERTY: u32 = 2;

    /// Frame for a parser
    pub fn new(parser: u64) -> Self {
        Self {
            top_level: NativeHandle::NULL,
            parser,
            flags: 0,
        }
    }

    /// Check if a postponed property is being applied
    pub fn is_setting_delayed_property(&self) -> bool {
        self.flags & Self::SETTING_DELAYED_PROPERTY != 0
    }
}

enum Markup<'a> {
    Text(&'a str),
    StaticResource(&'a str),
}

fn markup(text: &str) -> Markup<'_> {
    if let Some(escaped) = text.strip_prefix("{}") {
        return Markup::Text(escaped);
    }
    let trimmed = text.trim();
    if let Some(inner) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if let Some(("StaticResource", key)) = inner.trim().split_once(char::is_whitespace) {
            return Markup::StaticResource(key.trim());
        }
    }
    Markup::Text(text)
}

/// Content property of `ty`: declared on the type or a base, else a
/// property named `Content`
pub fn content_property_name(ty: &TypeRef) -> Option<String> {
    if let Some(name) = ty.declared_content_property() {
        return Some(name.to_string());
    }
    ty.find_property("Content").map(|(_, p)| p.name.clone())
}

/// Builds an object graph from parser callbacks
pub struct DocumentBuilder {
    bridge: Arc<Bridge>,
    resolver: Arc<dyn ModuleResolver>,
    namespaces: NamespaceTable,
    probe: MemberProbe,
    state: BuilderState,
    frame: CallbackFrame,
    top_level: Option<ObjectRef>,
    objects: Vec<ObjectRef>,
    names: FxHashMap<String, ObjectRef>,
    keys: FxHashMap<NativeHandle, String>,
    resources: FxHashMap<String, Value>,
    poisoned: bool,
}

impl DocumentBuilder {
    /// Create a builder resolving types through `resolver`
    pub fn new(bridge: Arc<Bridge>, resolver: Arc<dyn ModuleResolver>) -> Self {
        Self {
            bridge,
            resolver,
            namespaces: NamespaceTable::new(),
            probe: MemberProbe::new(),
            state: BuilderState::Idle,
            frame: CallbackFrame::default(),
            top_level: None,
            objects: Vec::new(),
            names: FxHashMap::default(),
            keys: FxHashMap::default(),
            resources: FxHashMap::default(),
            poisoned: false,
        }
    }

    /// Create a builder for the parser identified by `parser`
    pub fn with_parser(bridge: Arc<Bridge>, resolver: Arc<dyn ModuleResolver>, parser: u64) -> Self {
        let mut builder = Self::new(bridge, resolver);
        builder.frame = CallbackFrame::new(parser);
        builder
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// State as of the last callback
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Callback frame
    pub fn frame(&self) -> &CallbackFrame {
        &self.frame
    }

    /// Replace the parser flags
    pub fn set_flags(&mut self, flags: u32) {
        self.frame.flags = flags;
    }

    /// First object created by the document
    pub fn top_level(&self) -> Option<&ObjectRef> {
        self.top_level.as_ref()
    }

    /// Object registered under `name`
    pub fn find_name(&self, name: &str) -> Option<ObjectRef> {
        self.names.get(name).cloned()
    }

    /// Check if a fatal error abandoned the build
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Number of cached member resolutions
    pub fn cached_members(&self) -> usize {
        self.probe.cached()
    }

    /// Finish the build and return the top-level object
    pub fn finish(self) -> BuildResult<Option<ObjectRef>> {
        if self.poisoned {
            return Err(BuildError::Poisoned);
        }
        tracing::debug!(objects = self.objects.len(), names = self.names.len(), "document built");
        Ok(self.top_level)
    }

    fn enter(&mut self, state: BuilderState) -> BuildResult<()> {
        if self.poisoned {
            return Err(BuildError::Poisoned);
        }
        self.state = state;
        Ok(())
    }

    fn settle<T>(&mut self, result: BuildResult<T>) -> BuildResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!(error = %e, state = ?self.state, "document build abandoned");
                self.poisoned = true;
            } else {
                tracing::debug!(error = %e, state = ?self.state, "callback failed");
            }
        }
        result
    }

    // ========================================================================
    // Parser Callbacks
    // ========================================================================

    /// Bind `prefix` (empty for the default namespace) to `uri`
    pub fn import_namespace(&mut self, prefix: &str, uri: &str) -> BuildResult<()> {
        self.enter(BuilderState::ResolvingNamespace)?;
        tracing::debug!(prefix, uri, "import namespace");
        let result = self.namespaces.import(prefix, uri, self.resolver.as_ref());
        self.settle(result)
    }

    /// Create an object of type `type_name` from the namespace `namespace`
    /// (the default namespace when empty); returns it as an object value
    pub fn create_object(&mut self, namespace: &str, type_name: &str) -> BuildResult<WireValue> {
        self.enter(BuilderState::BuildingObject)?;
        tracing::debug!(namespace, type_name, "create object");
        let result = self.construct(namespace, type_name);
        self.settle(result)
    }

    /// Assign `value` to the member `name` of `target`
    pub fn set_property(&mut self, target: NativeHandle, name: &str, value: WireValue) -> BuildResult<()> {
        self.enter(BuilderState::SettingProperty)?;
        tracing::debug!(%target, name, "set property");
        let result = self.assign_wire(target, name, &value);
        self.settle(result)
    }

    /// Add `child` to `parent` through its content property, or as an item
    /// when `parent` is itself a collection
    pub fn add_child(&mut self, parent: NativeHandle, child: WireValue) -> BuildResult<()> {
        self.enter(BuilderState::SettingProperty)?;
        let result = self.append_child(parent, &child);
        self.settle(result)
    }

    /// Content property name of the object `target`
    pub fn get_content_property_name(&mut self, target: NativeHandle) -> BuildResult<Option<String>> {
        if self.poisoned {
            return Err(BuildError::Poisoned);
        }
        let result = self
            .bridge
            .lookup_or_create(target)
            .map(|object| content_property_name(object.managed_type()))
            .map_err(BuildError::from);
        self.settle(result)
    }

    // ========================================================================
    // Object Creation
    // ========================================================================

    fn construct(&mut self, namespace: &str, type_name: &str) -> BuildResult<WireValue> {
        let uri = if namespace.is_empty() {
            self.namespaces.uri("")?.to_string()
        } else {
            namespace.to_string()
        };
        let mut ty = self.namespaces.find_type(&uri, type_name, self.resolver.as_ref())?;
        if ty.is_none() {
            ty = self.top_level.as_ref().and_then(|top| {
                self.resolver
                    .resolve_module(top.managed_type().module())
                    .and_then(|module| module.find_by_name(type_name))
            });
        }
        let ty = ty.ok_or_else(|| BuildError::UnknownType {
            namespace: uri.clone(),
            name: type_name.to_string(),
        })?;
        if !ty.is_constructible() {
            return Err(BuildError::NotConstructible(ty.full_name().to_string()));
        }

        let bridge = &self.bridge;
        let object = match panic::catch_unwind(AssertUnwindSafe(|| bridge.create_object(&ty))) {
            Ok(object) => object?,
            Err(payload) => {
                tracing::error!(type_name = ty.full_name(), message = %panic_message(payload.as_ref()), "constructor panicked");
                return Err(BuildError::ConstructorFailed(ty.full_name().to_string()));
            }
        };

        let wire = WireValue::object(object.type_tag(), object.handle());
        if self.top_level.is_none() {
            self.frame.top_level = object.handle();
            self.top_level = Some(object.clone());
        }
        self.objects.push(object);
        Ok(wire)
    }

    // ========================================================================
    // Member Assignment
    // ========================================================================

    fn assign_wire(&mut self, target: NativeHandle, name: &str, wire: &WireValue) -> BuildResult<()> {
        let object = self.bridge.lookup_or_create(target)?;
        let value = self.bridge.codec().decode(None, wire)?;
        self.assign(&object, name, value)
    }

    fn assign(&mut self, object: &ObjectRef, name: &str, value: Value) -> BuildResult<()> {
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", name),
        };
        if !prefix.is_empty() && self.namespaces.is_directive_prefix(prefix) {
            return self.apply_directive(object, local, value);
        }
        if let Some((owner, member)) = local.split_once('.') {
            return self.assign_attached(object, prefix, owner, member, value);
        }

        let ty = object.managed_type().clone();
        let candidates = self.probe.candidates(&ty, local).to_vec();
        let mut deferred = None;
        for member in candidates {
            match member {
                Member::Property { ty, converter, .. } => {
                    match self.assign_property(object, local, &ty, converter.as_ref(), value.clone()) {
                        Ok(()) => return Ok(()),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => deferred = Some(e),
                    }
                }
                Member::Event { .. } => {
                    let Some(handler) = value.as_str() else {
                        continue;
                    };
                    match self.hook_event(object, local, handler) {
                        Ok(()) => return Ok(()),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => deferred = Some(e),
                    }
                }
                Member::Attached { owner, ty, converter } => {
                    let assigned = match self.convert(&ty, converter.as_ref(), value.clone()) {
                        Ok(converted) => self
                            .bridge
                            .set_attached(&owner, local, object, converted)
                            .map_err(BuildError::from),
                        Err(e) => Err(e),
                    };
                    match assigned {
                        Ok(()) => return Ok(()),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => deferred = Some(e),
                    }
                }
            }
        }
        Err(deferred.unwrap_or_else(|| BuildError::UnknownMember {
            type_name: ty.full_name().to_string(),
            member: name.to_string(),
        }))
    }

    fn apply_directive(&mut self, object: &ObjectRef, directive: &str, value: Value) -> BuildResult<()> {
        match directive {
            "Name" => {
                let name = directive_text(&value, "Name")?;
                self.register_name(&name, object)?;
                if object.managed_type().find_property("Name").is_some() {
                    self.bridge.set_value(object, "Name", Value::String(name))?;
                }
            }
            "Key" => {
                let key = directive_text(&value, "Key")?;
                self.keys.insert(object.handle(), key);
            }
            other => tracing::debug!(directive = other, "ignoring directive"),
        }
        Ok(())
    }

    fn assign_attached(
        &mut self,
        object: &ObjectRef,
        prefix: &str,
        owner: &str,
        member: &str,
        value: Value,
    ) -> BuildResult<()> {
        let uri = self.namespaces.uri(prefix)?.to_string();
        let owner_ty = self
            .namespaces
            .find_type(&uri, owner, self.resolver.as_ref())?
            .ok_or_else(|| BuildError::UnknownType {
                namespace: uri.clone(),
                name: owner.to_string(),
            })?;
        let Some((_, attached)) = owner_ty.find_attached(member) else {
            return Err(BuildError::UnknownMember {
                type_name: owner_ty.full_name().to_string(),
                member: member.to_string(),
            });
        };
        let (ty, converter) = (attached.ty.clone(), attached.converter.clone());
        let converted = self.convert(&ty, converter.as_ref(), value)?;
        self.bridge.set_attached(&owner_ty, member, object, converted)?;
        Ok(())
    }

    fn assign_property(
        &mut self,
        object: &ObjectRef,
        name: &str,
        ty: &TypeRef,
        converter: Option<&Converter>,
        value: Value,
    ) -> BuildResult<()> {
        if ty.is_list() && !is_list_like(&value) {
            let list = self.member_collection(object, name, ty)?;
            self.bridge.collection_add(&list, &value)?;
            return Ok(());
        }
        if ty.is_dictionary() && !is_dictionary_like(&value) {
            let dictionary = self.member_collection(object, name, ty)?;
            return self.add_entry(&dictionary, value);
        }

        let converted = self.convert(ty, converter, value)?;
        if name == "Name" {
            if let Value::String(s) = &converted {
                self.register_name(s, object)?;
            }
        }
        self.bridge.set_value(object, name, converted)?;
        Ok(())
    }

    fn member_collection(&mut self, object: &ObjectRef, name: &str, ty: &TypeRef) -> BuildResult<ObjectRef> {
        if let Value::Object(existing) = self.bridge.get_value(object, name)? {
            return Ok(existing);
        }
        if !ty.is_constructible() {
            return Err(BuildError::NotConstructible(ty.full_name().to_string()));
        }
        let created = self.bridge.create_object(ty)?;
        self.bridge.set_value(object, name, Value::Object(created.clone()))?;
        tracing::trace!(handle = %object.handle(), member = name, "created collection");
        Ok(created)
    }

    fn add_entry(&mut self, dictionary: &ObjectRef, value: Value) -> BuildResult<()> {
        let key = match &value {
            Value::Object(entry) => self.keys.get(&entry.handle()).cloned(),
            _ => None,
        }
        .ok_or_else(|| BuildError::MissingKey(value.type_name()))?;
        self.bridge.dictionary_add(dictionary, &key, &value)?;
        self.resources.insert(key, value);
        Ok(())
    }

    fn append_child(&mut self, parent: NativeHandle, wire: &WireValue) -> BuildResult<()> {
        let object = self.bridge.lookup_or_create(parent)?;
        let value = self.bridge.codec().decode(None, wire)?;
        let ty = object.managed_type().clone();
        if let Some(name) = content_property_name(&ty) {
            return self.assign(&object, &name, value);
        }
        if ty.is_list() {
            self.bridge.collection_add(&object, &value)?;
            return Ok(());
        }
        if ty.is_dictionary() {
            return self.add_entry(&object, value);
        }
        Err(BuildError::NoContentProperty(ty.full_name().to_string()))
    }

    fn register_name(&mut self, name: &str, object: &ObjectRef) -> BuildResult<()> {
        match self.names.get(name) {
            Some(existing) if Arc::ptr_eq(existing, object) => Ok(()),
            Some(_) => Err(BuildError::DuplicateName(name.to_string())),
            None => {
                self.names.insert(name.to_string(), object.clone());
                Ok(())
            }
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribe the handler method `handler` to `event` on `target`. The
    /// method is looked up on the top-level object's type first, then on the
    /// target's.
    fn hook_event(&mut self, target: &ObjectRef, event: &str, handler: &str) -> BuildResult<()> {
        let found = self
            .top_level
            .iter()
            .chain(std::iter::once(target))
            .find_map(|owner| {
                owner
                    .managed_type()
                    .find_method(handler)
                    .map(|method| (Arc::downgrade(owner), method.invoke.clone()))
            });
        let Some((owner, invoke)) = found else {
            return Err(BuildError::UnknownHandler {
                event: event.to_string(),
                handler: handler.to_string(),
            });
        };

        let owner: WeakObjectRef = owner;
        let callback: EventHandler = Arc::new(move |sender: &ObjectRef, args: &Value| match owner.upgrade() {
            Some(owner) => invoke(&owner, sender, args),
            None => Ok(()),
        });
        self.bridge.subscribe_handler(target, event, callback)?;
        tracing::debug!(handle = %target.handle(), event, handler, "hooked event");
        Ok(())
    }

    // ========================================================================
    // String Conversion
    // ========================================================================

    fn convert(&mut self, ty: &TypeRef, converter: Option<&Converter>, value: Value) -> BuildResult<Value> {
        match value {
            Value::String(text) => self.convert_text(ty, converter, &text),
            other => Ok(other),
        }
    }

    /// Resource lookups, then the member converter, the type converter, the
    /// built-in parsers, the brush shorthand, and the native parser
    fn convert_text(&mut self, ty: &TypeRef, converter: Option<&Converter>, text: &str) -> BuildResult<Value> {
        let text = match markup(text) {
            Markup::StaticResource(key) => return self.lookup_resource(key),
            Markup::Text(text) => text,
        };
        if let Some(converter) = converter {
            return Ok(converter(text)?);
        }
        if let Some(converter) = ty.converter() {
            return Ok(converter(text)?);
        }
        let error = match parse_text(ty, text) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if let Some(brush) = self.brush_shorthand(ty, text)? {
            return Ok(brush);
        }
        if let Some(value) = self.native_parse(ty, text)? {
            return Ok(value);
        }
        Err(BuildError::Conversion(error))
    }

    fn brush_shorthand(&mut self, ty: &TypeRef, text: &str) -> BuildResult<Option<Value>> {
        let b = builtins();
        if matches!(ty.category(), TypeCategory::Any) || !b.solid_color_brush.is_subtype_of(ty) {
            return Ok(None);
        }
        let Ok(color) = parse_text(&b.color, text) else {
            return Ok(None);
        };
        let brush = self.bridge.create_object(&b.solid_color_brush)?;
        self.bridge.set_value(&brush, "Color", color)?;
        Ok(Some(Value::Object(brush)))
    }

    fn native_parse(&self, ty: &TypeRef, text: &str) -> BuildResult<Option<Value>> {
        let tag = match ty.category() {
            TypeCategory::Value(tag) => *tag,
            _ => match self.bridge.registry().tag_of(ty) {
                Ok(tag) => tag,
                Err(_) => return Ok(None),
            },
        };
        if tag == TypeTag::INVALID {
            return Ok(None);
        }
        match self.bridge.engine().parse_value(tag, text) {
            Some(wire) => Ok(Some(self.bridge.codec().decode(Some(ty), &wire)?)),
            None => Ok(None),
        }
    }

    fn lookup_resource(&self, key: &str) -> BuildResult<Value> {
        if let Some(value) = self.resources.get(key) {
            return Ok(value.clone());
        }
        if let Some(top) = &self.top_level {
            if top.managed_type().find_property("Resources").is_some() {
                if let Value::Object(dictionary) = self.bridge.get_value(top, "Resources")? {
                    if let Some(value) = self.bridge.dictionary_get(&dictionary, key)? {
                        return Ok(value);
                    }
                }
            }
        }
        Err(BuildError::UnknownResource(key.to_string()))
    }
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("state", &self.state)
            .field("frame", &self.frame)
            .field("objects", &self.objects.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

fn directive_text(value: &Value, directive: &str) -> BuildResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConversionError::from_text(directive, value.type_name()).into())
}

fn is_list_like(value: &Value) -> bool {
    matches!(value, Value::Object(o) if o.managed_type().is_list())
}

fn is_dictionary_like(value: &Value) -> bool {
    matches!(value, Value::Object(o) if o.managed_type().is_dictionary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{self, HeadlessEngine};
    use crate::object::NativeObject;
    use crate::types::{builtins::PRESENTATION_XMLNS, ManagedType, Module, ModuleSet, PropertyDesc};
    use crate::value::{Color, Thickness};
    use scenebridge_sdk::{NativeEngine, WirePayload};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn builder() -> (Arc<HeadlessEngine>, Arc<Bridge>, DocumentBuilder) {
        let (engine, bridge) = headless::connect();
        let builder = DocumentBuilder::new(bridge.clone(), Arc::new(ModuleSet::new()));
        (engine, bridge, builder)
    }

    fn handle(wire: &WireValue) -> NativeHandle {
        match wire.payload {
            WirePayload::Object(h) => h,
            _ => panic!("not an object: {:?}", wire),
        }
    }

    #[test]
    fn test_first_object_is_top_level() {
        let (_engine, _bridge, mut builder) = builder();
        assert_eq!(builder.state(), BuilderState::Idle);
        builder.import_namespace("", PRESENTATION_XMLNS).unwrap();
        assert_eq!(builder.state(), BuilderState::ResolvingNamespace);

        let canvas = builder.create_object("", "Canvas").unwrap();
        let text = builder.create_object(PRESENTATION_XMLNS, "TextBlock").unwrap();
        assert_eq!(builder.state(), BuilderState::BuildingObject);
        assert_eq!(builder.frame().top_level, handle(&canvas));
        assert_ne!(handle(&canvas), handle(&text));

        let top = builder.finish().unwrap().unwrap();
        assert_eq!(top.managed_type().name(), "Canvas");
    }

    #[test]
    fn test_unknown_type_is_recoverable() {
        let (_engine, _bridge, mut builder) = builder();
        let err = builder.create_object("", "Gizmo").unwrap_err();
        assert!(matches!(err, BuildError::UnknownType { ref name, .. } if name == "Gizmo"));
        assert!(!err.is_fatal());

        let err = builder.create_object("", "Panel").unwrap_err();
        assert!(matches!(err, BuildError::NotConstructible(_)));

        builder.create_object("", "Border").unwrap();
        assert!(builder.finish().unwrap().is_some());
    }

    #[test]
    fn test_string_values_are_converted() {
        let (_engine, bridge, mut builder) = builder();
        let border = handle(&builder.create_object("", "Border").unwrap());
        builder.set_property(border, "Width", WireValue::string("Auto")).unwrap();
        builder.set_property(border, "BorderThickness", WireValue::string("1,2,3,4")).unwrap();
        builder.set_property(border, "Visibility", WireValue::string("Collapsed")).unwrap();
        builder.set_property(border, "Background", WireValue::string("Red")).unwrap();

        let border = bridge.lookup(border).unwrap();
        assert!(bridge.get_value(&border, "Width").unwrap().as_f64().unwrap().is_nan());
        assert_eq!(
            bridge.get_value(&border, "BorderThickness").unwrap(),
            Value::Thickness(Thickness::new(1.0, 2.0, 3.0, 4.0))
        );
        assert_eq!(bridge.get_value(&border, "Visibility").unwrap().as_i32(), Some(1));

        let brush = bridge.get_value(&border, "Background").unwrap();
        let brush = brush.as_object().unwrap();
        assert_eq!(brush.managed_type().name(), "SolidColorBrush");
        assert_eq!(
            bridge.get_value(brush, "Color").unwrap(),
            Value::Color(Color::from_argb(0xFF, 0xFF, 0x00, 0x00))
        );
    }

    #[test]
    fn test_conversion_failure_and_native_parser() {
        let (engine, _bridge, mut builder) = builder();
        let text = handle(&builder.create_object("", "TextBlock").unwrap());

        let err = builder.set_property(text, "FontSize", WireValue::string("huge")).unwrap_err();
        match err {
            BuildError::Conversion(e) => {
                assert_eq!(e.target_type, "System.Double");
                assert_eq!(e.text, "huge");
            }
            other => panic!("unexpected {:?}", other),
        }

        engine.set_value_parser(|tag, text| (tag == TypeTag::DOUBLE && text == "huge").then(|| WireValue::f64(72.0)));
        builder.set_property(text, "FontSize", WireValue::string("huge")).unwrap();
        assert!(!builder.is_poisoned());
    }

    #[test]
    fn test_list_member_appends_in_order() {
        let (_engine, bridge, mut builder) = builder();
        let panel = handle(&builder.create_object("", "StackPanel").unwrap());
        let children: Vec<WireValue> = (0..3).map(|_| builder.create_object("", "TextBlock").unwrap()).collect();
        for child in &children {
            builder.set_property(panel, "Children", child.clone()).unwrap();
        }

        let panel = bridge.lookup(panel).unwrap();
        let list = bridge.get_value(&panel, "Children").unwrap();
        let items = bridge.collection_items(list.as_object().unwrap()).unwrap();
        let handles: Vec<NativeHandle> = items.iter().map(|v| v.as_object().unwrap().handle()).collect();
        let expected: Vec<NativeHandle> = children.iter().map(handle).collect();
        assert_eq!(handles, expected);
    }

    #[test]
    fn test_scalar_member_second_assignment_overwrites() {
        let (_engine, bridge, mut builder) = builder();
        let text = handle(&builder.create_object("", "TextBlock").unwrap());
        builder.set_property(text, "Text", WireValue::string("first")).unwrap();
        builder.set_property(text, "Text", WireValue::string("second")).unwrap();

        let text = bridge.lookup(text).unwrap();
        assert_eq!(bridge.get_value(&text, "Text").unwrap(), Value::String("second".into()));
    }

    #[test]
    fn test_add_child_uses_content_property() {
        let (_engine, bridge, mut builder) = builder();
        let border = builder.create_object("", "Border").unwrap();
        let canvas = builder.create_object("", "Canvas").unwrap();
        let text = builder.create_object("", "TextBlock").unwrap();

        builder.add_child(handle(&canvas), text.clone()).unwrap();
        builder.add_child(handle(&border), canvas.clone()).unwrap();
        assert_eq!(
            builder.get_content_property_name(handle(&border)).unwrap().as_deref(),
            Some("Child")
        );

        let dictionary = builder.create_object("", "ResourceDictionary").unwrap();
        assert_eq!(builder.get_content_property_name(handle(&dictionary)).unwrap(), None);
        let err = builder.add_child(handle(&dictionary), text.clone()).unwrap_err();
        assert!(matches!(err, BuildError::MissingKey(_)));

        let top = builder.finish().unwrap().unwrap();
        let child = bridge.get_value(&top, "Child").unwrap();
        assert_eq!(child.as_object().unwrap().handle(), handle(&canvas));
    }

    #[test]
    fn test_attached_properties() {
        let (_engine, bridge, mut builder) = builder();
        let canvas = handle(&builder.create_object("", "Canvas").unwrap());
        let text = handle(&builder.create_object("", "TextBlock").unwrap());
        builder.set_property(text, "Canvas.Left", WireValue::string("12")).unwrap();
        builder.set_property(canvas, "Left", WireValue::string("5")).unwrap();

        let err = builder.set_property(text, "Canvas.Right", WireValue::string("1")).unwrap_err();
        assert!(matches!(err, BuildError::UnknownMember { .. }));
        let err = builder.set_property(text, "Bogus", WireValue::string("1")).unwrap_err();
        assert!(matches!(err, BuildError::UnknownMember { ref member, .. } if member == "Bogus"));
        let err = builder.set_property(text, "q:Grid.Row", WireValue::string("1")).unwrap_err();
        assert!(matches!(err, BuildError::UnknownPrefix(_)));

        let canvas_ty = builtins().canvas.clone();
        let text = bridge.lookup(text).unwrap();
        let canvas = bridge.lookup(canvas).unwrap();
        assert_eq!(bridge.get_attached(&canvas_ty, "Left", &text).unwrap(), Value::F64(12.0));
        assert_eq!(bridge.get_attached(&canvas_ty, "Left", &canvas).unwrap(), Value::F64(5.0));
    }

    #[test]
    fn test_failed_property_falls_through_to_attached_accessor() {
        let (_engine, bridge) = headless::connect();
        let pad = ManagedType::class("Pad")
            .namespace("Demo")
            .module("demo")
            .base(&builtins().canvas)
            .wrap(NativeObject::wrap)
            .property(PropertyDesc::local("Left", &builtins().brush))
            .build();
        let resolver = ModuleSet::new().with_module(Module::new("demo").with_type(&pad));
        let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(resolver));

        let pad = handle(&builder.create_object("clr-namespace:Demo;assembly=demo", "Pad").unwrap());
        builder.set_property(pad, "Left", WireValue::string("5")).unwrap();

        let err = builder.set_property(pad, "Left", WireValue::string("wide")).unwrap_err();
        match err {
            BuildError::Conversion(e) => assert_eq!(e.target_type, "System.Double"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!builder.is_poisoned());

        let pad = bridge.lookup(pad).unwrap();
        assert_eq!(bridge.get_attached(&builtins().canvas, "Left", &pad).unwrap(), Value::F64(5.0));
        assert_eq!(pad.peer().local("Left"), None);
    }

    #[test]
    fn test_names_and_keys() {
        let (_engine, bridge, mut builder) = builder();
        let root = builder.create_object("", "Border").unwrap();
        let other = builder.create_object("", "TextBlock").unwrap();
        builder.set_property(handle(&root), "x:Name", WireValue::string("root")).unwrap();
        builder.set_property(handle(&other), "Name", WireValue::string("label")).unwrap();

        assert_eq!(builder.find_name("root").unwrap().handle(), handle(&root));
        assert_eq!(builder.find_name("label").unwrap().handle(), handle(&other));
        let root_object = bridge.lookup(handle(&root)).unwrap();
        assert_eq!(bridge.get_value(&root_object, "Name").unwrap(), Value::String("root".into()));

        let err = builder.set_property(handle(&other), "x:Name", WireValue::string("root")).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateName(_)));
        builder.set_property(handle(&other), "x:Uid", WireValue::string("ignored")).unwrap();
    }

    #[test]
    fn test_static_resources() {
        let (_engine, bridge, mut builder) = builder();
        let border = handle(&builder.create_object("", "Border").unwrap());
        let brush = builder.create_object("", "SolidColorBrush").unwrap();
        builder.set_property(handle(&brush), "x:Key", WireValue::string("accent")).unwrap();
        builder.set_property(handle(&brush), "Color", WireValue::string("#FF00FF00")).unwrap();
        builder.set_property(border, "Resources", brush.clone()).unwrap();

        let text = handle(&builder.create_object("", "TextBlock").unwrap());
        builder
            .set_property(text, "Foreground", WireValue::string("{StaticResource accent}"))
            .unwrap();
        builder.set_property(text, "Text", WireValue::string("{}{literal}")).unwrap();
        let err = builder
            .set_property(text, "Foreground", WireValue::string("{StaticResource missing}"))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownResource(key) if key == "missing"));

        let text = bridge.lookup(text).unwrap();
        let foreground = bridge.get_value(&text, "Foreground").unwrap();
        assert_eq!(foreground.as_object().unwrap().handle(), handle(&brush));
        assert_eq!(bridge.get_value(&text, "Text").unwrap(), Value::String("{literal}".into()));
    }

    #[test]
    fn test_event_handlers_resolve_on_top_level_type() {
        let (engine, bridge) = headless::connect();
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();
        let page = ManagedType::class("Page")
            .namespace("Demo")
            .module("demo")
            .base(&builtins().canvas)
            .wrap(NativeObject::wrap)
            .method("OnLoaded", move |_this, _sender, _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        let resolver = ModuleSet::new().with_module(Module::new("demo").with_type(&page));
        let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(resolver));
        builder
            .import_namespace("local", "clr-namespace:Demo;assembly=demo")
            .unwrap();

        builder.create_object("clr-namespace:Demo;assembly=demo", "Page").unwrap();
        let text = handle(&builder.create_object("", "TextBlock").unwrap());
        builder.set_property(text, "Loaded", WireValue::string("OnLoaded")).unwrap();
        let err = builder.set_property(text, "Loaded", WireValue::string("OnMissing")).unwrap_err();
        assert!(matches!(err, BuildError::UnknownHandler { .. }));

        assert_eq!(engine.raise_event(text, "Loaded", WireValue::null(TypeTag::INVALID)), 1);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        let _top = builder.finish().unwrap();
    }

    #[test]
    fn test_fallback_to_top_level_module() {
        let (_engine, bridge) = headless::connect();
        let gauge = ManagedType::class("Gauge")
            .namespace("Demo")
            .module("demo")
            .base(&builtins().framework_element)
            .wrap(NativeObject::wrap)
            .property(PropertyDesc::local("Reading", &builtins().double))
            .build();
        let root = ManagedType::class("Dashboard")
            .namespace("Demo")
            .module("demo")
            .base(&builtins().stack_panel)
            .wrap(NativeObject::wrap)
            .build();
        let resolver = ModuleSet::new().with_module(Module::new("demo").with_type(&gauge).with_type(&root));
        let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(resolver));

        builder.create_object("clr-namespace:Demo;assembly=demo", "Dashboard").unwrap();
        let wire = builder.create_object("", "Gauge").unwrap();
        builder.set_property(handle(&wire), "Reading", WireValue::string("0.5")).unwrap();
        let gauge = bridge.lookup(handle(&wire)).unwrap();
        assert_eq!(bridge.get_value(&gauge, "Reading").unwrap(), Value::F64(0.5));
        assert!(builder.cached_members() >= 1);
    }

    #[test]
    fn test_fatal_error_poisons_builder() {
        let (engine, _bridge, mut builder) = builder();
        builder.create_object("", "Canvas").unwrap();
        let abstract_handle = engine.create_object(TypeTag::PANEL).unwrap();

        let err = builder
            .set_property(abstract_handle, "Width", WireValue::string("1"))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(builder.is_poisoned());
        assert!(matches!(builder.create_object("", "Canvas"), Err(BuildError::Poisoned)));
        assert!(matches!(builder.finish(), Err(BuildError::Poisoned)));
    }

    #[test]
    fn test_callback_frame_flags() {
        let (_engine, bridge) = headless::connect();
        let mut builder = DocumentBuilder::with_parser(bridge, Arc::new(ModuleSet::new()), 7);
        assert_eq!(builder.frame().parser, 7);
        assert!(!builder.frame().is_setting_delayed_property());
        builder.set_flags(CallbackFrame::SETTING_DELAYED_PROPERTY);
        assert!(builder.frame().is_setting_delayed_property());
    }

    #[test]
    fn test_markup_parsing() {
        assert!(matches!(markup("{StaticResource accent}"), Markup::StaticResource("accent")));
        assert!(matches!(markup(" { StaticResource  pad } "), Markup::StaticResource("pad")));
        assert!(matches!(markup("{}{x}"), Markup::Text("{x}")));
        assert!(matches!(markup("plain"), Markup::Text("plain")));
    }

    #[test]
    fn test_content_property_fallback() {
        let b = builtins();
        assert_eq!(content_property_name(&b.canvas).as_deref(), Some("Children"));
        assert_eq!(content_property_name(&b.content_control).as_deref(), Some("Content"));
        assert_eq!(content_property_name(&b.resource_dictionary), None);
        assert!(b.canvas.is_subtype_of(&b.panel));
    }
}
