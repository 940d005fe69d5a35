//! The bridge service
//!
//! A [`Bridge`] owns every table the two runtimes share: the type registry,
//! the identity map, the constructor table, the managed handle table, and the
//! event trampolines. It is created with [`Bridge::new`] (or
//! [`Bridge::with_options`]) and shut down with [`Bridge::teardown`]; tests
//! create as many isolated bridges as they need.
//!
//! Native notifications enter through the methods in the "Native
//! notifications" section. They may arrive on any thread, never fail into
//! native code, and are no-ops for handles without a live wrapper.

use crate::affinity::ThreadAffinity;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventBridge, EventHandler, HandlerError};
use crate::object::{ConstructorTable, IdentityMap, ObjectFactory, ObjectRef};
use crate::options::BridgeOptions;
use crate::types::{PropertyStorage, TypeRef, TypeRefExt, TypeRegistry};
use crate::value::{ManagedHandleTable, Value, ValueCodec};
use scenebridge_sdk::{NativeEngine, NativeHandle, SubscriptionToken, TypeTag};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// The cross-runtime object bridge
pub struct Bridge {
    this: Weak<Bridge>,
    engine: Arc<dyn NativeEngine>,
    options: BridgeOptions,
    affinity: ThreadAffinity,
    registry: TypeRegistry,
    identity: IdentityMap,
    factory: ObjectFactory,
    handles: ManagedHandleTable,
    events: EventBridge,
    torn_down: AtomicBool,
}

impl Bridge {
    /// Create a bridge with default options, bound to the calling thread
    pub fn new(engine: Arc<dyn NativeEngine>) -> Arc<Self> {
        Self::with_options(engine, BridgeOptions::default())
    }

    /// Create a bridge bound to the calling thread
    pub fn with_options(engine: Arc<dyn NativeEngine>, options: BridgeOptions) -> Arc<Self> {
        let constructors = Arc::new(ConstructorTable::new());
        Arc::new_cyclic(|this| Bridge {
            this: this.clone(),
            registry: TypeRegistry::new(engine.clone(), constructors.clone()),
            factory: ObjectFactory::new(constructors),
            identity: IdentityMap::new(options.strict_mappings),
            affinity: ThreadAffinity::current(options.enforce_thread_affinity),
            handles: ManagedHandleTable::new(),
            events: EventBridge::new(),
            torn_down: AtomicBool::new(false),
            engine,
            options,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Native engine
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Options the bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// UI-thread affinity
    pub fn affinity(&self) -> &ThreadAffinity {
        &self.affinity
    }

    /// Type registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Identity map
    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    /// Object factory
    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    /// Managed handle table
    pub fn handles(&self) -> &ManagedHandleTable {
        &self.handles
    }

    /// Event bridge
    pub fn events(&self) -> &EventBridge {
        &self.events
    }

    /// Value codec bound to this bridge
    pub fn codec(&self) -> ValueCodec<'_> {
        ValueCodec::new(self)
    }

    pub(crate) fn downgrade(&self) -> Weak<Bridge> {
        self.this.clone()
    }

    fn ensure_live(&self) -> BridgeResult<()> {
        if self.is_torn_down() {
            return Err(BridgeError::TornDown);
        }
        Ok(())
    }

    // ========================================================================
    // Types and Objects
    // ========================================================================

    /// Register a managed type; returns its tag
    pub fn register_type(&self, ty: &TypeRef) -> BridgeResult<TypeTag> {
        self.ensure_live()?;
        self.registry.register(ty)
    }

    /// Wrapper for a native object, creating it on first sight
    pub fn create_or_reuse(&self, tag: TypeTag, handle: NativeHandle) -> BridgeResult<ObjectRef> {
        self.ensure_live()?;
        self.factory.create_or_reuse(self, tag, handle)
    }

    /// Create a new native object of type `ty` and return its wrapper
    pub fn create_object(&self, ty: &TypeRef) -> BridgeResult<ObjectRef> {
        self.ensure_live()?;
        self.factory.create_managed(self, ty)
    }

    /// Live wrapper for `handle`, if any; never creates one
    pub fn lookup(&self, handle: NativeHandle) -> Option<ObjectRef> {
        self.identity.lookup(handle)
    }

    /// Wrapper for `handle`, asking the engine for its type if none exists
    pub fn lookup_or_create(&self, handle: NativeHandle) -> BridgeResult<ObjectRef> {
        if let Some(object) = self.identity.lookup(handle) {
            return Ok(object);
        }
        let tag = self.engine.object_type(handle)?;
        self.create_or_reuse(tag, handle)
    }

    // ========================================================================
    // Property Values
    // ========================================================================

    fn check_object(&self, object: &ObjectRef, operation: &'static str) -> BridgeResult<()> {
        self.ensure_live()?;
        self.affinity.check(operation)?;
        if object.is_detached() {
            return Err(BridgeError::Detached(object.handle()));
        }
        Ok(())
    }

    /// Read the property `name` of `object`
    pub fn get_value(&self, object: &ObjectRef, name: &str) -> BridgeResult<Value> {
        self.check_object(object, "get property")?;
        let ty = object.managed_type().clone();
        let (declaring, property) = ty.find_property(name).ok_or_else(|| BridgeError::UnknownProperty {
            type_name: ty.full_name().to_string(),
            property: name.to_string(),
        })?;

        match property.storage {
            PropertyStorage::Local => Ok(object.peer().local(name).unwrap_or(Value::Null)),
            PropertyStorage::Native => {
                let id = self.registry.property_id(declaring, name)?;
                let wire = self.engine.get_property(object.handle(), id)?;
                self.codec().decode(Some(&property.ty), &wire)
            }
        }
    }

    /// Write the property `name` of `object`
    pub fn set_value(&self, object: &ObjectRef, name: &str, value: Value) -> BridgeResult<()> {
        self.check_object(object, "set property")?;
        let ty = object.managed_type().clone();
        let (declaring, property) = ty.find_property(name).ok_or_else(|| BridgeError::UnknownProperty {
            type_name: ty.full_name().to_string(),
            property: name.to_string(),
        })?;
        if property.read_only {
            return Err(BridgeError::ReadOnlyProperty(format!("{}.{}", declaring.name(), name)));
        }
        if !value.is_assignable_to(&property.ty) {
            return Err(BridgeError::PropertyTypeMismatch {
                property: format!("{}.{}", declaring.name(), name),
                expected: property.ty.full_name().to_string(),
                actual: value.type_name(),
            });
        }

        match property.storage {
            PropertyStorage::Local => {
                let previous = object.peer().set_local(name, value);
                drop(previous);
            }
            PropertyStorage::Native => {
                let id = self.registry.property_id(declaring, name)?;
                let wire = self.codec().encode_as(&value, &property.ty)?;
                self.engine.set_property(object.handle(), id, wire)?;
            }
        }
        tracing::trace!(handle = %object.handle(), property = name, "set value");
        Ok(())
    }

    /// Reset the property `name` of `object` to its default
    pub fn clear_value(&self, object: &ObjectRef, name: &str) -> BridgeResult<()> {
        self.check_object(object, "clear property")?;
        let ty = object.managed_type().clone();
        let (declaring, property) = ty.find_property(name).ok_or_else(|| BridgeError::UnknownProperty {
            type_name: ty.full_name().to_string(),
            property: name.to_string(),
        })?;
        if property.read_only {
            return Err(BridgeError::ReadOnlyProperty(format!("{}.{}", declaring.name(), name)));
        }
        match property.storage {
            PropertyStorage::Local => drop(object.peer().clear_local(name)),
            PropertyStorage::Native => {
                let id = self.registry.property_id(declaring, name)?;
                self.engine.clear_property(object.handle(), id)?;
            }
        }
        Ok(())
    }

    /// Read the attached property `owner.name` from `target`
    pub fn get_attached(&self, owner: &TypeRef, name: &str, target: &ObjectRef) -> BridgeResult<Value> {
        self.check_object(target, "get attached property")?;
        let (declaring, attached) = owner.find_attached(name).ok_or_else(|| BridgeError::UnknownProperty {
            type_name: owner.full_name().to_string(),
            property: name.to_string(),
        })?;
        let id = self.registry.property_id(declaring, name)?;
        let wire = self.engine.get_property(target.handle(), id)?;
        self.codec().decode(Some(&attached.ty), &wire)
    }

    /// Write the attached property `owner.name` on `target`
    pub fn set_attached(&self, owner: &TypeRef, name: &str, target: &ObjectRef, value: Value) -> BridgeResult<()> {
        self.check_object(target, "set attached property")?;
        let (declaring, attached) = owner.find_attached(name).ok_or_else(|| BridgeError::UnknownProperty {
            type_name: owner.full_name().to_string(),
            property: name.to_string(),
        })?;
        if !value.is_assignable_to(&attached.ty) {
            return Err(BridgeError::PropertyTypeMismatch {
                property: format!("{}.{}", declaring.name(), name),
                expected: attached.ty.full_name().to_string(),
                actual: value.type_name(),
            });
        }
        let id = self.registry.property_id(declaring, name)?;
        let wire = self.codec().encode_as(&value, &attached.ty)?;
        self.engine.set_property(target.handle(), id, wire)?;
        Ok(())
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Append `item` to a list object; returns its index
    pub fn collection_add(&self, collection: &ObjectRef, item: &Value) -> BridgeResult<usize> {
        self.check_object(collection, "add to collection")?;
        if !collection.managed_type().is_list() {
            return Err(BridgeError::NotACollection(collection.managed_type().full_name().to_string()));
        }
        let wire = self.codec().encode(item)?;
        Ok(self.engine.collection_add(collection.handle(), wire)?)
    }

    /// Items of a list object, in order
    pub fn collection_items(&self, collection: &ObjectRef) -> BridgeResult<Vec<Value>> {
        self.check_object(collection, "read collection")?;
        if !collection.managed_type().is_list() {
            return Err(BridgeError::NotACollection(collection.managed_type().full_name().to_string()));
        }
        let count = self.engine.collection_count(collection.handle())?;
        let mut items = Vec::with_capacity(count);
        for index in 0..count {
            let wire = self.engine.collection_get(collection.handle(), index)?;
            items.push(self.codec().decode(None, &wire)?);
        }
        Ok(items)
    }

    /// Add a keyed entry to a dictionary object
    pub fn dictionary_add(&self, dictionary: &ObjectRef, key: &str, value: &Value) -> BridgeResult<()> {
        self.check_object(dictionary, "add to dictionary")?;
        if !dictionary.managed_type().is_dictionary() {
            return Err(BridgeError::NotACollection(dictionary.managed_type().full_name().to_string()));
        }
        let wire = self.codec().encode(value)?;
        self.engine.dictionary_add(dictionary.handle(), key, wire)?;
        Ok(())
    }

    /// Look up a keyed entry of a dictionary object
    pub fn dictionary_get(&self, dictionary: &ObjectRef, key: &str) -> BridgeResult<Option<Value>> {
        self.check_object(dictionary, "read dictionary")?;
        if !dictionary.managed_type().is_dictionary() {
            return Err(BridgeError::NotACollection(dictionary.managed_type().full_name().to_string()));
        }
        match self.engine.dictionary_get(dictionary.handle(), key)? {
            Some(wire) => Ok(Some(self.codec().decode(None, &wire)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribe a handler to the event `name` of `object`
    pub fn subscribe<F>(&self, object: &ObjectRef, name: &str, handler: F) -> BridgeResult<SubscriptionToken>
    where
        F: Fn(&ObjectRef, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe_handler(object, name, Arc::new(handler))
    }

    /// Subscribe a shared handler to the event `name` of `object`
    pub fn subscribe_handler(
        &self,
        object: &ObjectRef,
        name: &str,
        handler: EventHandler,
    ) -> BridgeResult<SubscriptionToken> {
        self.ensure_live()?;
        self.events.subscribe(self, object, name, handler)
    }

    /// Remove a subscription by token
    pub fn unsubscribe(&self, object: &ObjectRef, name: &str, token: SubscriptionToken) -> BridgeResult<()> {
        self.events.unsubscribe(self, object, name, token)
    }

    // ========================================================================
    // Native notifications
    // ========================================================================

    fn notify<F>(&self, handle: NativeHandle, notification: &'static str, f: F)
    where
        F: FnOnce(&ObjectRef) -> BridgeResult<()>,
    {
        let Some(object) = self.identity.lookup(handle) else {
            tracing::trace!(%handle, notification, "notification for unmapped handle");
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| f(&object))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(%handle, notification, error = %e, "notification failed"),
            Err(_) => tracing::error!(%handle, notification, "panic in notification handler"),
        }
    }

    /// The native reference count of `handle` crossed the toggle threshold.
    ///
    /// `is_last` is true when the bridge's reference became the only one.
    pub fn toggle(&self, handle: NativeHandle, is_last: bool) -> BridgeResult<()> {
        self.identity.toggle(handle, is_last)
    }

    /// The native object `handle` was destroyed
    pub fn final_release(&self, handle: NativeHandle) {
        if self.identity.remove_mapping(handle) {
            tracing::debug!(%handle, "final release");
        }
    }

    /// Native code dropped its reference to the managed value `id`
    pub fn release_managed(&self, id: u64) {
        if self.handles.release(id) {
            tracing::trace!(id, "managed handle released");
        } else if !self.is_torn_down() {
            tracing::warn!(id, "release of unknown managed handle");
        }
    }

    /// The mentor of `handle` changed (a null `mentor` clears it)
    pub fn mentor_changed(&self, handle: NativeHandle, mentor: NativeHandle) {
        self.notify(handle, "mentor changed", |object| {
            let mentor = if mentor.is_null() {
                None
            } else {
                Some(self.lookup_or_create(mentor)?)
            };
            object.peer().set_mentor(mentor.as_ref());
            object.on_mentor_changed(mentor.as_ref());
            Ok(())
        });
    }

    /// `handle` was attached to a live tree
    pub fn attached(&self, handle: NativeHandle) {
        self.notify(handle, "attached", |object| {
            object.peer().set_attached(true);
            object.on_attached();
            Ok(())
        });
    }

    /// `handle` was detached from a live tree
    pub fn detached(&self, handle: NativeHandle) {
        self.notify(handle, "detached", |object| {
            object.peer().set_attached(false);
            object.on_detached();
            Ok(())
        });
    }

    /// Native `referer` now references `referent` through `name`.
    ///
    /// The referer's wrapper keeps the referent's wrapper alive until the
    /// edge is cleared.
    pub fn add_strong_ref(&self, referer: NativeHandle, referent: NativeHandle, name: &str) {
        self.notify(referer, "add strong ref", |object| {
            let target = self.lookup_or_create(referent)?;
            let previous = object.peer().add_strong_ref(referent, name, target);
            drop(previous);
            Ok(())
        });
    }

    /// Native `referer` no longer references `referent` through `name`
    pub fn clear_strong_ref(&self, referer: NativeHandle, referent: NativeHandle, name: &str) {
        self.notify(referer, "clear strong ref", |object| {
            let previous = object.peer().clear_strong_ref(referent, name);
            drop(previous);
            Ok(())
        });
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut the bridge down.
    ///
    /// Drops every identity entry, published managed value, and trampoline.
    /// Wrappers still held elsewhere release their native references when
    /// dropped. Later operations fail with [`BridgeError::TornDown`].
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries = self.identity.clear();
        self.handles.clear();
        self.events.clear();
        tracing::debug!(entries, "bridge torn down");
    }

    /// Check if [`teardown`](Self::teardown) has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("options", &self.options)
            .field("types", &self.registry.len())
            .field("objects", &self.identity.len())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless;
    use crate::object::ReferenceMode;
    use crate::types::{builtins, ManagedType, PropertyDesc};
    use crate::value::Thickness;

    #[test]
    fn test_native_property_round_trip() {
        let (_engine, bridge) = headless::connect();
        let border = bridge.create_object(&builtins().border).unwrap();

        bridge
            .set_value(&border, "BorderThickness", Value::Thickness(Thickness::uniform(2.0)))
            .unwrap();
        bridge.set_value(&border, "Width", Value::F64(120.0)).unwrap();

        assert_eq!(
            bridge.get_value(&border, "BorderThickness").unwrap(),
            Value::Thickness(Thickness::uniform(2.0))
        );
        assert_eq!(bridge.get_value(&border, "Width").unwrap(), Value::F64(120.0));
    }

    #[test]
    fn test_enum_property_decodes_to_enum() {
        let (_engine, bridge) = headless::connect();
        let text = bridge.create_object(&builtins().text_block).unwrap();
        bridge.set_value(&text, "Visibility", Value::I32(1)).unwrap();
        match bridge.get_value(&text, "Visibility").unwrap() {
            Value::Enum(e) => assert_eq!(e.name(), Some("Collapsed")),
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_and_unknown_property() {
        let (_engine, bridge) = headless::connect();
        let canvas = bridge.create_object(&builtins().canvas).unwrap();

        let err = bridge.set_value(&canvas, "Width", Value::from("wide")).unwrap_err();
        assert!(matches!(err, BridgeError::PropertyTypeMismatch { .. }));

        let err = bridge.get_value(&canvas, "Text").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownProperty { .. }));
    }

    #[test]
    fn test_local_and_read_only_properties() {
        let (_engine, bridge) = headless::connect();
        let ty = ManagedType::class("Card")
            .namespace("Demo")
            .base(&builtins().border)
            .property(PropertyDesc::local("Title", &builtins().string))
            .property(PropertyDesc::local("Id", &builtins().int32).read_only())
            .wrap(crate::object::NativeObject::wrap)
            .build();
        let card = bridge.create_object(&ty).unwrap();

        assert_eq!(bridge.get_value(&card, "Title").unwrap(), Value::Null);
        bridge.set_value(&card, "Title", Value::from("hello")).unwrap();
        assert_eq!(bridge.get_value(&card, "Title").unwrap(), Value::from("hello"));

        let err = bridge.set_value(&card, "Id", Value::I32(3)).unwrap_err();
        assert!(matches!(err, BridgeError::ReadOnlyProperty(_)));
    }

    #[test]
    fn test_object_property_keeps_child_alive_natively() {
        let (engine, bridge) = headless::connect();
        let border = bridge.create_object(&builtins().border).unwrap();
        let child = bridge.create_object(&builtins().text_block).unwrap();
        let child_handle = child.handle();

        bridge.set_value(&border, "Child", Value::Object(child.clone())).unwrap();
        assert_eq!(bridge.identity().mode(child_handle), Some(ReferenceMode::Strong));

        drop(child);
        let again = bridge.get_value(&border, "Child").unwrap();
        assert_eq!(again.as_object().map(|o| o.handle()), Some(child_handle));
        assert!(engine.is_alive(child_handle));
    }

    #[test]
    fn test_attached_property() {
        let (_engine, bridge) = headless::connect();
        let canvas = &builtins().canvas;
        let child = bridge.create_object(&builtins().border).unwrap();
        bridge.set_attached(canvas, "Left", &child, Value::F64(15.0)).unwrap();
        assert_eq!(bridge.get_attached(canvas, "Left", &child).unwrap(), Value::F64(15.0));
        assert!(bridge.get_attached(canvas, "Right", &child).is_err());
    }

    #[test]
    fn test_collections() {
        let (_engine, bridge) = headless::connect();
        let panel = bridge.create_object(&builtins().stack_panel).unwrap();
        let children = bridge.create_object(&builtins().ui_element_collection).unwrap();
        bridge.set_value(&panel, "Children", Value::Object(children.clone())).unwrap();

        let a = bridge.create_object(&builtins().text_block).unwrap();
        let b = bridge.create_object(&builtins().border).unwrap();
        assert_eq!(bridge.collection_add(&children, &Value::Object(a.clone())).unwrap(), 0);
        assert_eq!(bridge.collection_add(&children, &Value::Object(b.clone())).unwrap(), 1);

        let items = bridge.collection_items(&children).unwrap();
        assert_eq!(items, vec![Value::Object(a), Value::Object(b)]);

        let err = bridge.collection_add(&panel, &Value::Null).unwrap_err();
        assert!(matches!(err, BridgeError::NotACollection(_)));
    }

    #[test]
    fn test_dictionary() {
        let (_engine, bridge) = headless::connect();
        let resources = bridge.create_object(&builtins().resource_dictionary).unwrap();
        let brush = bridge.create_object(&builtins().solid_color_brush).unwrap();
        bridge
            .dictionary_add(&resources, "Accent", &Value::Object(brush.clone()))
            .unwrap();
        assert_eq!(
            bridge.dictionary_get(&resources, "Accent").unwrap(),
            Some(Value::Object(brush))
        );
        assert_eq!(bridge.dictionary_get(&resources, "Missing").unwrap(), None);
    }

    #[test]
    fn test_notifications_reach_the_wrapper() {
        let (_engine, bridge) = headless::connect();
        let parent = bridge.create_object(&builtins().stack_panel).unwrap();
        let child = bridge.create_object(&builtins().text_block).unwrap();

        bridge.attached(child.handle());
        assert!(child.peer().is_attached());
        bridge.mentor_changed(child.handle(), parent.handle());
        assert!(Arc::ptr_eq(&child.peer().mentor().unwrap(), &parent));
        bridge.mentor_changed(child.handle(), NativeHandle::NULL);
        assert!(child.peer().mentor().is_none());
        bridge.detached(child.handle());
        assert!(!child.peer().is_attached());

        // unmapped handles are ignored
        bridge.attached(NativeHandle::new(0xfeed));
    }

    #[test]
    fn test_strong_refs_keep_referent_alive() {
        let (_engine, bridge) = headless::connect();
        let parent = bridge.create_object(&builtins().border).unwrap();
        let child = bridge.create_object(&builtins().text_block).unwrap();
        let child_handle = child.handle();
        let addr = Arc::as_ptr(&child) as *const () as usize;

        bridge.add_strong_ref(parent.handle(), child_handle, "Child");
        assert_eq!(parent.peer().strong_ref_count(), 1);
        drop(child);
        let again = bridge.lookup(child_handle).unwrap();
        assert_eq!(Arc::as_ptr(&again) as *const () as usize, addr);

        bridge.clear_strong_ref(parent.handle(), child_handle, "Child");
        assert_eq!(parent.peer().strong_ref_count(), 0);
    }

    #[test]
    fn test_teardown() {
        let (_engine, bridge) = headless::connect();
        let canvas = bridge.create_object(&builtins().canvas).unwrap();
        bridge.teardown();
        assert!(bridge.is_torn_down());
        assert!(bridge.identity().is_empty());
        assert!(matches!(
            bridge.create_object(&builtins().canvas),
            Err(BridgeError::TornDown)
        ));
        assert!(matches!(bridge.get_value(&canvas, "Width"), Err(BridgeError::TornDown)));
    }
}
