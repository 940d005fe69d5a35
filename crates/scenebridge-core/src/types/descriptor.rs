//! Managed type descriptors
//!
//! A [`ManagedType`] describes one managed type: where it lives, its place in
//! the inheritance lattice, its members, and how to wrap a native object of
//! that type. Descriptors are immutable once built and shared as [`TypeRef`].

use crate::error::ConversionError;
use crate::events::HandlerError;
use crate::object::{NativePeer, ObjectRef};
use crate::types::builtins::builtins;
use crate::value::Value;
use scenebridge_sdk::TypeTag;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a type descriptor
pub type TypeRef = Arc<ManagedType>;

/// Builds the managed wrapper around a freshly created peer
pub type Constructor = Arc<dyn Fn(NativePeer) -> ObjectRef + Send + Sync>;

/// Converts document text to a value of one type
pub type Converter = Arc<dyn Fn(&str) -> Result<Value, ConversionError> + Send + Sync>;

/// Event handler method: `(this, sender, args)`
pub type MethodFn = Arc<dyn Fn(&ObjectRef, &ObjectRef, &Value) -> Result<(), HandlerError> + Send + Sync>;

/// What kind of type a descriptor describes
#[derive(Debug, Clone, PartialEq)]
pub enum TypeCategory {
    /// Root of the lattice; accepts any value
    Any,
    /// Built-in value kind carried inline or as a blob
    Value(TypeTag),
    /// Enumeration carried as int32; members in declaration order
    Enum(Vec<(String, i32)>),
    /// Object type backed by a native object
    Class {
        /// Abstract classes are never constructed
        is_abstract: bool,
    },
    /// Interface, used only for supertype matching
    Interface,
    /// Type that exists only on the native side
    NativeOnly,
}

/// Where a property's value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyStorage {
    /// Native dependency property, read and written through the engine
    Native,
    /// Stored on the managed peer only
    Local,
}

/// An instance property
#[derive(Clone)]
pub struct PropertyDesc {
    /// Member name
    pub name: String,
    /// Declared value type
    pub ty: TypeRef,
    /// Backing storage
    pub storage: PropertyStorage,
    /// Whether writes are refused
    pub read_only: bool,
    /// Member-specific text converter
    pub converter: Option<Converter>,
}

impl PropertyDesc {
    /// Property backed by a native dependency property
    pub fn native(name: impl Into<String>, ty: &TypeRef) -> Self {
        PropertyDesc {
            name: name.into(),
            ty: ty.clone(),
            storage: PropertyStorage::Native,
            read_only: false,
            converter: None,
        }
    }

    /// Property stored on the managed side
    pub fn local(name: impl Into<String>, ty: &TypeRef) -> Self {
        PropertyDesc {
            storage: PropertyStorage::Local,
            ..PropertyDesc::native(name, ty)
        }
    }

    /// Mark read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Attach a member-specific converter
    pub fn with_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for PropertyDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDesc")
            .field("name", &self.name)
            .field("ty", &self.ty.full_name())
            .field("storage", &self.storage)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// An event declared by a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDesc {
    /// Event name
    pub name: String,
}

/// A static attached-property accessor pair (`Get<Name>` / `Set<Name>`)
#[derive(Clone)]
pub struct AttachedDesc {
    /// Property name without the owner prefix
    pub name: String,
    /// Declared value type
    pub ty: TypeRef,
    /// Member-specific text converter
    pub converter: Option<Converter>,
}

impl AttachedDesc {
    /// Create an attached property
    pub fn new(name: impl Into<String>, ty: &TypeRef) -> Self {
        AttachedDesc {
            name: name.into(),
            ty: ty.clone(),
            converter: None,
        }
    }
}

impl fmt::Debug for AttachedDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedDesc")
            .field("name", &self.name)
            .field("ty", &self.ty.full_name())
            .finish()
    }
}

/// A handler method that documents can bind events to by name
#[derive(Clone)]
pub struct MethodDesc {
    /// Method name
    pub name: String,
    /// Invocation entry point
    pub invoke: MethodFn,
}

impl fmt::Debug for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDesc").field("name", &self.name).finish()
    }
}

/// Descriptor of a managed type
pub struct ManagedType {
    name: String,
    namespace: String,
    module: String,
    full_name: String,
    category: TypeCategory,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    builtin_tag: Option<TypeTag>,
    generic_definition: Option<TypeRef>,
    generic_args: Vec<TypeRef>,
    properties: Vec<PropertyDesc>,
    events: Vec<EventDesc>,
    attached: Vec<AttachedDesc>,
    methods: Vec<MethodDesc>,
    content_property: Option<String>,
    constructor: Option<Constructor>,
    converter: Option<Converter>,
}

impl ManagedType {
    /// Start a concrete class
    pub fn class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::Class { is_abstract: false })
    }

    /// Start an abstract class
    pub fn abstract_class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::Class { is_abstract: true })
    }

    /// Start an interface
    pub fn interface(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::Interface)
    }

    /// Start an enumeration
    pub fn enumeration(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::Enum(Vec::new()))
    }

    /// Start a built-in value type
    pub fn value_type(name: impl Into<String>, tag: TypeTag) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::Value(tag)).builtin(tag)
    }

    /// Start the root type that accepts any value
    pub fn root(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::Any)
    }

    /// Start a native-only type
    pub fn native_only(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeCategory::NativeOnly)
    }

    /// Simple name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Owning module
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Namespace-qualified name, with generic arguments for closed generics
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Category
    pub fn category(&self) -> &TypeCategory {
        &self.category
    }

    /// Direct base type
    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// Directly implemented interfaces
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// Fixed tag of a built-in type
    pub fn builtin_tag(&self) -> Option<TypeTag> {
        self.builtin_tag
    }

    /// Open generic definition of a closed generic
    pub fn generic_definition(&self) -> Option<&TypeRef> {
        self.generic_definition.as_ref()
    }

    /// Generic arguments of a closed generic
    pub fn generic_args(&self) -> &[TypeRef] {
        &self.generic_args
    }

    /// Properties declared directly on this type
    pub fn properties(&self) -> &[PropertyDesc] {
        &self.properties
    }

    /// Events declared directly on this type
    pub fn events(&self) -> &[EventDesc] {
        &self.events
    }

    /// Own property by name
    pub fn property(&self, name: &str) -> Option<&PropertyDesc> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Own event by name
    pub fn event(&self, name: &str) -> Option<&EventDesc> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Own attached property by name
    pub fn attached(&self, name: &str) -> Option<&AttachedDesc> {
        self.attached.iter().find(|a| a.name == name)
    }

    /// Own handler method by name
    pub fn method(&self, name: &str) -> Option<&MethodDesc> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Content property declared directly on this type
    pub fn content_property(&self) -> Option<&str> {
        self.content_property.as_deref()
    }

    /// Wrapper constructor
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// Type-level text converter
    pub fn converter(&self) -> Option<&Converter> {
        self.converter.as_ref()
    }

    /// Check if this is a non-abstract class
    pub fn is_constructible(&self) -> bool {
        matches!(self.category, TypeCategory::Class { is_abstract: false })
    }

    /// Check if this is an interface
    pub fn is_interface(&self) -> bool {
        matches!(self.category, TypeCategory::Interface)
    }

    /// Check if values of this type are native objects
    pub fn is_object_family(&self) -> bool {
        matches!(
            self.category,
            TypeCategory::Class { .. } | TypeCategory::Interface | TypeCategory::NativeOnly
        )
    }

    /// Check if this is a closed generic
    pub fn is_generic(&self) -> bool {
        self.generic_definition.is_some()
    }

    /// Enum members in declaration order
    pub fn enum_members(&self) -> &[(String, i32)] {
        match &self.category {
            TypeCategory::Enum(members) => members,
            _ => &[],
        }
    }

    /// Enum value by member name (case-insensitive)
    pub fn enum_value(&self, name: &str) -> Option<i32> {
        self.enum_members()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Enum member name by value
    pub fn enum_name(&self, value: i32) -> Option<&str> {
        self.enum_members()
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Check if this type is `other` or derives from or implements it.
    ///
    /// A closed generic is a subtype of its open definition.
    pub fn is_subtype_of(&self, other: &ManagedType) -> bool {
        if matches!(other.category, TypeCategory::Any) || self.full_name == other.full_name {
            return true;
        }
        if let Some(def) = &self.generic_definition {
            if def.full_name == other.full_name {
                return true;
            }
        }
        if self.interfaces.iter().any(|i| i.is_subtype_of(other)) {
            return true;
        }
        self.base.as_ref().map_or(false, |b| b.is_subtype_of(other))
    }
}

impl fmt::Debug for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedType")
            .field("name", &self.full_name)
            .field("category", &self.category)
            .field("base", &self.base.as_ref().map(|b| b.full_name()))
            .finish()
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Builder for [`ManagedType`]
pub struct TypeBuilder {
    ty: ManagedType,
}

impl TypeBuilder {
    fn new(name: String, category: TypeCategory) -> Self {
        TypeBuilder {
            ty: ManagedType {
                name,
                namespace: String::new(),
                module: String::new(),
                full_name: String::new(),
                category,
                base: None,
                interfaces: Vec::new(),
                builtin_tag: None,
                generic_definition: None,
                generic_args: Vec::new(),
                properties: Vec::new(),
                events: Vec::new(),
                attached: Vec::new(),
                methods: Vec::new(),
                content_property: None,
                constructor: None,
                converter: None,
            },
        }
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.ty.namespace = namespace.into();
        self
    }

    /// Set the owning module
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.ty.module = module.into();
        self
    }

    /// Set the base type
    pub fn base(mut self, base: &TypeRef) -> Self {
        self.ty.base = Some(base.clone());
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: &TypeRef) -> Self {
        self.ty.interfaces.push(interface.clone());
        self
    }

    /// Fix the tag of a built-in type
    pub fn builtin(mut self, tag: TypeTag) -> Self {
        self.ty.builtin_tag = Some(tag);
        self
    }

    /// Make this a generic type.
    ///
    /// With no arguments the type is the open definition itself; otherwise
    /// it is a closed instantiation of `definition` and inherits its name,
    /// namespace, and module.
    pub fn generic(mut self, definition: &TypeRef, args: &[TypeRef]) -> Self {
        self.ty.name = definition.name.clone();
        self.ty.namespace = definition.namespace.clone();
        self.ty.module = definition.module.clone();
        self.ty.generic_definition = Some(definition.clone());
        self.ty.generic_args = args.to_vec();
        self
    }

    /// Add an instance property
    pub fn property(mut self, property: PropertyDesc) -> Self {
        self.ty.properties.push(property);
        self
    }

    /// Add an event
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.ty.events.push(EventDesc { name: name.into() });
        self
    }

    /// Add an attached property accessor pair
    pub fn attached(mut self, attached: AttachedDesc) -> Self {
        self.ty.attached.push(attached);
        self
    }

    /// Add a handler method
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ObjectRef, &ObjectRef, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.ty.methods.push(MethodDesc {
            name: name.into(),
            invoke: Arc::new(f),
        });
        self
    }

    /// Declare the content property
    pub fn content_property(mut self, name: impl Into<String>) -> Self {
        self.ty.content_property = Some(name.into());
        self
    }

    /// Set the wrapper constructor
    pub fn wrap<F>(mut self, f: F) -> Self
    where
        F: Fn(NativePeer) -> ObjectRef + Send + Sync + 'static,
    {
        self.ty.constructor = Some(Arc::new(f));
        self
    }

    /// Set a type-level text converter
    pub fn converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.ty.converter = Some(Arc::new(f));
        self
    }

    /// Add an enum member
    pub fn member(mut self, name: impl Into<String>, value: i32) -> Self {
        if let TypeCategory::Enum(members) = &mut self.ty.category {
            members.push((name.into(), value));
        }
        self
    }

    /// Finish the descriptor
    pub fn build(mut self) -> TypeRef {
        let simple = if self.ty.namespace.is_empty() {
            self.ty.name.clone()
        } else {
            format!("{}.{}", self.ty.namespace, self.ty.name)
        };
        self.ty.full_name = if self.ty.generic_args.is_empty() {
            simple
        } else {
            let args: Vec<&str> = self.ty.generic_args.iter().map(|a| a.full_name()).collect();
            format!("{}[{}]", simple, args.join(","))
        };
        Arc::new(self.ty)
    }
}

/// Walks a type and its base chain, most derived first
pub struct Lineage<'a> {
    next: Option<&'a TypeRef>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a TypeRef;

    fn next(&mut self) -> Option<&'a TypeRef> {
        let current = self.next?;
        self.next = current.base.as_ref();
        Some(current)
    }
}

/// Member lookups that walk the base chain
pub trait TypeRefExt {
    /// The type followed by its bases
    fn lineage(&self) -> Lineage<'_>;

    /// Property on the type or its nearest base, with the declaring type
    fn find_property(&self, name: &str) -> Option<(&TypeRef, &PropertyDesc)>;

    /// Event on the type or its nearest base, with the declaring type
    fn find_event(&self, name: &str) -> Option<(&TypeRef, &EventDesc)>;

    /// Attached accessor on the type or its nearest base, with the declaring type
    fn find_attached(&self, name: &str) -> Option<(&TypeRef, &AttachedDesc)>;

    /// Handler method on the type or its nearest base
    fn find_method(&self, name: &str) -> Option<&MethodDesc>;

    /// Content property declared on the type or its nearest base
    fn declared_content_property(&self) -> Option<&str>;

    /// Check if the type implements the ordered-list interface
    fn is_list(&self) -> bool;

    /// Check if the type implements the keyed-dictionary interface
    fn is_dictionary(&self) -> bool;
}

impl TypeRefExt for TypeRef {
    fn lineage(&self) -> Lineage<'_> {
        Lineage { next: Some(self) }
    }

    fn find_property(&self, name: &str) -> Option<(&TypeRef, &PropertyDesc)> {
        self.lineage().find_map(|t| t.property(name).map(|p| (t, p)))
    }

    fn find_event(&self, name: &str) -> Option<(&TypeRef, &EventDesc)> {
        self.lineage().find_map(|t| t.event(name).map(|e| (t, e)))
    }

    fn find_attached(&self, name: &str) -> Option<(&TypeRef, &AttachedDesc)> {
        self.lineage().find_map(|t| t.attached(name).map(|a| (t, a)))
    }

    fn find_method(&self, name: &str) -> Option<&MethodDesc> {
        self.lineage().find_map(|t| t.method(name))
    }

    fn declared_content_property(&self) -> Option<&str> {
        self.lineage().find_map(|t| t.content_property())
    }

    fn is_list(&self) -> bool {
        self.is_subtype_of(&builtins().ilist)
    }

    fn is_dictionary(&self) -> bool {
        self.is_subtype_of(&builtins().idictionary)
    }
}
