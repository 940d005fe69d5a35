//! Managed type system
//!
//! Type descriptors, modules, the built-in catalog, and the registry that
//! maps managed types to native type tags.

pub mod builtins;
pub mod descriptor;
pub mod module;
pub mod registry;

pub use builtins::{builtins, BuiltinCatalog};
pub use descriptor::{
    AttachedDesc, Constructor, Converter, EventDesc, Lineage, ManagedType, MethodDesc, MethodFn,
    PropertyDesc, PropertyStorage, TypeBuilder, TypeCategory, TypeRef, TypeRefExt,
};
pub use module::{Module, ModuleResolver, ModuleSet};
pub use registry::TypeRegistry;
