//! Modules: named groups of types that documents resolve against

use super::builtins;
use super::descriptor::TypeRef;
use std::sync::Arc;

/// A named set of types plus the document namespaces (xmlns) it declares.
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    types: Vec<TypeRef>,
    xmlns: Vec<(String, String)>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            types: Vec::new(),
            xmlns: Vec::new(),
        }
    }

    /// Add a type (builder style)
    pub fn with_type(mut self, ty: &TypeRef) -> Self {
        self.add_type(ty);
        self
    }

    /// Declare that a document namespace URI maps to one of this module's namespaces
    pub fn with_xmlns(mut self, uri: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.xmlns.push((uri.into(), namespace.into()));
        self
    }

    /// Add a type
    pub fn add_type(&mut self, ty: &TypeRef) {
        self.types.push(ty.clone());
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All types, in insertion order
    pub fn types(&self) -> &[TypeRef] {
        &self.types
    }

    /// Find a non-generic-instance type by namespace and simple name
    pub fn find(&self, namespace: &str, name: &str) -> Option<TypeRef> {
        self.types
            .iter()
            .find(|t| t.namespace() == namespace && t.name() == name && t.generic_args().is_empty())
            .cloned()
    }

    /// Find a type by simple name in any namespace
    pub fn find_by_name(&self, name: &str) -> Option<TypeRef> {
        self.types
            .iter()
            .find(|t| t.name() == name && t.generic_args().is_empty())
            .cloned()
    }

    /// Namespaces this module maps to `uri`
    pub fn namespaces_for<'a>(&'a self, uri: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.xmlns
            .iter()
            .filter(move |(u, _)| u == uri)
            .map(|(_, ns)| ns.as_str())
    }
}

/// Looks up modules by name.
pub trait ModuleResolver: Send + Sync {
    /// Module with the given name
    fn resolve_module(&self, name: &str) -> Option<Arc<Module>>;

    /// Every known module, searched in order for xmlns mappings
    fn modules(&self) -> Vec<Arc<Module>>;
}

/// A fixed list of modules, always starting with the built-in module
#[derive(Debug, Clone)]
pub struct ModuleSet {
    modules: Vec<Arc<Module>>,
}

impl ModuleSet {
    /// Set holding only the built-in module
    pub fn new() -> Self {
        ModuleSet {
            modules: vec![builtins::module()],
        }
    }

    /// Add a module (builder style)
    pub fn with_module(mut self, module: Module) -> Self {
        self.add(Arc::new(module));
        self
    }

    /// Add a module
    pub fn add(&mut self, module: Arc<Module>) {
        self.modules.push(module);
    }
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResolver for ModuleSet {
    fn resolve_module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.iter().find(|m| m.name() == name).cloned()
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ManagedType;

    #[test]
    fn test_find_by_namespace() {
        let widget = ManagedType::class("Widget").namespace("Demo").module("demo").build();
        let module = Module::new("demo")
            .with_type(&widget)
            .with_xmlns("urn:demo", "Demo");

        assert!(module.find("Demo", "Widget").is_some());
        assert!(module.find("Other", "Widget").is_none());
        assert!(module.find_by_name("Widget").is_some());
        assert_eq!(module.namespaces_for("urn:demo").collect::<Vec<_>>(), vec!["Demo"]);
    }

    #[test]
    fn test_module_set_includes_builtins() {
        let set = ModuleSet::new().with_module(Module::new("demo"));
        assert!(set.resolve_module(builtins::MODULE_NAME).is_some());
        assert!(set.resolve_module("demo").is_some());
        assert!(set.resolve_module("missing").is_none());
        assert_eq!(set.modules().len(), 2);
    }
}
