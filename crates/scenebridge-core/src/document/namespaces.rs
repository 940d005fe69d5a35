//! Namespace prefixes and their module mappings

use super::error::{BuildError, BuildResult};
use crate::types::builtins::{PRESENTATION_XMLNS, XAML_XMLNS};
use crate::types::{Module, ModuleResolver, TypeRef};
use rustc_hash::FxHashMap;
use std::sync::Arc;

const CLR_NAMESPACE: &str = "clr-namespace:";

/// (module, namespace) pairs a URI maps to
type Targets = Vec<(Arc<Module>, String)>;

/// Prefix and URI tables for one document
pub struct NamespaceTable {
    prefixes: FxHashMap<String, String>,
    targets: FxHashMap<String, Targets>,
}

impl NamespaceTable {
    /// Table with the default and `x` prefixes bound
    pub fn new() -> Self {
        let mut prefixes = FxHashMap::default();
        prefixes.insert(String::new(), PRESENTATION_XMLNS.to_string());
        prefixes.insert("x".to_string(), XAML_XMLNS.to_string());
        Self {
            prefixes,
            targets: FxHashMap::default(),
        }
    }

    /// Bind `prefix` (empty for the default namespace) to `uri`
    pub fn import(&mut self, prefix: &str, uri: &str, resolver: &dyn ModuleResolver) -> BuildResult<()> {
        self.targets_for(uri, resolver)?;
        self.prefixes.insert(prefix.to_string(), uri.to_string());
        Ok(())
    }

    /// URI bound to `prefix`
    pub fn uri(&self, prefix: &str) -> BuildResult<&str> {
        self.prefixes
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| BuildError::UnknownPrefix(prefix.to_string()))
    }

    /// Check if `prefix` names the language-directive namespace
    pub fn is_directive_prefix(&self, prefix: &str) -> bool {
        self.prefixes.get(prefix).map_or(false, |uri| uri == XAML_XMLNS)
    }

    /// Find the type `name` in the namespace `uri`
    pub fn find_type(&mut self, uri: &str, name: &str, resolver: &dyn ModuleResolver) -> BuildResult<Option<TypeRef>> {
        let targets = self.targets_for(uri, resolver)?;
        Ok(targets.iter().find_map(|(module, namespace)| module.find(namespace, name)))
    }

    fn targets_for(&mut self, uri: &str, resolver: &dyn ModuleResolver) -> BuildResult<&Targets> {
        if !self.targets.contains_key(uri) {
            let targets = resolve_uri(uri, resolver)?;
            tracing::debug!(uri, modules = targets.len(), "resolved namespace");
            self.targets.insert(uri.to_string(), targets);
        }
        self.targets
            .get(uri)
            .ok_or_else(|| BuildError::InvalidNamespace(uri.to_string()))
    }
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_uri(uri: &str, resolver: &dyn ModuleResolver) -> BuildResult<Targets> {
    let Some(rest) = uri.strip_prefix(CLR_NAMESPACE) else {
        return Ok(resolver
            .modules()
            .into_iter()
            .flat_map(|module| {
                let namespaces: Vec<String> = module.namespaces_for(uri).map(str::to_string).collect();
                namespaces.into_iter().map(move |ns| (module.clone(), ns))
            })
            .collect());
    };

    let mut parts = rest.split(';');
    let namespace = parts.next().map(str::trim).unwrap_or_default();
    if namespace.is_empty() {
        return Err(BuildError::InvalidNamespace(uri.to_string()));
    }
    let mut assembly = None;
    for part in parts {
        match part.trim().split_once('=') {
            Some(("assembly", name)) if !name.trim().is_empty() => assembly = Some(name.trim()),
            Some(("assembly", _)) => {}
            _ => return Err(BuildError::InvalidNamespace(uri.to_string())),
        }
    }

    match assembly {
        Some(name) => {
            let module = resolver
                .resolve_module(name)
                .ok_or_else(|| BuildError::UnknownModule(name.to_string()))?;
            Ok(vec![(module, namespace.to_string())])
        }
        None => Ok(resolver
            .modules()
            .into_iter()
            .map(|module| (module, namespace.to_string()))
            .collect()),
    }
}
