//! Object factory: wrapper construction by type tag
//!
//! The tag-to-constructor table is filled by the type registry as types are
//! registered, so adding a wrapper type never touches the dispatch code.

use super::{NativePeer, ObjectRef, ReferenceMode};
use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{Constructor, TypeRef};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use scenebridge_sdk::{NativeEngine, NativeHandle, TypeTag};
use std::sync::Arc;

/// Tag to wrapper-constructor dispatch table
pub struct ConstructorTable {
    entries: RwLock<FxHashMap<TypeTag, Constructor>>,
}

impl ConstructorTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Install the constructor for `tag`, replacing any previous one
    pub fn install(&self, tag: TypeTag, constructor: Constructor) {
        self.entries.write().insert(tag, constructor);
    }

    /// Constructor for `tag`
    pub fn get(&self, tag: TypeTag) -> Option<Constructor> {
        self.entries.read().get(&tag).cloned()
    }

    /// Check if `tag` has a constructor
    pub fn contains(&self, tag: TypeTag) -> bool {
        self.entries.read().contains_key(&tag)
    }

    /// Number of installed constructors
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConstructorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds or reuses wrappers
pub struct ObjectFactory {
    table: Arc<ConstructorTable>,
}

impl ObjectFactory {
    /// Create a factory dispatching through `table`
    pub fn new(table: Arc<ConstructorTable>) -> Self {
        Self { table }
    }

    /// Dispatch table
    pub fn table(&self) -> &Arc<ConstructorTable> {
        &self.table
    }

    /// Wrapper for a native object of type `tag`.
    ///
    /// Returns the mapped wrapper if there is one. Otherwise takes the
    /// bridge's toggle reference, constructs a wrapper, and maps it; if a
    /// concurrent construction mapped first, that wrapper wins.
    pub fn create_or_reuse(&self, bridge: &Bridge, tag: TypeTag, handle: NativeHandle) -> BridgeResult<ObjectRef> {
        if handle.is_null() {
            return Err(BridgeError::Protocol(format!("null handle for object of type {}", tag)));
        }
        if let Some(existing) = bridge.identity().lookup(handle) {
            return Ok(existing);
        }

        bridge.affinity().check("construct wrapper")?;
        let ty = bridge.registry().resolve(tag)?;
        if !ty.is_constructible() {
            tracing::error!(%tag, type_name = ty.full_name(), "native side asked to wrap a non-constructible type");
            return Err(BridgeError::NotConstructible {
                tag,
                type_name: ty.full_name().to_string(),
            });
        }
        let constructor = self.table.get(tag).ok_or_else(|| {
            tracing::error!(%tag, "no constructor registered");
            BridgeError::MissingConstructor(tag)
        })?;

        let is_last = bridge.engine().add_toggle_ref(handle)?;
        let object = constructor(NativePeer::new(handle, tag, ty, bridge.engine().clone()));
        let mode = if is_last { ReferenceMode::Weak } else { ReferenceMode::Strong };
        let mapped = bridge.identity().add_mapping(handle, &object, mode)?;
        tracing::trace!(%handle, %tag, ?mode, "wrapped native object");
        Ok(mapped)
    }

    /// Create a native object of type `ty` from managed code and wrap it
    pub fn create_managed(&self, bridge: &Bridge, ty: &TypeRef) -> BridgeResult<ObjectRef> {
        bridge.affinity().check("create object")?;
        let tag = bridge.registry().tag_of(ty)?;
        if !ty.is_constructible() {
            return Err(BridgeError::NotConstructible {
                tag,
                type_name: ty.full_name().to_string(),
            });
        }

        let creation = CreationRef {
            engine: bridge.engine(),
            handle: bridge.engine().create_object(tag)?,
        };
        self.create_or_reuse(bridge, tag, creation.handle)
    }
}

/// The reference `create_object` hands back, dropped on every exit path
/// including a panicking constructor
struct CreationRef<'a> {
    engine: &'a Arc<dyn NativeEngine>,
    handle: NativeHandle,
}

impl Drop for CreationRef<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.release(self.handle) {
            tracing::warn!(handle = %self.handle, error = %e, "failed to drop creation reference");
        }
    }
}
