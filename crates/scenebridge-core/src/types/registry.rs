//! Type registry: managed types to native type tags and back
//!
//! Registration is idempotent and lazy. Registering a type first registers its
//! base type and each directly implemented interface, so the native side holds
//! a lattice mirroring the managed one. Built-in types are pre-seeded with
//! their fixed tags; user types get their tags from the engine.

use super::builtins::builtins;
use super::descriptor::{TypeCategory, TypeRef};
use crate::error::{BridgeError, BridgeResult};
use crate::object::factory::ConstructorTable;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use scenebridge_sdk::{EventId, NativeEngine, PropertyId, TypeRegistration, TypeTag};
use std::sync::Arc;

/// Types are identified by declaring module and full name
type TypeKey = (String, String);

fn key_of(ty: &TypeRef) -> TypeKey {
    (ty.module().to_string(), ty.full_name().to_string())
}

#[derive(Default)]
struct RegistryState {
    by_name: FxHashMap<TypeKey, TypeTag>,
    by_tag: FxHashMap<TypeTag, TypeRef>,
}

/// Bidirectional map between managed types and native tags
pub struct TypeRegistry {
    engine: Arc<dyn NativeEngine>,
    constructors: Arc<ConstructorTable>,
    state: RwLock<RegistryState>,
    properties: DashMap<(TypeTag, String), PropertyId>,
    events: DashMap<(TypeTag, String), EventId>,
}

impl TypeRegistry {
    /// Create a registry seeded with the built-in types
    pub fn new(engine: Arc<dyn NativeEngine>, constructors: Arc<ConstructorTable>) -> Self {
        let mut state = RegistryState::default();
        for ty in builtins().all() {
            match ty.category() {
                TypeCategory::Enum(_) => {
                    state.by_name.insert(key_of(ty), TypeTag::INT32);
                }
                _ => {
                    if let Some(tag) = ty.builtin_tag() {
                        state.by_name.insert(key_of(ty), tag);
                        state.by_tag.insert(tag, ty.clone());
                        if ty.is_constructible() {
                            if let Some(ctor) = ty.constructor() {
                                constructors.install(tag, ctor.clone());
                            }
                        }
                    }
                }
            }
        }

        Self {
            engine,
            constructors,
            state: RwLock::new(state),
            properties: DashMap::new(),
            events: DashMap::new(),
        }
    }

    /// Register a type (and its supertypes); returns its tag.
    ///
    /// Registering an already registered type returns the existing tag.
    pub fn register(&self, ty: &TypeRef) -> BridgeResult<TypeTag> {
        let mut state = self.state.write();
        self.register_locked(&mut state, ty)
    }

    fn register_locked(&self, state: &mut RegistryState, ty: &TypeRef) -> BridgeResult<TypeTag> {
        if let Some(tag) = state.by_name.get(&key_of(ty)) {
            return Ok(*tag);
        }

        match ty.category() {
            TypeCategory::Any => return Ok(TypeTag::OBJECT),
            TypeCategory::Value(tag) => {
                state.by_name.insert(key_of(ty), *tag);
                return Ok(*tag);
            }
            TypeCategory::Enum(_) => {
                state.by_name.insert(key_of(ty), TypeTag::INT32);
                return Ok(TypeTag::INT32);
            }
            _ => {}
        }

        let parent = match ty.base() {
            Some(base) => self.register_locked(state, base)?,
            None => TypeTag::INVALID,
        };
        let mut interfaces = Vec::with_capacity(ty.interfaces().len());
        for interface in ty.interfaces() {
            interfaces.push(self.register_locked(state, interface)?);
        }
        if let Some(definition) = ty.generic_definition() {
            if !ty.generic_args().is_empty() {
                self.register_locked(state, definition)?;
            }
        }

        let tag = match ty.builtin_tag() {
            Some(tag) => tag,
            None => {
                let registration = TypeRegistration {
                    name: ty.full_name().to_string(),
                    parent,
                    interfaces,
                    is_interface: ty.is_interface(),
                };
                let tag = self.engine.register_type(&registration)?;
                if tag.is_builtin() || state.by_tag.contains_key(&tag) {
                    return Err(BridgeError::Protocol(format!(
                        "engine allocated tag {} for {}, which is already taken",
                        tag,
                        ty.full_name()
                    )));
                }
                tag
            }
        };

        state.by_name.insert(key_of(ty), tag);
        state.by_tag.insert(tag, ty.clone());
        if ty.is_constructible() {
            if let Some(ctor) = ty.constructor() {
                self.constructors.install(tag, ctor.clone());
            }
        }

        tracing::debug!(type_name = ty.full_name(), %tag, %parent, "registered type");
        Ok(tag)
    }

    /// Type for a tag.
    ///
    /// An unregistered tag means the two sides disagree about the type
    /// lattice and is fatal.
    pub fn resolve(&self, tag: TypeTag) -> BridgeResult<TypeRef> {
        match self.state.read().by_tag.get(&tag) {
            Some(ty) => Ok(ty.clone()),
            None => {
                tracing::error!(%tag, "native side sent an unregistered type tag");
                Err(BridgeError::UnknownTypeTag(tag))
            }
        }
    }

    /// Tag for a type, registering it on first use.
    ///
    /// A closed generic falls back to its open definition's tag when only
    /// the definition is registered.
    pub fn tag_of(&self, ty: &TypeRef) -> BridgeResult<TypeTag> {
        {
            let state = self.state.read();
            if let Some(tag) = state.by_name.get(&key_of(ty)) {
                return Ok(*tag);
            }
            if let Some(definition) = ty.generic_definition() {
                if let Some(tag) = state.by_name.get(&key_of(definition)) {
                    return Ok(*tag);
                }
            }
        }
        self.register(ty)
    }

    /// Check if a tag has been registered
    pub fn is_registered(&self, tag: TypeTag) -> bool {
        self.state.read().by_tag.contains_key(&tag)
    }

    /// Check if the type behind `tag` derives from or implements `ancestor`
    pub fn is_subtype(&self, tag: TypeTag, ancestor: TypeTag) -> BridgeResult<bool> {
        let ty = self.resolve(tag)?;
        let ancestor = self.resolve(ancestor)?;
        Ok(ty.is_subtype_of(&ancestor))
    }

    /// Number of registered tags
    pub fn len(&self) -> usize {
        self.state.read().by_tag.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native property id for a property declared on `declaring`, cached
    pub fn property_id(&self, declaring: &TypeRef, name: &str) -> BridgeResult<PropertyId> {
        let tag = self.tag_of(declaring)?;
        let key = (tag, name.to_string());
        if let Some(id) = self.properties.get(&key) {
            return Ok(*id);
        }
        let id = self
            .engine
            .lookup_property(tag, name)
            .ok_or_else(|| BridgeError::UnknownProperty {
                type_name: declaring.full_name().to_string(),
                property: name.to_string(),
            })?;
        self.properties.insert(key, id);
        Ok(id)
    }

    /// Native event id for an event declared on `declaring`, cached
    pub fn event_id(&self, declaring: &TypeRef, name: &str) -> BridgeResult<EventId> {
        let tag = self.tag_of(declaring)?;
        let key = (tag, name.to_string());
        if let Some(id) = self.events.get(&key) {
            return Ok(*id);
        }
        let id = self
            .engine
            .lookup_event(tag, name)
            .ok_or_else(|| BridgeError::UnknownEvent {
                type_name: declaring.full_name().to_string(),
                event: name.to_string(),
            })?;
        self.events.insert(key, id);
        Ok(id)
    }
}
