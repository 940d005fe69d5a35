//! In-memory native engine
//!
//! [`HeadlessEngine`] implements [`NativeEngine`] without a renderer. It keeps
//! real reference counts and reports toggle crossings and final releases to a
//! connected [`Bridge`], so the full ownership protocol can be exercised in
//! tests and tools. Object-valued properties, collection items, and
//! dictionary entries hold references on the objects they contain, and give
//! managed values back to the bridge when they stop holding them.
//!
//! Unset properties read back as an untyped null.

use crate::bridge::Bridge;
use crate::options::BridgeOptions;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use scenebridge_sdk::{
    ErrorRecord, EventCallback, EventId, NativeEngine, NativeError, NativeHandle, NativeResult, PropertyId,
    SubscriptionToken, TypeRegistration, TypeTag, WirePayload, WireValue,
};
use std::sync::{Arc, Weak};

/// Native-side value parser used as the last conversion fallback
pub type ValueParser = Arc<dyn Fn(TypeTag, &str) -> Option<WireValue> + Send + Sync>;

struct HeadlessObject {
    tag: TypeTag,
    refs: u32,
    toggle_refs: u32,
    properties: FxHashMap<PropertyId, WireValue>,
    handlers: Vec<(EventId, SubscriptionToken, EventCallback)>,
    items: Vec<WireValue>,
    entries: Vec<(String, WireValue)>,
}

impl HeadlessObject {
    fn new(tag: TypeTag) -> Self {
        Self {
            tag,
            refs: 1,
            toggle_refs: 0,
            properties: FxHashMap::default(),
            handlers: Vec::new(),
            items: Vec::new(),
            entries: Vec::new(),
        }
    }

    fn held_values(&mut self) -> Vec<WireValue> {
        let mut held: Vec<WireValue> = self.properties.drain().map(|(_, v)| v).collect();
        held.append(&mut self.items);
        held.extend(self.entries.drain(..).map(|(_, v)| v));
        held
    }
}

enum Notification {
    Toggle(NativeHandle, bool),
    FinalRelease(NativeHandle),
    ReleaseManaged(u64),
}

struct HeadlessState {
    next_handle: u64,
    next_tag: u32,
    next_token: u64,
    next_member: u32,
    objects: FxHashMap<NativeHandle, HeadlessObject>,
    registrations: FxHashMap<TypeTag, TypeRegistration>,
    properties: FxHashMap<(TypeTag, String), PropertyId>,
    events: FxHashMap<(TypeTag, String), EventId>,
    errors: Vec<ErrorRecord>,
    notification_errors: Vec<String>,
}

impl HeadlessState {
    fn object(&mut self, handle: NativeHandle) -> NativeResult<&mut HeadlessObject> {
        self.objects.get_mut(&handle).ok_or(NativeError::InvalidHandle(handle))
    }

    fn is_known_tag(&self, tag: TypeTag) -> bool {
        (tag.is_builtin() && !tag.is_value_kind()) || self.registrations.contains_key(&tag)
    }

    fn retain(&mut self, handle: NativeHandle, notes: &mut Vec<Notification>) -> NativeResult<()> {
        let object = self.object(handle)?;
        object.refs += 1;
        if object.toggle_refs > 0 && object.refs == 2 {
            notes.push(Notification::Toggle(handle, false));
        }
        Ok(())
    }

    fn retain_value(&mut self, value: &WireValue, notes: &mut Vec<Notification>) -> NativeResult<()> {
        if let WirePayload::Object(handle) = value.payload {
            self.retain(handle, notes)?;
        }
        Ok(())
    }

    fn release(&mut self, handle: NativeHandle, toggle: bool, notes: &mut Vec<Notification>) -> NativeResult<()> {
        let object = self.object(handle)?;
        if toggle {
            object.toggle_refs = object.toggle_refs.saturating_sub(1);
        }
        object.refs = object.refs.saturating_sub(1);
        let (refs, toggle_refs) = (object.refs, object.toggle_refs);
        match refs {
            0 => self.destroy(handle, notes),
            1 if toggle_refs > 0 && !toggle => notes.push(Notification::Toggle(handle, true)),
            _ => {}
        }
        Ok(())
    }

    fn release_value(&mut self, value: WireValue, notes: &mut Vec<Notification>) {
        match value.payload {
            WirePayload::Object(handle) => {
                if let Err(e) = self.release(handle, false, notes) {
                    tracing::warn!(%handle, error = %e, "held object already destroyed");
                }
            }
            WirePayload::Managed(id) => notes.push(Notification::ReleaseManaged(id)),
            _ => {}
        }
    }


    fn destroy(&mut self, handle: NativeHandle, notes: &mut Vec<Notification>) {
        let Some(mut object) = self.objects.remove(&handle) else {
            return;
        };
        notes.push(Notification::FinalRelease(handle));
        for value in object.held_values() {
            self.release_value(value, notes);
        }
    }

    fn next_member_id(&mut self) -> u32 {
        self.next_member += 1;
        self.next_member
    }
}

/// Give back a value handed to a dead object
fn refuse_value(handle: NativeHandle, value: WireValue, notes: &mut Vec<Notification>) -> NativeError {
    if let WirePayload::Managed(id) = value.payload {
        notes.push(Notification::ReleaseManaged(id));
    }
    NativeError::InvalidHandle(handle)
}

/// In-memory [`NativeEngine`]
pub struct HeadlessEngine {
    state: Mutex<HeadlessState>,
    bridge: Mutex<Option<Weak<Bridge>>>,
    parser: Mutex<Option<ValueParser>>,
}

impl HeadlessEngine {
    /// Create an engine with no objects
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                next_handle: 0x1000,
                next_tag: TypeTag::FIRST_USER.as_u32(),
                next_token: 1,
                next_member: 0,
                objects: FxHashMap::default(),
                registrations: FxHashMap::default(),
                properties: FxHashMap::default(),
                events: FxHashMap::default(),
                errors: Vec::new(),
                notification_errors: Vec::new(),
            }),
            bridge: Mutex::new(None),
            parser: Mutex::new(None),
        }
    }

    /// Send toggle, final-release, and managed-release notifications to `bridge`
    pub fn connect(&self, bridge: &Arc<Bridge>) {
        *self.bridge.lock() = Some(Arc::downgrade(bridge));
    }

    /// Install a native value parser
    pub fn set_value_parser<F>(&self, parser: F)
    where
        F: Fn(TypeTag, &str) -> Option<WireValue> + Send + Sync + 'static,
    {
        *self.parser.lock() = Some(Arc::new(parser));
    }

    fn dispatch(&self, notes: Vec<Notification>) {
        if notes.is_empty() {
            return;
        }
        let bridge = self.bridge.lock().as_ref().and_then(Weak::upgrade);
        let Some(bridge) = bridge else {
            return;
        };
        for note in notes {
            match note {
                Notification::Toggle(handle, is_last) => {
                    if let Err(e) = bridge.toggle(handle, is_last) {
                        tracing::error!(%handle, error = %e, "toggle notification failed");
                        self.state.lock().notification_errors.push(e.to_string());
                    }
                }
                Notification::FinalRelease(handle) => bridge.final_release(handle),
                Notification::ReleaseManaged(id) => bridge.release_managed(id),
            }
        }
    }

    fn with_notes<T>(&self, f: impl FnOnce(&mut HeadlessState, &mut Vec<Notification>) -> NativeResult<T>) -> NativeResult<T> {
        let mut notes = Vec::new();
        let result = {
            let mut state = self.state.lock();
            f(&mut state, &mut notes)
        };
        self.dispatch(notes);
        result
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Reference count of `handle`, or `None` once destroyed
    pub fn refcount(&self, handle: NativeHandle) -> Option<u32> {
        self.state.lock().objects.get(&handle).map(|o| o.refs)
    }

    /// Check if `handle` names a live object
    pub fn is_alive(&self, handle: NativeHandle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Number of registered user types
    pub fn registered_type_count(&self) -> usize {
        self.state.lock().registrations.len()
    }

    /// Registration record of a user type
    pub fn registration(&self, tag: TypeTag) -> Option<TypeRegistration> {
        self.state.lock().registrations.get(&tag).cloned()
    }

    /// Number of event handlers attached to `handle`
    pub fn handler_count(&self, handle: NativeHandle) -> usize {
        self.state.lock().objects.get(&handle).map_or(0, |o| o.handlers.len())
    }

    /// Errors reported through `report_unhandled_error`
    pub fn reported_errors(&self) -> Vec<ErrorRecord> {
        self.state.lock().errors.clone()
    }

    /// Failures returned by the bridge while handling notifications
    pub fn notification_errors(&self) -> Vec<String> {
        self.state.lock().notification_errors.clone()
    }

    // ========================================================================
    // Event Raising
    // ========================================================================

    /// Fire every handler attached to `handle` for events named `name`;
    /// returns how many handlers ran
    pub fn raise_event(&self, handle: NativeHandle, name: &str, args: WireValue) -> usize {
        let callbacks: Vec<(SubscriptionToken, EventCallback)> = {
            let state = self.state.lock();
            let ids: Vec<EventId> = state
                .events
                .iter()
                .filter(|((_, n), _)| n == name)
                .map(|(_, id)| *id)
                .collect();
            match state.objects.get(&handle) {
                Some(object) => object
                    .handlers
                    .iter()
                    .filter(|(event, _, _)| ids.contains(event))
                    .map(|(_, token, callback)| (*token, callback.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };
        for (token, callback) in &callbacks {
            callback(handle, *token, &args);
        }
        callbacks.len()
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for HeadlessEngine {
    fn add_ref(&self, handle: NativeHandle) -> NativeResult<()> {
        self.with_notes(|state, notes| state.retain(handle, notes))
    }

    fn release(&self, handle: NativeHandle) -> NativeResult<()> {
        self.with_notes(|state, notes| state.release(handle, false, notes))
    }

    fn add_toggle_ref(&self, handle: NativeHandle) -> NativeResult<bool> {
        let mut state = self.state.lock();
        let object = state.object(handle)?;
        object.refs += 1;
        object.toggle_refs += 1;
        Ok(object.refs == 1)
    }

    fn remove_toggle_ref(&self, handle: NativeHandle) -> NativeResult<()> {
        self.with_notes(|state, notes| state.release(handle, true, notes))
    }

    fn create_object(&self, tag: TypeTag) -> NativeResult<NativeHandle> {
        let mut state = self.state.lock();
        if tag.is_value_kind() {
            return Err(NativeError::NotInstantiable(tag));
        }
        if !state.is_known_tag(tag) {
            return Err(NativeError::UnknownTag(tag));
        }
        state.next_handle += 0x10;
        let handle = NativeHandle::new(state.next_handle);
        state.objects.insert(handle, HeadlessObject::new(tag));
        Ok(handle)
    }

    fn object_type(&self, handle: NativeHandle) -> NativeResult<TypeTag> {
        Ok(self.state.lock().object(handle)?.tag)
    }

    fn register_type(&self, registration: &TypeRegistration) -> NativeResult<TypeTag> {
        let mut state = self.state.lock();
        if registration.parent != TypeTag::INVALID && !state.is_known_tag(registration.parent) {
            return Err(NativeError::UnknownTag(registration.parent));
        }
        let tag = TypeTag(state.next_tag);
        state.next_tag += 1;
        state.registrations.insert(tag, registration.clone());
        Ok(tag)
    }

    fn lookup_property(&self, owner: TypeTag, name: &str) -> Option<PropertyId> {
        let mut state = self.state.lock();
        if let Some(id) = state.properties.get(&(owner, name.to_string())) {
            return Some(*id);
        }
        let id = PropertyId(state.next_member_id());
        state.properties.insert((owner, name.to_string()), id);
        Some(id)
    }

    fn get_property(&self, handle: NativeHandle, property: PropertyId) -> NativeResult<WireValue> {
        let mut state = self.state.lock();
        let object = state.object(handle)?;
        Ok(object
            .properties
            .get(&property)
            .cloned()
            .unwrap_or_else(|| WireValue::null(TypeTag::INVALID)))
    }

    fn set_property(&self, handle: NativeHandle, property: PropertyId, value: WireValue) -> NativeResult<()> {
        self.with_notes(|state, notes| {
            if !state.objects.contains_key(&handle) {
                return Err(refuse_value(handle, value, notes));
            }
            state.retain_value(&value, notes)?;
            let previous = state.object(handle)?.properties.insert(property, value);
            if let Some(previous) = previous {
                state.release_value(previous, notes);
            }
            Ok(())
        })
    }

    fn clear_property(&self, handle: NativeHandle, property: PropertyId) -> NativeResult<()> {
        self.with_notes(|state, notes| {
            if let Some(previous) = state.object(handle)?.properties.remove(&property) {
                state.release_value(previous, notes);
            }
            Ok(())
        })
    }

    fn lookup_event(&self, owner: TypeTag, name: &str) -> Option<EventId> {
        let mut state = self.state.lock();
        if let Some(id) = state.events.get(&(owner, name.to_string())) {
            return Some(*id);
        }
        let id = EventId(state.next_member_id());
        state.events.insert((owner, name.to_string()), id);
        Some(id)
    }

    fn add_event_handler(
        &self,
        handle: NativeHandle,
        event: EventId,
        callback: EventCallback,
    ) -> NativeResult<SubscriptionToken> {
        let mut state = self.state.lock();
        let token = SubscriptionToken(state.next_token);
        state.next_token += 1;
        state.object(handle)?.handlers.push((event, token, callback));
        Ok(token)
    }

    fn remove_event_handler(&self, handle: NativeHandle, event: EventId, token: SubscriptionToken) -> NativeResult<()> {
        let removed = {
            let mut state = self.state.lock();
            let object = state.object(handle)?;
            let position = object
                .handlers
                .iter()
                .position(|(e, t, _)| *e == event && *t == token)
                .ok_or(NativeError::UnknownSubscription { handle, event, token })?;
            object.handlers.remove(position)
        };
        drop(removed);
        Ok(())
    }

    fn collection_add(&self, collection: NativeHandle, item: WireValue) -> NativeResult<usize> {
        self.with_notes(|state, notes| {
            if !state.objects.contains_key(&collection) {
                return Err(refuse_value(collection, item, notes));
            }
            state.retain_value(&item, notes)?;
            let items = &mut state.object(collection)?.items;
            items.push(item);
            Ok(items.len() - 1)
        })
    }

    fn collection_count(&self, collection: NativeHandle) -> NativeResult<usize> {
        Ok(self.state.lock().object(collection)?.items.len())
    }

    fn collection_get(&self, collection: NativeHandle, index: usize) -> NativeResult<WireValue> {
        let mut state = self.state.lock();
        let items = &state.object(collection)?.items;
        items.get(index).cloned().ok_or(NativeError::IndexOutOfRange {
            index,
            count: items.len(),
        })
    }

    fn dictionary_add(&self, dictionary: NativeHandle, key: &str, value: WireValue) -> NativeResult<()> {
        self.with_notes(|state, notes| {
            if !state.objects.contains_key(&dictionary) {
                return Err(refuse_value(dictionary, value, notes));
            }
            state.retain_value(&value, notes)?;
            let entries = &mut state.object(dictionary)?.entries;
            let previous = match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => Some(std::mem::replace(&mut entry.1, value)),
                None => {
                    entries.push((key.to_string(), value));
                    None
                }
            };
            if let Some(previous) = previous {
                state.release_value(previous, notes);
            }
            Ok(())
        })
    }

    fn dictionary_get(&self, dictionary: NativeHandle, key: &str) -> NativeResult<Option<WireValue>> {
        let mut state = self.state.lock();
        let entries = &state.object(dictionary)?.entries;
        Ok(entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
    }

    fn parse_value(&self, tag: TypeTag, text: &str) -> Option<WireValue> {
        let parser = self.parser.lock().clone()?;
        parser(tag, text)
    }

    fn report_unhandled_error(&self, error: ErrorRecord) {
        tracing::debug!(%error, "unhandled managed error reported");
        self.state.lock().errors.push(error);
    }
}

/// Create a headless engine and a bridge connected to it
pub fn connect() -> (Arc<HeadlessEngine>, Arc<Bridge>) {
    connect_with(BridgeOptions::default())
}

/// Create a headless engine and a bridge with `options` connected to it
pub fn connect_with(options: BridgeOptions) -> (Arc<HeadlessEngine>, Arc<Bridge>) {
    let engine = Arc::new(HeadlessEngine::new());
    let bridge = Bridge::with_options(engine.clone(), options);
    engine.connect(&bridge);
    (engine, bridge)
}
