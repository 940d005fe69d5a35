//! The native engine interface
//!
//! [`NativeEngine`] lists everything the bridge asks of the native side.
//! Notifications flowing the other way (toggle, final release, mentor changes,
//! attach/detach, strong references, managed releases) are entry points on
//! the bridge itself.
//!
//! A managed wire value handed to the engine carries one reference to the
//! published value. The engine gives it back through the bridge's managed
//! release entry point when it stops holding the value, or at once if the
//! call fails without storing it.

use crate::error::NativeResult;
use crate::handle::{EventId, NativeHandle, PropertyId, SubscriptionToken};
use crate::tag::TypeTag;
use crate::wire::{ErrorRecord, WireValue};
use std::sync::Arc;

/// Trampoline invoked by the engine when an event fires.
///
/// Arguments are the sender's handle, the subscription token, and the event
/// arguments. The trampoline never fails; errors are reported through
/// [`NativeEngine::report_unhandled_error`].
pub type EventCallback = Arc<dyn Fn(NativeHandle, SubscriptionToken, &WireValue) + Send + Sync>;

/// Description of a managed type sent to the engine at registration
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRegistration {
    /// Fully qualified managed name
    pub name: String,
    /// Tag of the base type (`TypeTag::INVALID` for roots)
    pub parent: TypeTag,
    /// Tags of the directly implemented interfaces
    pub interfaces: Vec<TypeTag>,
    /// Whether the type is itself an interface
    pub is_interface: bool,
}

/// Operations provided by the native scene-graph engine.
///
/// Every method may be called from the UI thread; reference counting methods
/// may also be called from finalization on any thread.
pub trait NativeEngine: Send + Sync {
    // ========================================================================
    // Reference Counting
    // ========================================================================

    /// Take an ordinary reference
    fn add_ref(&self, handle: NativeHandle) -> NativeResult<()>;

    /// Drop an ordinary reference
    fn release(&self, handle: NativeHandle) -> NativeResult<()>;

    /// Take the bridge's toggle reference.
    ///
    /// From then on the engine reports crossings of the "only the bridge holds
    /// this object" threshold. Returns `true` if the toggle reference is now
    /// the only reference.
    fn add_toggle_ref(&self, handle: NativeHandle) -> NativeResult<bool>;

    /// Drop the bridge's toggle reference
    fn remove_toggle_ref(&self, handle: NativeHandle) -> NativeResult<()>;

    // ========================================================================
    // Objects and Types
    // ========================================================================

    /// Instantiate a native object; one reference is transferred to the caller
    fn create_object(&self, tag: TypeTag) -> NativeResult<NativeHandle>;

    /// Concrete type tag of a native object
    fn object_type(&self, handle: NativeHandle) -> NativeResult<TypeTag>;

    /// Register a user type and allocate its tag
    fn register_type(&self, registration: &TypeRegistration) -> NativeResult<TypeTag>;

    // ========================================================================
    // Properties
    // ========================================================================

    /// Resolve a property declared on `owner` by name
    fn lookup_property(&self, owner: TypeTag, name: &str) -> Option<PropertyId>;

    /// Read a property value
    fn get_property(&self, handle: NativeHandle, property: PropertyId) -> NativeResult<WireValue>;

    /// Write a property value; ownership of the payload moves to the engine
    fn set_property(
        &self,
        handle: NativeHandle,
        property: PropertyId,
        value: WireValue,
    ) -> NativeResult<()>;

    /// Reset a property to its default
    fn clear_property(&self, handle: NativeHandle, property: PropertyId) -> NativeResult<()>;

    // ========================================================================
    // Events
    // ========================================================================

    /// Resolve an event declared on `owner` by name
    fn lookup_event(&self, owner: TypeTag, name: &str) -> Option<EventId>;

    /// Attach a trampoline; the engine allocates the token
    fn add_event_handler(
        &self,
        handle: NativeHandle,
        event: EventId,
        callback: EventCallback,
    ) -> NativeResult<SubscriptionToken>;

    /// Detach a trampoline by token
    fn remove_event_handler(
        &self,
        handle: NativeHandle,
        event: EventId,
        token: SubscriptionToken,
    ) -> NativeResult<()>;

    // ========================================================================
    // Collections
    // ========================================================================

    /// Append an item; returns its index
    fn collection_add(&self, collection: NativeHandle, item: WireValue) -> NativeResult<usize>;

    /// Number of items
    fn collection_count(&self, collection: NativeHandle) -> NativeResult<usize>;

    /// Item at `index`
    fn collection_get(&self, collection: NativeHandle, index: usize) -> NativeResult<WireValue>;

    /// Add a keyed entry to a dictionary
    fn dictionary_add(&self, dictionary: NativeHandle, key: &str, value: WireValue) -> NativeResult<()>;

    /// Look up a keyed entry
    fn dictionary_get(&self, dictionary: NativeHandle, key: &str) -> NativeResult<Option<WireValue>>;

    // ========================================================================
    // Misc
    // ========================================================================

    /// Parse `text` as a value of `tag` using native parsers.
    ///
    /// Last resort for document string conversion.
    fn parse_value(&self, tag: TypeTag, text: &str) -> Option<WireValue> {
        let _ = (tag, text);
        None
    }

    /// Surface an error raised by managed code that nobody handled
    fn report_unhandled_error(&self, error: ErrorRecord);
}
