//! Managed wrappers around native objects
//!
//! Every native object observed by managed code is represented by exactly one
//! wrapper implementing [`ManagedObject`]. The wrapper owns a [`NativePeer`],
//! which carries the native handle, the bridge's toggle reference, managed-side
//! property storage, and the wrapper's event subscriptions.

pub mod factory;
pub mod identity;

pub use factory::{ConstructorTable, ObjectFactory};
pub use identity::{IdentityMap, IdentityStats};

use crate::events::EventHandler;
use crate::types::TypeRef;
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use scenebridge_sdk::{EventId, NativeEngine, NativeHandle, SubscriptionToken, TypeTag};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Shared reference to a wrapper
pub type ObjectRef = Arc<dyn ManagedObject>;

/// Non-owning reference to a wrapper
pub type WeakObjectRef = Weak<dyn ManagedObject>;

/// Ownership mode of an identity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    /// The bridge keeps the wrapper alive; native code holds other references
    Strong,
    /// The bridge only observes the wrapper; its reference is the last one
    Weak,
}

/// A managed wrapper of a native object.
///
/// Implementors embed a [`NativePeer`] and return it from [`peer`](Self::peer).
/// The notification hooks default to no-ops.
pub trait ManagedObject: Any + Send + Sync {
    /// The native peer this wrapper owns
    fn peer(&self) -> &NativePeer;

    /// Upcast for downcasting to the concrete wrapper type
    fn as_any(&self) -> &dyn Any;

    /// The object's mentor (nearest framework-element ancestor) changed
    fn on_mentor_changed(&self, _mentor: Option<&ObjectRef>) {}

    /// The object was attached to a live tree
    fn on_attached(&self) {}

    /// The object was detached from a live tree
    fn on_detached(&self) {}
}

impl dyn ManagedObject {
    /// Native handle
    pub fn handle(&self) -> NativeHandle {
        self.peer().handle()
    }

    /// Concrete native type tag
    pub fn type_tag(&self) -> TypeTag {
        self.peer().type_tag()
    }

    /// Managed type descriptor
    pub fn managed_type(&self) -> &TypeRef {
        self.peer().managed_type()
    }

    /// Check if the native object has been released
    pub fn is_detached(&self) -> bool {
        self.peer().is_detached()
    }

    /// Downcast to a concrete wrapper type
    pub fn downcast_ref<T: ManagedObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for dyn ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("type", &self.managed_type().full_name())
            .field("handle", &self.handle())
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// An event subscription held by a peer
#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) event: EventId,
    pub(crate) name: String,
    pub(crate) handler: EventHandler,
}

/// Managed half of a native object.
///
/// Holds the bridge's toggle reference, which is dropped together with the
/// peer unless the native object has already reported its final release.
pub struct NativePeer {
    handle: NativeHandle,
    tag: TypeTag,
    ty: TypeRef,
    engine: Arc<dyn NativeEngine>,
    detached: AtomicBool,
    attached: AtomicBool,
    locals: Mutex<FxHashMap<String, Value>>,
    subscriptions: Mutex<FxHashMap<SubscriptionToken, Subscription>>,
    strong_refs: Mutex<FxHashMap<(NativeHandle, String), ObjectRef>>,
    mentor: Mutex<Option<WeakObjectRef>>,
}

impl NativePeer {
    /// Create a peer owning one toggle reference on `handle`
    pub fn new(handle: NativeHandle, tag: TypeTag, ty: TypeRef, engine: Arc<dyn NativeEngine>) -> Self {
        Self {
            handle,
            tag,
            ty,
            engine,
            detached: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            locals: Mutex::new(FxHashMap::default()),
            subscriptions: Mutex::new(FxHashMap::default()),
            strong_refs: Mutex::new(FxHashMap::default()),
            mentor: Mutex::new(None),
        }
    }

    /// Native handle (kept for diagnostics after detaching)
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Concrete native type tag
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Managed type descriptor
    pub fn managed_type(&self) -> &TypeRef {
        &self.ty
    }

    /// Engine owning the native object
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Check if the native object has been released
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Check if the object is attached to a live tree
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    /// Current mentor, if it is still alive
    pub fn mentor(&self) -> Option<ObjectRef> {
        self.mentor.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_mentor(&self, mentor: Option<&ObjectRef>) {
        *self.mentor.lock() = mentor.map(Arc::downgrade);
    }

    /// Sever the peer from its native object.
    ///
    /// Called on final release: the handle may be reused by the engine, so
    /// the peer must never touch it again. Returns the state it held so the
    /// caller can drop it outside any lock.
    pub(crate) fn detach(&self) -> DetachedState {
        self.detached.store(true, Ordering::Release);
        DetachedState {
            _locals: std::mem::take(&mut *self.locals.lock()),
            _strong_refs: std::mem::take(&mut *self.strong_refs.lock()),
            _subscriptions: std::mem::take(&mut *self.subscriptions.lock()),
        }
    }

    // ========================================================================
    // Managed-side storage
    // ========================================================================

    /// Value of a managed-side property
    pub fn local(&self, name: &str) -> Option<Value> {
        self.locals.lock().get(name).cloned()
    }

    /// Store a managed-side property; returns the previous value
    pub fn set_local(&self, name: &str, value: Value) -> Option<Value> {
        self.locals.lock().insert(name.to_string(), value)
    }

    /// Remove a managed-side property
    pub fn clear_local(&self, name: &str) -> Option<Value> {
        self.locals.lock().remove(name)
    }

    // ========================================================================
    // Strong references mirrored from native edges
    // ========================================================================

    pub(crate) fn add_strong_ref(&self, referent: NativeHandle, name: &str, object: ObjectRef) -> Option<ObjectRef> {
        self.strong_refs.lock().insert((referent, name.to_string()), object)
    }

    pub(crate) fn clear_strong_ref(&self, referent: NativeHandle, name: &str) -> Option<ObjectRef> {
        self.strong_refs.lock().remove(&(referent, name.to_string()))
    }

    /// Number of mirrored strong references
    pub fn strong_ref_count(&self) -> usize {
        self.strong_refs.lock().len()
    }

    // ========================================================================
    // Event subscriptions
    // ========================================================================

    pub(crate) fn add_subscription(&self, token: SubscriptionToken, subscription: Subscription) {
        self.subscriptions.lock().insert(token, subscription);
    }

    pub(crate) fn remove_subscription(&self, token: SubscriptionToken) -> Option<Subscription> {
        self.subscriptions.lock().remove(&token)
    }

    pub(crate) fn subscription(&self, token: SubscriptionToken) -> Option<Subscription> {
        self.subscriptions.lock().get(&token).cloned()
    }

    pub(crate) fn take_subscriptions(&self) -> Vec<(SubscriptionToken, Subscription)> {
        self.subscriptions.lock().drain().collect()
    }

    /// Number of live event subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

/// State taken out of a peer when it detaches
#[must_use]
pub(crate) struct DetachedState {
    _locals: FxHashMap<String, Value>,
    _strong_refs: FxHashMap<(NativeHandle, String), ObjectRef>,
    _subscriptions: FxHashMap<SubscriptionToken, Subscription>,
}

impl Drop for NativePeer {
    fn drop(&mut self) {
        if self.is_detached() {
            return;
        }
        for (token, subscription) in self.subscriptions.get_mut().drain() {
            if let Err(e) = self.engine.remove_event_handler(self.handle, subscription.event, token) {
                tracing::warn!(handle = %self.handle, %token, error = %e, "failed to remove event handler");
            }
        }
        tracing::trace!(handle = %self.handle, "dropping toggle reference");
        if let Err(e) = self.engine.remove_toggle_ref(self.handle) {
            tracing::warn!(handle = %self.handle, error = %e, "failed to drop toggle reference");
        }
    }
}

impl fmt::Debug for NativePeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePeer")
            .field("handle", &self.handle)
            .field("tag", &self.tag)
            .field("type", &self.ty.full_name())
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Plain wrapper for types with no managed behaviour of their own
#[derive(Debug)]
pub struct NativeObject {
    peer: NativePeer,
}

impl NativeObject {
    /// Wrap a peer; usable as a type's constructor
    pub fn wrap(peer: NativePeer) -> ObjectRef {
        Arc::new(NativeObject { peer })
    }
}

impl ManagedObject for NativeObject {
    fn peer(&self) -> &NativePeer {
        &self.peer
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessEngine;
    use crate::types::builtins;

    #[test]
    fn test_drop_releases_toggle_reference() {
        let engine = Arc::new(HeadlessEngine::new());
        let handle = engine.create_object(TypeTag::CANVAS).unwrap();
        engine.add_toggle_ref(handle).unwrap();
        assert_eq!(engine.refcount(handle), Some(2));

        let peer = NativePeer::new(handle, TypeTag::CANVAS, builtins().canvas.clone(), engine.clone());
        let object = NativeObject::wrap(peer);
        assert_eq!(object.handle(), handle);
        assert_eq!(object.type_tag(), TypeTag::CANVAS);

        drop(object);
        assert_eq!(engine.refcount(handle), Some(1));
    }

    #[test]
    fn test_detached_peer_leaves_native_object_alone() {
        let engine = Arc::new(HeadlessEngine::new());
        let handle = engine.create_object(TypeTag::BORDER).unwrap();
        engine.add_toggle_ref(handle).unwrap();

        let object = NativeObject::wrap(NativePeer::new(
            handle,
            TypeTag::BORDER,
            builtins().border.clone(),
            engine.clone(),
        ));
        object.peer().set_local("Note", Value::from("kept"));
        drop(object.peer().detach());
        assert!(object.is_detached());
        assert_eq!(object.peer().local("Note"), None);

        drop(object);
        assert_eq!(engine.refcount(handle), Some(2));
    }

    #[test]
    fn test_downcast() {
        let engine = Arc::new(HeadlessEngine::new());
        let handle = engine.create_object(TypeTag::CANVAS).unwrap();
        engine.add_toggle_ref(handle).unwrap();
        let object = NativeObject::wrap(NativePeer::new(
            handle,
            TypeTag::CANVAS,
            builtins().canvas.clone(),
            engine.clone(),
        ));
        assert!(object.downcast_ref::<NativeObject>().is_some());
    }
}
