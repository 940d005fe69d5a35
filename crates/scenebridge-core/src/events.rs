//! Event bridge: native events to managed handlers
//!
//! Native code invokes one trampoline per event kind. The trampoline finds
//! the sender's wrapper (without creating one), picks the subscription by
//! token, decodes the arguments, and runs the handler. Handler failures and
//! panics never unwind into native code; they are logged and reported through
//! [`NativeEngine::report_unhandled_error`](scenebridge_sdk::NativeEngine::report_unhandled_error).

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::object::{ObjectRef, Subscription};
use crate::types::TypeRefExt;
use crate::value::Value;
use dashmap::DashMap;
use scenebridge_sdk::{ErrorKind, ErrorRecord, EventCallback, EventId, NativeHandle, SubscriptionToken, WireValue};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// A managed event handler: `(sender, args)`
pub type EventHandler = Arc<dyn Fn(&ObjectRef, &Value) -> Result<(), HandlerError> + Send + Sync>;

/// Failure raised by a managed event handler
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
}

impl HandlerError {
    /// Create a handler error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Exception,
            message: message.into(),
        }
    }

    /// Override the reported error kind
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Native error record for this failure
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord::new(self.kind, self.message.clone())
    }
}

impl From<BridgeError> for HandlerError {
    fn from(e: BridgeError) -> Self {
        let kind = match &e {
            BridgeError::CrossThreadAccess { .. } => ErrorKind::Unauthorized,
            BridgeError::Conversion(_) | BridgeError::PropertyTypeMismatch { .. } => ErrorKind::Argument,
            BridgeError::ReadOnlyProperty(_) | BridgeError::Detached(_) => ErrorKind::InvalidOperation,
            _ => ErrorKind::Exception,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Subscriptions and per-event trampolines
pub struct EventBridge {
    trampolines: DashMap<EventId, EventCallback>,
}

impl EventBridge {
    /// Create an event bridge with no trampolines
    pub fn new() -> Self {
        Self {
            trampolines: DashMap::new(),
        }
    }

    fn trampoline(&self, bridge: &Bridge, event: EventId) -> EventCallback {
        self.trampolines
            .entry(event)
            .or_insert_with(|| {
                let weak = bridge.downgrade();
                let callback: EventCallback =
                    Arc::new(move |sender: NativeHandle, token: SubscriptionToken, args: &WireValue| {
                        if let Some(bridge) = weak.upgrade() {
                            bridge.events().dispatch(&bridge, event, sender, token, args);
                        }
                    });
                callback
            })
            .value()
            .clone()
    }

    /// Number of distinct event kinds with a trampoline
    pub fn trampoline_count(&self) -> usize {
        self.trampolines.len()
    }

    /// Subscribe `handler` to the event `name` of `object`
    pub fn subscribe(
        &self,
        bridge: &Bridge,
        object: &ObjectRef,
        name: &str,
        handler: EventHandler,
    ) -> BridgeResult<SubscriptionToken> {
        bridge.affinity().check("subscribe")?;
        if object.is_detached() {
            return Err(BridgeError::Detached(object.handle()));
        }

        let ty = object.managed_type().clone();
        let (declaring, _) = ty.find_event(name).ok_or_else(|| BridgeError::UnknownEvent {
            type_name: ty.full_name().to_string(),
            event: name.to_string(),
        })?;
        let event = bridge.registry().event_id(declaring, name)?;
        let callback = self.trampoline(bridge, event);
        let token = bridge.engine().add_event_handler(object.handle(), event, callback)?;

        object.peer().add_subscription(
            token,
            Subscription {
                event,
                name: name.to_string(),
                handler,
            },
        );
        tracing::debug!(handle = %object.handle(), event = name, %token, "subscribed");
        Ok(token)
    }

    /// Remove the subscription `token` from the event `name` of `object`.
    ///
    /// An unknown token is ignored.
    pub fn unsubscribe(
        &self,
        bridge: &Bridge,
        object: &ObjectRef,
        name: &str,
        token: SubscriptionToken,
    ) -> BridgeResult<()> {
        bridge.affinity().check("unsubscribe")?;
        let ty = object.managed_type().clone();
        let (declaring, _) = ty.find_event(name).ok_or_else(|| BridgeError::UnknownEvent {
            type_name: ty.full_name().to_string(),
            event: name.to_string(),
        })?;
        let event = bridge.registry().event_id(declaring, name)?;

        match object.peer().subscription(token) {
            Some(subscription) if subscription.event == event => {
                let removed = object.peer().remove_subscription(token);
                if !object.is_detached() {
                    bridge.engine().remove_event_handler(object.handle(), event, token)?;
                }
                drop(removed);
                tracing::debug!(handle = %object.handle(), event = name, %token, "unsubscribed");
            }
            _ => {
                tracing::trace!(handle = %object.handle(), event = name, %token, "unsubscribe of unknown token");
            }
        }
        Ok(())
    }

    /// Remove every subscription of `object`; returns how many were removed
    pub fn unsubscribe_all(&self, bridge: &Bridge, object: &ObjectRef) -> usize {
        let subscriptions = object.peer().take_subscriptions();
        if !object.is_detached() {
            for (token, subscription) in &subscriptions {
                if let Err(e) = bridge
                    .engine()
                    .remove_event_handler(object.handle(), subscription.event, *token)
                {
                    tracing::warn!(handle = %object.handle(), event = %subscription.name, error = %e, "failed to remove event handler");
                }
            }
        }
        subscriptions.len()
    }

    /// Run the handler subscribed under `token` on `sender`.
    ///
    /// A sender without a live wrapper or an unknown token is a no-op.
    pub fn dispatch(
        &self,
        bridge: &Bridge,
        event: EventId,
        sender: NativeHandle,
        token: SubscriptionToken,
        args: &WireValue,
    ) {
        let Some(object) = bridge.identity().lookup(sender) else {
            tracing::trace!(%sender, %token, "event for unmapped sender");
            return;
        };
        let Some(subscription) = object.peer().subscription(token) else {
            tracing::trace!(%sender, %token, "event for removed subscription");
            return;
        };
        if subscription.event != event {
            return;
        }

        if let Err(e) = bridge.affinity().check("dispatch event") {
            self.report(bridge, &subscription.name, HandlerError::from(e));
            return;
        }
        let args = match bridge.codec().decode(None, args) {
            Ok(value) => value,
            Err(e) => {
                self.report(bridge, &subscription.name, HandlerError::from(e));
                return;
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscription.handler)(&object, &args)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(bridge, &subscription.name, e),
            Err(payload) => {
                let error = HandlerError::new(panic_message(payload.as_ref()));
                if bridge.options().report_handler_panics {
                    self.report(bridge, &subscription.name, error);
                } else {
                    tracing::error!(event = %subscription.name, error = %error, "event handler panicked");
                }
            }
        }
    }

    fn report(&self, bridge: &Bridge, event: &str, error: HandlerError) {
        tracing::error!(event, error = %error, "unhandled error in event handler");
        bridge.engine().report_unhandled_error(error.to_record());
    }

    /// Drop all trampolines
    pub fn clear(&self) {
        let events: Vec<EventId> = self.trampolines.iter().map(|e| *e.key()).collect();
        for event in events {
            self.trampolines.remove(&event);
        }
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless;
    use crate::types::builtins;
    use parking_lot::Mutex;

    #[test]
    fn test_subscribe_and_dispatch() {
        let (engine, bridge) = headless::connect();
        let object = bridge.create_object(&builtins().canvas).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        bridge
            .subscribe(&object, "Loaded", move |sender, args| {
                sink.lock().push((sender.handle(), args.clone()));
                Ok(())
            })
            .unwrap();

        assert_eq!(engine.raise_event(object.handle(), "Loaded", WireValue::i32(7)), 1);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, object.handle());
        assert_eq!(seen[0].1, Value::I32(7));
    }

    #[test]
    fn test_trampolines_are_shared_per_event() {
        let (_engine, bridge) = headless::connect();
        let a = bridge.create_object(&builtins().canvas).unwrap();
        let b = bridge.create_object(&builtins().border).unwrap();
        bridge.subscribe(&a, "Loaded", |_, _| Ok(())).unwrap();
        bridge.subscribe(&b, "Loaded", |_, _| Ok(())).unwrap();
        bridge.subscribe(&b, "SizeChanged", |_, _| Ok(())).unwrap();
        assert_eq!(bridge.events().trampoline_count(), 2);
    }

    #[test]
    fn test_unknown_event_name() {
        let (_engine, bridge) = headless::connect();
        let object = bridge.create_object(&builtins().solid_color_brush).unwrap();
        let err = bridge.subscribe(&object, "Loaded", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownEvent { .. }));
    }

    #[test]
    fn test_handler_error_is_reported() {
        let (engine, bridge) = headless::connect();
        let object = bridge.create_object(&builtins().canvas).unwrap();
        bridge
            .subscribe(&object, "Loaded", |_, _| Err(HandlerError::new("layout exploded")))
            .unwrap();

        engine.raise_event(object.handle(), "Loaded", WireValue::null(scenebridge_sdk::TypeTag::INVALID));
        let errors = engine.reported_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "layout exploded");
        assert_eq!(errors[0].kind, ErrorKind::Exception);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let (engine, bridge) = headless::connect();
        let object = bridge.create_object(&builtins().canvas).unwrap();
        bridge
            .subscribe(&object, "Loaded", |_, _| panic!("boom"))
            .unwrap();

        engine.raise_event(object.handle(), "Loaded", WireValue::bool(true));
        let errors = engine.reported_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "boom");
    }

    #[test]
    fn test_unsubscribe_by_token() {
        let (engine, bridge) = headless::connect();
        let object = bridge.create_object(&builtins().canvas).unwrap();
        let count = Arc::new(Mutex::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        let handler = move |_: &ObjectRef, _: &Value| -> Result<(), HandlerError> {
            *c1.lock() += 1;
            Ok(())
        };
        let first = bridge.subscribe(&object, "Loaded", handler.clone()).unwrap();
        let _second = bridge
            .subscribe(&object, "Loaded", move |_, _| {
                *c2.lock() += 10;
                Ok(())
            })
            .unwrap();

        bridge.unsubscribe(&object, "Loaded", first).unwrap();
        engine.raise_event(object.handle(), "Loaded", WireValue::null(scenebridge_sdk::TypeTag::INVALID));
        assert_eq!(*count.lock(), 10);

        // already removed
        bridge.unsubscribe(&object, "Loaded", first).unwrap();
    }

    #[test]
    fn test_handler_error_from_bridge_error() {
        let e = HandlerError::from(BridgeError::CrossThreadAccess { operation: "set" });
        assert_eq!(e.kind(), ErrorKind::Unauthorized);
        assert_eq!(e.to_record().kind, ErrorKind::Unauthorized);
    }
}
