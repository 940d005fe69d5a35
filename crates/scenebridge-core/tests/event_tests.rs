//! Event bridge integration tests
//!
//! Native events raised by the headless engine reach managed handlers through
//! the per-event trampolines. Handler failures never unwind into the engine;
//! they are reported through its unhandled-error channel.

mod common;

use common::connect;
use scenebridge_core::types::builtins;
use scenebridge_core::{BridgeError, BridgeOptions, ErrorKind, HandlerError, ManagedObject, ObjectRef, Value};
use scenebridge_sdk::{TypeTag, WireValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

fn counter() -> (Arc<AtomicUsize>, impl Fn(&ObjectRef, &Value) -> Result<(), HandlerError> + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = count.clone();
    let handler = move |_sender: &ObjectRef, _args: &Value| -> Result<(), HandlerError> {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };
    (count, handler)
}

// ===== Dispatch =====

#[test]
fn test_handler_receives_sender_and_args() {
    let (engine, bridge) = connect();
    let button = bridge.create_object(&builtins().border).unwrap();
    let seen: Arc<Mutex<Vec<(u64, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bridge
        .subscribe(&button, "SizeChanged", move |sender, args| {
            sink.lock().unwrap().push((sender.handle().as_u64(), args.clone()));
            Ok(())
        })
        .unwrap();

    let raised = engine.raise_event(button.handle(), "SizeChanged", WireValue::f64(2.5));
    assert_eq!(raised, 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, button.handle().as_u64());
    assert_eq!(seen[0].1, Value::F64(2.5));
}

#[test]
fn test_trampoline_shared_per_event_kind() {
    let (engine, bridge) = connect();
    let a = bridge.create_object(&builtins().canvas).unwrap();
    let b = bridge.create_object(&builtins().text_block).unwrap();
    let (count, handler) = counter();
    let handler = Arc::new(handler);

    let h = handler.clone();
    bridge.subscribe(&a, "Loaded", move |s, v| h(s, v)).unwrap();
    let h = handler.clone();
    bridge.subscribe(&b, "Loaded", move |s, v| h(s, v)).unwrap();
    let h = handler.clone();
    bridge.subscribe(&a, "MouseEnter", move |s, v| h(s, v)).unwrap();
    assert_eq!(bridge.events().trampoline_count(), 2);

    engine.raise_event(a.handle(), "Loaded", WireValue::null(TypeTag::INVALID));
    engine.raise_event(b.handle(), "Loaded", WireValue::null(TypeTag::INVALID));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().stack_panel).unwrap();
    let (count, handler) = counter();
    let token = bridge.subscribe(&element, "Loaded", handler).unwrap();
    assert_eq!(engine.handler_count(element.handle()), 1);

    bridge.unsubscribe(&element, "Loaded", token).unwrap();
    bridge.unsubscribe(&element, "Loaded", token).unwrap();
    assert_eq!(engine.handler_count(element.handle()), 0);
    assert_eq!(engine.raise_event(element.handle(), "Loaded", WireValue::null(TypeTag::INVALID)), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(element.peer().subscription_count(), 0);
}

#[test]
fn test_unsubscribe_all_removes_every_handler() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().canvas).unwrap();
    let (count, handler) = counter();
    let handler = Arc::new(handler);
    let h = handler.clone();
    bridge.subscribe(&element, "Loaded", move |s, v| h(s, v)).unwrap();
    let h = handler.clone();
    bridge.subscribe(&element, "MouseEnter", move |s, v| h(s, v)).unwrap();
    assert_eq!(engine.handler_count(element.handle()), 2);

    assert_eq!(bridge.events().unsubscribe_all(&bridge, &element), 2);
    assert_eq!(engine.handler_count(element.handle()), 0);
    assert_eq!(element.peer().subscription_count(), 0);
    engine.raise_event(element.handle(), "MouseEnter", WireValue::null(TypeTag::INVALID));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_event() {
    let (_engine, bridge) = connect();
    let element = bridge.create_object(&builtins().text_block).unwrap();
    let (_count, handler) = counter();
    let err = bridge.subscribe(&element, "Clicked", handler).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownEvent { ref event, .. } if event == "Clicked"));
}

// ===== Handler Failures =====

#[test]
fn test_handler_error_is_reported_and_dispatch_continues() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().canvas).unwrap();
    bridge
        .subscribe(&element, "Loaded", |_, _| {
            Err(HandlerError::new("bad layout").with_kind(ErrorKind::Argument))
        })
        .unwrap();
    let (count, handler) = counter();
    bridge.subscribe(&element, "Loaded", handler).unwrap();

    assert_eq!(engine.raise_event(element.handle(), "Loaded", WireValue::null(TypeTag::INVALID)), 2);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    let errors = engine.reported_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Argument);
    assert_eq!(errors[0].message, "bad layout");
}

#[test]
fn test_handler_panic_does_not_unwind_into_engine() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().border).unwrap();
    bridge
        .subscribe(&element, "Loaded", |_, _| -> Result<(), HandlerError> { panic!("handler exploded") })
        .unwrap();

    engine.raise_event(element.handle(), "Loaded", WireValue::null(TypeTag::INVALID));
    let errors = engine.reported_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Exception);
    assert!(errors[0].message.contains("handler exploded"));
}

#[test]
fn test_unreported_panics_are_only_logged() {
    let options = BridgeOptions {
        report_handler_panics: false,
        ..BridgeOptions::default()
    };
    let (engine, bridge) = scenebridge_core::headless::connect_with(options);
    let element = bridge.create_object(&builtins().border).unwrap();
    bridge
        .subscribe(&element, "Loaded", |_, _| -> Result<(), HandlerError> { panic!("quiet") })
        .unwrap();

    engine.raise_event(element.handle(), "Loaded", WireValue::null(TypeTag::INVALID));
    assert!(engine.reported_errors().is_empty());
}

#[test]
fn test_dispatch_off_thread_is_reported() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().canvas).unwrap();
    let (count, handler) = counter();
    bridge.subscribe(&element, "Loaded", handler).unwrap();

    let handle = element.handle();
    let remote = engine.clone();
    thread::spawn(move || remote.raise_event(handle, "Loaded", WireValue::null(TypeTag::INVALID)))
        .join()
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    let errors = engine.reported_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Unauthorized);
}

// ===== Teardown Races =====

#[test]
fn test_released_object_drops_its_handlers() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().canvas).unwrap();
    let handle = element.handle();
    let (count, handler) = counter();
    bridge.subscribe(&element, "Loaded", handler).unwrap();

    drop(element);
    assert!(!engine.is_alive(handle));
    assert_eq!(engine.raise_event(handle, "Loaded", WireValue::null(TypeTag::INVALID)), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_event_after_teardown_is_ignored() {
    let (engine, bridge) = connect();
    let element = bridge.create_object(&builtins().canvas).unwrap();
    let (count, handler) = counter();
    bridge.subscribe(&element, "Loaded", handler).unwrap();
    let handle = element.handle();

    bridge.teardown();
    engine.raise_event(handle, "Loaded", WireValue::null(TypeTag::INVALID));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(engine.reported_errors().is_empty());
}
