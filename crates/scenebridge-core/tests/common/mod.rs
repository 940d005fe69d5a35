//! Shared fixtures for the integration tests
#![allow(dead_code)]

use scenebridge_core::types::{builtins, ManagedType, Module, PropertyDesc};
use scenebridge_core::{headless, Bridge, HeadlessEngine, ManagedObject, NativePeer, ObjectRef, TypeRef};
use scenebridge_sdk::{NativeHandle, WirePayload, WireValue};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A headless engine and a bridge connected to it
pub fn connect() -> (Arc<HeadlessEngine>, Arc<Bridge>) {
    headless::connect()
}

/// Handle carried by an object-tagged wire value
pub fn handle_of(wire: &WireValue) -> NativeHandle {
    match wire.payload {
        WirePayload::Object(handle) => handle,
        _ => panic!("expected an object value, got {:?}", wire),
    }
}

/// Wrapper with its own state, counting mentor notifications
pub struct Gauge {
    peer: NativePeer,
    pub mentor_changes: AtomicUsize,
}

impl Gauge {
    pub fn wrap(peer: NativePeer) -> ObjectRef {
        Arc::new(Gauge {
            peer,
            mentor_changes: AtomicUsize::new(0),
        })
    }

    pub fn mentor_changes(&self) -> usize {
        self.mentor_changes.load(Ordering::SeqCst)
    }
}

impl ManagedObject for Gauge {
    fn peer(&self) -> &NativePeer {
        &self.peer
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn on_mentor_changed(&self, _mentor: Option<&ObjectRef>) {
        self.mentor_changes.fetch_add(1, Ordering::SeqCst);
    }
}

/// `Demo.Gauge`: a framework element with one native and one local property
pub fn gauge_type() -> TypeRef {
    ManagedType::class("Gauge")
        .namespace("Demo")
        .module("demo")
        .base(&builtins().framework_element)
        .property(PropertyDesc::native("Value", &builtins().double))
        .property(PropertyDesc::local("Caption", &builtins().string))
        .wrap(Gauge::wrap)
        .build()
}

/// Module `demo` holding `types`, reachable through `urn:demo`
pub fn demo_module(types: &[TypeRef]) -> Module {
    let mut module = Module::new("demo").with_xmlns("urn:demo", "Demo");
    for ty in types {
        module.add_type(ty);
    }
    module
}
