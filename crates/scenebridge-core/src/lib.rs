//! SceneBridge Core - cross-runtime object bridge
//!
//! This crate pairs Rust-owned wrapper objects with objects living in an
//! external, reference-counted native scene-graph engine:
//! - Value codec (wire values to managed values and back)
//! - Type registry (managed types to native type tags)
//! - Identity map with toggle references (one wrapper per native object)
//! - Object factory (wrapper construction by type tag)
//! - Event bridge (native events to managed handlers)
//! - Document object-graph builder (parser callbacks to a live graph)
//!
//! Everything is owned by a [`Bridge`] service. The [`headless`] module
//! provides an in-memory engine for running the bridge without a renderer.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod affinity;
pub mod bridge;
pub mod document;
pub mod error;
pub mod events;
pub mod headless;
pub mod object;
pub mod options;
pub mod types;
pub mod value;

pub use affinity::ThreadAffinity;
pub use bridge::Bridge;
pub use document::{BuildError, BuildResult, BuilderState, CallbackFrame, DocumentBuilder};
pub use error::{BridgeError, BridgeResult, ConversionError};
pub use events::{EventHandler, HandlerError};
pub use headless::HeadlessEngine;
pub use object::{ManagedObject, NativeObject, NativePeer, ObjectRef, ReferenceMode};
pub use options::BridgeOptions;
pub use types::{builtins, ManagedType, Module, ModuleResolver, ModuleSet, TypeRef, TypeRefExt};
pub use value::{Value, ValueCodec};

pub use scenebridge_sdk::{
    ErrorKind, ErrorRecord, EventId, NativeEngine, NativeHandle, PropertyId, SubscriptionToken,
    TypeTag, WirePayload, WireValue,
};
