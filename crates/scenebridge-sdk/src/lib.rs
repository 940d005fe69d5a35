//! SceneBridge SDK - boundary types for the native scene-graph engine
//!
//! This crate holds the small set of types that cross the boundary between the
//! managed object model (`scenebridge-core`) and a reference-counted native
//! scene-graph engine:
//!
//! - [`NativeHandle`]: opaque identifier of a native object
//! - [`TypeTag`]: compact type identifier ("kind") shared by both sides
//! - [`WireValue`]: a tagged value as it travels across the boundary
//! - [`NativeEngine`]: the operations the bridge needs from the engine
//!
//! Native engine bindings depend on this crate only, without pulling in the
//! bridge itself.
//!
//! # Example
//!
//! ```ignore
//! use scenebridge_sdk::{NativeHandle, TypeTag, WireValue};
//!
//! let width = WireValue::f64(120.0);
//! let child = WireValue::object(TypeTag::CANVAS, NativeHandle::new(42));
//! assert_eq!(child.as_object(), Some(NativeHandle::new(42)));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod engine;
pub mod error;
pub mod handle;
pub mod tag;
pub mod wire;

pub use engine::{EventCallback, NativeEngine, TypeRegistration};
pub use error::{NativeError, NativeResult};
pub use handle::{EventId, NativeHandle, PropertyId, SubscriptionToken};
pub use tag::TypeTag;
pub use wire::{ErrorKind, ErrorRecord, WirePayload, WireValue};
