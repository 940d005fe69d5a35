//! Document object-graph builder
//!
//! Callbacks from an external markup parser become object creation, member
//! assignment, collection appends, and event subscriptions on a [`Bridge`].
//!
//! [`Bridge`]: crate::Bridge

pub mod builder;
pub mod error;
pub mod namespaces;
pub mod probe;

pub use builder::{content_property_name, BuilderState, CallbackFrame, DocumentBuilder};
pub use error::{BuildError, BuildResult};
pub use namespaces::NamespaceTable;
pub use probe::{Member, MemberProbe, ProbeStep};
