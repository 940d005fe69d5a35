//! Error types reported by native engine calls

use crate::handle::{EventId, NativeHandle, SubscriptionToken};
use crate::tag::TypeTag;
use crate::wire::ErrorRecord;

/// Result type for native engine calls
pub type NativeResult<T> = Result<T, NativeError>;

/// Native engine error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum NativeError {
    /// Handle does not name a live native object
    #[error("Invalid native handle: {0}")]
    InvalidHandle(NativeHandle),

    /// Tag is not known to the engine
    #[error("Unknown type tag: {0}")]
    UnknownTag(TypeTag),

    /// Type cannot be instantiated natively
    #[error("Type {0} cannot be instantiated")]
    NotInstantiable(TypeTag),

    /// Subscription does not exist
    #[error("No subscription {token} for {event} on {handle}")]
    UnknownSubscription {
        /// Object the handler was attached to
        handle: NativeHandle,
        /// Event kind
        event: EventId,
        /// Token returned at subscription
        token: SubscriptionToken,
    },

    /// Collection index out of range
    #[error("Index {index} out of range for collection of {count}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of items
        count: usize,
    },

    /// The engine rejected the value or operation
    #[error("{0}")]
    Rejected(String),

    /// Structured error record produced by the engine
    #[error("{0}")]
    Record(ErrorRecord),
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::Rejected(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::Rejected(s.to_string())
    }
}
