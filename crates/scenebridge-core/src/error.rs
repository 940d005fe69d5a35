//! Bridge error types

use scenebridge_sdk::{NativeError, NativeHandle, TypeTag};
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the bridge.
///
/// Protocol violations between the two runtimes are fatal (see
/// [`BridgeError::is_fatal`]); everything else is an ordinary failure of one
/// operation.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The native side broke the wire protocol
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A tag that was never registered
    #[error("Unknown type tag: {0}")]
    UnknownTypeTag(TypeTag),

    /// Abstract, interface, or native-only tag reached construction
    #[error("Type {type_name} ({tag}) cannot be constructed")]
    NotConstructible {
        /// Offending tag
        tag: TypeTag,
        /// Managed type name
        type_name: String,
    },

    /// Concrete tag with no constructor in the factory table
    #[error("No constructor registered for {0}")]
    MissingConstructor(TypeTag),

    /// Toggle to Strong found the target already collected
    #[error("Toggle target for {0} was collected while the native side still referenced it")]
    ToggleTargetCollected(NativeHandle),

    /// A second live wrapper for a mapped handle (strict mode only)
    #[error("Handle {0} is already mapped to a live wrapper")]
    DuplicateMapping(NativeHandle),

    /// Operation attempted off the UI thread
    #[error("Cross-thread access during {operation}")]
    CrossThreadAccess {
        /// Operation that was refused
        operation: &'static str,
    },

    /// The wrapper's native object has been released
    #[error("Object {0} is detached from its native peer")]
    Detached(NativeHandle),

    /// Property not found on a type
    #[error("Type {type_name} has no property {property}")]
    UnknownProperty {
        /// Managed type name
        type_name: String,
        /// Property name
        property: String,
    },

    /// Event not found on a type
    #[error("Type {type_name} has no event {event}")]
    UnknownEvent {
        /// Managed type name
        type_name: String,
        /// Event name
        event: String,
    },

    /// Value is not assignable to the property type
    #[error("Cannot assign {actual} to {property} of type {expected}")]
    PropertyTypeMismatch {
        /// Property name
        property: String,
        /// Declared property type
        expected: String,
        /// Type of the offered value
        actual: String,
    },

    /// Write to a read-only property
    #[error("Property {0} is read-only")]
    ReadOnlyProperty(String),

    /// Collection operation on a non-collection
    #[error("Type {0} is not a collection")]
    NotACollection(String),

    /// Managed handle-table id not published
    #[error("Managed handle not found: {0}")]
    ManagedHandleNotFound(u64),

    /// The bridge was torn down
    #[error("Bridge has been torn down")]
    TornDown,

    /// String conversion failure
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Native engine failure
    #[error("Native error: {0}")]
    Native(#[from] NativeError),
}

impl BridgeError {
    /// Check if the error is an unrecoverable protocol violation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Protocol(_)
                | BridgeError::UnknownTypeTag(_)
                | BridgeError::NotConstructible { .. }
                | BridgeError::MissingConstructor(_)
                | BridgeError::ToggleTargetCollected(_)
                | BridgeError::DuplicateMapping(_)
        )
    }
}

/// A string could not be converted to the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot convert '{text}' from {source_type} to {target_type}")]
pub struct ConversionError {
    /// Type of the input (usually `String`)
    pub source_type: String,
    /// Requested type
    pub target_type: String,
    /// Offending text
    pub text: String,
}

impl ConversionError {
    /// Create a conversion error from a string input
    pub fn from_text(target_type: impl Into<String>, text: impl Into<String>) -> Self {
        ConversionError {
            source_type: "String".to_string(),
            target_type: target_type.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BridgeError::Protocol("bad".into()).is_fatal());
        assert!(BridgeError::UnknownTypeTag(TypeTag(999)).is_fatal());
        assert!(BridgeError::ToggleTargetCollected(NativeHandle::new(1)).is_fatal());
        assert!(!BridgeError::ReadOnlyProperty("Name".into()).is_fatal());
        assert!(!BridgeError::CrossThreadAccess { operation: "set" }.is_fatal());
    }

    #[test]
    fn test_conversion_error_message() {
        let err = ConversionError::from_text("Double", "wide");
        assert_eq!(err.to_string(), "Cannot convert 'wide' from String to Double");
    }
}
