//! Document builder errors

use crate::error::{BridgeError, ConversionError};
use thiserror::Error;

/// Result type for builder callbacks
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors returned from builder callbacks.
///
/// Resolution failures leave the builder usable; the parser decides whether
/// to skip the node or abandon the document. Fatal errors poison the builder.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No type with this name in the namespace
    #[error("Unknown type {name} in namespace '{namespace}'")]
    UnknownType {
        /// Namespace URI searched
        namespace: String,
        /// Element name
        name: String,
    },

    /// Malformed namespace URI
    #[error("Invalid namespace '{0}'")]
    InvalidNamespace(String),

    /// Prefix never imported
    #[error("Unknown namespace prefix '{0}'")]
    UnknownPrefix(String),

    /// Namespace names a module the resolver does not know
    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    /// No property, event, or attached accessor with this name
    #[error("Type {type_name} has no member {member}")]
    UnknownMember {
        /// Managed type name
        type_name: String,
        /// Member name as written
        member: String,
    },

    /// Event handler method not found
    #[error("No handler method {handler} for event {event}")]
    UnknownHandler {
        /// Event name
        event: String,
        /// Handler method name
        handler: String,
    },

    /// Element names an abstract, interface, or value type
    #[error("Type {0} cannot be created from a document")]
    NotConstructible(String),

    /// The wrapper constructor panicked
    #[error("Constructor for {0} failed")]
    ConstructorFailed(String),

    /// A second object registered under the same name
    #[error("Name '{0}' is already registered")]
    DuplicateName(String),

    /// Dictionary entry without a key
    #[error("Dictionary entry of type {0} has no key")]
    MissingKey(String),

    /// `{StaticResource}` key not found
    #[error("Resource '{0}' not found")]
    UnknownResource(String),

    /// Child element on a type with no content property
    #[error("Type {0} has no content property")]
    NoContentProperty(String),

    /// No converter accepted a string value
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Bridge failure
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A fatal error already abandoned this build
    #[error("Builder is poisoned by an earlier fatal error")]
    Poisoned,
}

impl BuildError {
    /// Check if the error abandons the whole build
    pub fn is_fatal(&self) -> bool {
        match self {
            BuildError::Bridge(e) => e.is_fatal(),
            BuildError::Poisoned => true,
            _ => false,
        }
    }
}
