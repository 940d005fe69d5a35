//! Opaque identifiers handed out by the native engine

use std::fmt;

/// Opaque, process-unique identifier of a native object.
///
/// Never dereferenced on the managed side. Handles are only used as map keys
/// and as arguments to native calls. `0` is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// The null handle
    pub const NULL: NativeHandle = NativeHandle(0);

    /// Wrap a raw handle value
    pub const fn new(raw: u64) -> Self {
        NativeHandle(raw)
    }

    /// Raw handle value
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check if this is the null handle
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Native identifier of a dependency property (also used for attached properties)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(pub u32);

/// Native identifier of an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u32);

/// Token returned by the engine when a handler is attached.
///
/// Together with the [`EventId`] it identifies one subscription on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub u64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "property#{}", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}
