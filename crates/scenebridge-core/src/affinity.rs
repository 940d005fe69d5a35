//! UI-thread affinity checks

use crate::error::{BridgeError, BridgeResult};
use std::thread::{self, ThreadId};

/// Records the thread that owns the object graph and refuses access from
/// any other thread.
#[derive(Debug, Clone)]
pub struct ThreadAffinity {
    owner: ThreadId,
    enforce: bool,
}

impl ThreadAffinity {
    /// Bind to the current thread
    pub fn current(enforce: bool) -> Self {
        Self {
            owner: thread::current().id(),
            enforce,
        }
    }

    /// Owning thread
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Check if the calling thread is the owner
    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Fail with `CrossThreadAccess` when called off the owning thread
    pub fn check(&self, operation: &'static str) -> BridgeResult<()> {
        if self.enforce && !self.is_owner() {
            tracing::warn!(operation, "refused cross-thread access");
            return Err(BridgeError::CrossThreadAccess { operation });
        }
        Ok(())
    }
}
