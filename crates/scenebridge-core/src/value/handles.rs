//! Handle table for managed-only values
//!
//! Values with no native counterpart are published under a numeric id so that
//! native code can hold and hand them back. Publishing the same value twice
//! returns the same id. Every publish is one native reference; the value is
//! withdrawn when native code has released each of them.

use crate::error::{BridgeError, BridgeResult};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;

/// A managed-only value shared with native code
pub type ManagedValue = Arc<dyn Any + Send + Sync>;

struct Published {
    value: ManagedValue,
    refs: usize,
}

#[derive(Default)]
struct HandleState {
    next_id: u64,
    values: FxHashMap<u64, Published>,
    ids: FxHashMap<usize, u64>,
}

/// Publishes managed values to native code by id
pub struct ManagedHandleTable {
    state: Mutex<HandleState>,
}

fn identity_of(value: &ManagedValue) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

impl ManagedHandleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandleState {
                next_id: 1,
                ..HandleState::default()
            }),
        }
    }

    /// Publish a value, taking one native reference; returns its id
    pub fn publish(&self, value: ManagedValue) -> u64 {
        let mut state = self.state.lock();
        let key = identity_of(&value);
        if let Some(id) = state.ids.get(&key).copied() {
            if let Some(published) = state.values.get_mut(&id) {
                published.refs += 1;
            }
            return id;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.ids.insert(key, id);
        state.values.insert(id, Published { value, refs: 1 });
        id
    }

    /// Value published under `id`
    pub fn redeem(&self, id: u64) -> BridgeResult<ManagedValue> {
        self.state
            .lock()
            .values
            .get(&id)
            .map(|published| published.value.clone())
            .ok_or(BridgeError::ManagedHandleNotFound(id))
    }

    /// Drop one native reference to `id`; the value is withdrawn with the last.
    ///
    /// Returns `false` if nothing is published under `id`.
    pub fn release(&self, id: u64) -> bool {
        let withdrawn = {
            let mut state = self.state.lock();
            let Some(published) = state.values.get_mut(&id) else {
                return false;
            };
            published.refs -= 1;
            if published.refs > 0 {
                return true;
            }
            let withdrawn = state.values.remove(&id);
            if let Some(published) = &withdrawn {
                state.ids.remove(&identity_of(&published.value));
            }
            withdrawn
        };
        drop(withdrawn);
        true
    }

    /// Outstanding native references to `id`
    pub fn refs(&self, id: u64) -> usize {
        self.state.lock().values.get(&id).map_or(0, |published| published.refs)
    }

    /// Number of published values
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    /// Check if nothing is published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Withdraw everything
    pub fn clear(&self) {
        let drained: Vec<ManagedValue> = {
            let mut state = self.state.lock();
            state.ids.clear();
            state.values.drain().map(|(_, published)| published.value).collect()
        };
        drop(drained);
    }
}

impl Default for ManagedHandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_redeem() {
        let table = ManagedHandleTable::new();
        assert_eq!(table.len(), 0);

        let a: ManagedValue = Arc::new(42i32);
        let b: ManagedValue = Arc::new("payload");
        let id_a = table.publish(a.clone());
        let id_b = table.publish(b);

        assert_ne!(id_a, id_b);
        assert_eq!(table.len(), 2);
        let redeemed = table.redeem(id_a).unwrap();
        assert!(Arc::ptr_eq(&redeemed, &a));
        assert_eq!(redeemed.downcast_ref::<i32>(), Some(&42));
    }

    #[test]
    fn test_publish_is_stable_per_value() {
        let table = ManagedHandleTable::new();
        let a: ManagedValue = Arc::new(7u8);
        let id = table.publish(a.clone());
        assert_eq!(table.publish(a.clone()), id);
        assert_eq!(table.len(), 1);
        assert_eq!(table.refs(id), 2);
        assert_eq!(Arc::strong_count(&a), 2);
    }

    #[test]
    fn test_value_withdrawn_with_last_reference() {
        let table = ManagedHandleTable::new();
        let a: ManagedValue = Arc::new(String::from("row"));
        let id = table.publish(a.clone());
        table.publish(a.clone());

        assert!(table.release(id));
        assert_eq!(table.refs(id), 1);
        assert!(table.redeem(id).is_ok());

        assert!(table.release(id));
        assert_eq!(table.refs(id), 0);
        assert!(table.is_empty());
        assert_eq!(Arc::strong_count(&a), 1);
        assert!(!table.release(id));

        assert_ne!(table.publish(a), id);
    }

    #[test]
    fn test_release() {
        let table = ManagedHandleTable::new();
        let id = table.publish(Arc::new(1u64));
        assert!(table.release(id));
        assert!(matches!(
            table.redeem(id),
            Err(BridgeError::ManagedHandleNotFound(_))
        ));
        assert!(!table.release(999));
    }
}
