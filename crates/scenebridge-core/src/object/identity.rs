//! Identity map and toggle-reference coordinator
//!
//! One native handle maps to one [`ToggleRef`]. A toggle ref holds its wrapper
//! strongly while native code keeps other references to the object, and only
//! weakly once the bridge's reference is the last one, so a cycle through the
//! native side never keeps a wrapper alive on its own.
//!
//! Notifications may arrive on any thread. Entries live in a sharded
//! [`DashMap`] and each entry's state has its own mutex; wrappers are never
//! dropped while either lock is held, because dropping a wrapper calls back
//! into the engine, which may call back into this map.

use super::{ObjectRef, ReferenceMode, WeakObjectRef};
use crate::error::{BridgeError, BridgeResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use scenebridge_sdk::NativeHandle;
use std::sync::Arc;

enum Slot {
    Strong(ObjectRef),
    Weak(WeakObjectRef),
}

/// Per-handle ownership state
pub(crate) struct ToggleRef {
    handle: NativeHandle,
    slot: Mutex<Slot>,
}

impl ToggleRef {
    fn new(handle: NativeHandle, object: &ObjectRef, mode: ReferenceMode) -> Self {
        let slot = match mode {
            ReferenceMode::Strong => Slot::Strong(object.clone()),
            ReferenceMode::Weak => Slot::Weak(Arc::downgrade(object)),
        };
        Self {
            handle,
            slot: Mutex::new(slot),
        }
    }

    fn target(&self) -> Option<ObjectRef> {
        match &*self.slot.lock() {
            Slot::Strong(object) => Some(object.clone()),
            Slot::Weak(weak) => weak.upgrade(),
        }
    }

    fn mode(&self) -> ReferenceMode {
        match &*self.slot.lock() {
            Slot::Strong(_) => ReferenceMode::Strong,
            Slot::Weak(_) => ReferenceMode::Weak,
        }
    }

    fn is_dead(&self) -> bool {
        match &*self.slot.lock() {
            Slot::Strong(_) => false,
            Slot::Weak(weak) => weak.strong_count() == 0,
        }
    }

    fn toggle(&self, is_last: bool) -> BridgeResult<()> {
        let released = {
            let mut slot = self.slot.lock();
            match (&*slot, is_last) {
                (Slot::Strong(object), true) => {
                    let weak = Arc::downgrade(object);
                    Some(std::mem::replace(&mut *slot, Slot::Weak(weak)))
                }
                (Slot::Weak(weak), false) => match weak.upgrade() {
                    Some(object) => {
                        *slot = Slot::Strong(object);
                        None
                    }
                    None => {
                        tracing::error!(handle = %self.handle, "toggle to strong found a collected wrapper");
                        return Err(BridgeError::ToggleTargetCollected(self.handle));
                    }
                },
                _ => None,
            }
        };
        tracing::trace!(handle = %self.handle, is_last, "toggled");
        drop(released);
        Ok(())
    }
}

/// Counts of entries by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityStats {
    /// Entries holding their wrapper strongly
    pub strong: usize,
    /// Weak entries whose wrapper is alive
    pub weak: usize,
    /// Weak entries whose wrapper is gone
    pub dead: usize,
}

/// Map from native handle to the unique live wrapper
pub struct IdentityMap {
    entries: DashMap<NativeHandle, Arc<ToggleRef>>,
    strict: bool,
}

impl IdentityMap {
    /// Create an empty map.
    ///
    /// In strict mode a second live wrapper for a mapped handle is an error.
    pub fn new(strict: bool) -> Self {
        Self {
            entries: DashMap::new(),
            strict,
        }
    }

    fn entry(&self, handle: NativeHandle) -> Option<Arc<ToggleRef>> {
        self.entries.get(&handle).map(|e| e.value().clone())
    }

    /// Map `handle` to `object`; returns the wrapper that ends up mapped.
    ///
    /// If a live wrapper is already mapped it is kept and returned. A dead
    /// entry is replaced.
    pub fn add_mapping(
        &self,
        handle: NativeHandle,
        object: &ObjectRef,
        mode: ReferenceMode,
    ) -> BridgeResult<ObjectRef> {
        let fresh = Arc::new(ToggleRef::new(handle, object, mode));
        let (incumbent, displaced) = match self.entries.entry(handle) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                (None, None)
            }
            Entry::Occupied(mut occupied) => match occupied.get().target() {
                Some(live) => (Some(live), None),
                None => (None, Some(occupied.insert(fresh))),
            },
        };
        drop(displaced);

        match incumbent {
            None => {
                tracing::trace!(%handle, ?mode, "mapped");
                Ok(object.clone())
            }
            Some(live) if Arc::ptr_eq(&live, object) => Ok(live),
            Some(live) => {
                if self.strict {
                    tracing::error!(%handle, "second wrapper for a mapped handle");
                    return Err(BridgeError::DuplicateMapping(handle));
                }
                tracing::warn!(%handle, "handle already mapped; keeping the existing wrapper");
                Ok(live)
            }
        }
    }

    /// Remove the entry for `handle` and detach its wrapper.
    ///
    /// Returns `false` if nothing was mapped.
    pub fn remove_mapping(&self, handle: NativeHandle) -> bool {
        let Some((_, entry)) = self.entries.remove(&handle) else {
            return false;
        };
        let target = entry.target();
        if let Some(object) = &target {
            drop(object.peer().detach());
        }
        tracing::trace!(%handle, had_wrapper = target.is_some(), "unmapped");
        drop(target);
        drop(entry);
        true
    }

    /// Live wrapper for `handle`, if any; never creates one
    pub fn lookup(&self, handle: NativeHandle) -> Option<ObjectRef> {
        self.entry(handle)?.target()
    }

    /// Switch the entry for `handle` between strong and weak.
    ///
    /// A missing entry is ignored. Going strong after the wrapper was
    /// collected is fatal.
    pub fn toggle(&self, handle: NativeHandle, is_last: bool) -> BridgeResult<()> {
        match self.entry(handle) {
            Some(entry) => entry.toggle(is_last),
            None => {
                tracing::trace!(%handle, is_last, "toggle for unmapped handle");
                Ok(())
            }
        }
    }

    /// Current mode of the entry for `handle`
    pub fn mode(&self, handle: NativeHandle) -> Option<ReferenceMode> {
        self.entry(handle).map(|e| e.mode())
    }

    /// Check if `handle` has an entry (live or dead)
    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Count entries by state
    pub fn stats(&self) -> IdentityStats {
        let mut stats = IdentityStats::default();
        for entry in self.entries.iter() {
            match &*entry.value().slot.lock() {
                Slot::Strong(_) => stats.strong += 1,
                Slot::Weak(weak) if weak.strong_count() > 0 => stats.weak += 1,
                Slot::Weak(_) => stats.dead += 1,
            }
        }
        stats
    }

    /// Drop entries whose wrapper has been collected; returns how many
    pub fn sweep_dead(&self) -> usize {
        let dead: Vec<NativeHandle> = self
            .entries
            .iter()
            .filter(|e| e.value().is_dead())
            .map(|e| *e.key())
            .collect();
        let mut swept = 0;
        for handle in dead {
            if self.entries.remove_if(&handle, |_, e| e.is_dead()).is_some() {
                swept += 1;
            }
        }
        swept
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let handles: Vec<NativeHandle> = self.entries.iter().map(|e| *e.key()).collect();
        let mut removed = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some((_, entry)) = self.entries.remove(&handle) {
                removed.push(entry);
            }
        }
        let count = removed.len();
        drop(removed);
        count
    }
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new(false)
    }
}
