//! Storage of mount records keyed by mount ID.
//!
//! Kernel mount IDs are small and dense on most hosts, so IDs below
//! [`DENSE_SLOTS`] live in a directly indexed slot array; larger IDs spill
//! into a hash map. Both tiers give O(1) lookup. The map has no lock of its
//! own: the resolver's lock protects every access.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::mount::Mount;

/// Number of directly indexed slots.
pub const DENSE_SLOTS: usize = 4096;

/// Mount records keyed by mount ID.
#[derive(Debug, Default)]
pub struct MountMap {
    dense: Vec<Option<Arc<Mount>>>,
    overflow: HashMap<u32, Arc<Mount>>,
    len: usize,
}

impl MountMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `mount` under `mount_id`, returning the record it replaced.
    pub fn insert(&mut self, mount_id: u32, mount: Arc<Mount>) -> Option<Arc<Mount>> {
        let idx = mount_id as usize;
        let prev = if idx < DENSE_SLOTS {
            if self.dense.len() <= idx {
                self.dense.resize(idx + 1, None);
            }
            self.dense[idx].replace(mount)
        } else {
            self.overflow.insert(mount_id, mount)
        };

        if prev.is_none() {
            self.len += 1;
        }
        prev
    }

    /// Returns the record stored under `mount_id`.
    pub fn get(&self, mount_id: u32) -> Option<&Arc<Mount>> {
        let idx = mount_id as usize;
        if idx < DENSE_SLOTS {
            self.dense.get(idx).and_then(Option::as_ref)
        } else {
            self.overflow.get(&mount_id)
        }
    }

    /// Removes and returns the record stored under `mount_id`.
    pub fn remove(&mut self, mount_id: u32) -> Option<Arc<Mount>> {
        let idx = mount_id as usize;
        let removed = if idx < DENSE_SLOTS {
            self.dense.get_mut(idx).and_then(Option::take)
        } else {
            self.overflow.remove(&mount_id)
        };

        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Returns `true` if a record is stored under `mount_id`.
    pub fn contains(&self, mount_id: u32) -> bool {
        self.get(mount_id).is_some()
    }

    /// Number of stored records.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map holds no record.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of records stored outside the dense slots.
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    /// Iterates over all records, dense slots first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mount>> {
        self.dense
            .iter()
            .filter_map(Option::as_ref)
            .chain(self.overflow.values())
    }

    /// Visits every record until the visitor breaks.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(u32, &Arc<Mount>) -> ControlFlow<()>,
    {
        for mount in self.iter() {
            if visit(mount.mount_id, mount).is_break() {
                return;
            }
        }
    }
}
