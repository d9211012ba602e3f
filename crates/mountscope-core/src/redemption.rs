//! Bounded least-recently-used cache of recently deleted mounts.
//!
//! Holding a mount here means it was deleted but is kept warm in case it is
//! referenced again. Adding past capacity evicts the least recently used
//! entry and hands it back to the caller, which finalizes it.
//!
//! Recency moves and removals shift the backing `IndexMap`, so they are
//! linear in the number of entries.

use std::sync::Arc;

use indexmap::IndexMap;
use mountscope_common::error::{MountError, Result};

use crate::mount::Mount;

/// Fixed-capacity LRU keyed by mount ID. Index 0 is the least recently used.
#[derive(Debug)]
pub struct RedemptionCache {
    entries: IndexMap<u32, Arc<Mount>>,
    capacity: usize,
}

impl RedemptionCache {
    /// Creates an empty cache holding at most `capacity` mounts.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MountError::Config {
                message: "redemption cache capacity must be greater than zero".into(),
            });
        }
        Ok(Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
        })
    }

    /// Inserts `mount` as the most recently used entry.
    ///
    /// Returns the evicted entry when the insertion overflowed the capacity.
    /// Replacing an existing entry never evicts.
    pub fn add(&mut self, mount_id: u32, mount: Arc<Mount>) -> Option<Arc<Mount>> {
        let _ = self.entries.shift_remove(&mount_id);
        let _ = self.entries.insert(mount_id, mount);

        if self.entries.len() > self.capacity {
            return self.entries.shift_remove_index(0).map(|(_, evicted)| evicted);
        }
        None
    }

    /// Returns the entry for `mount_id` and marks it most recently used.
    pub fn get(&mut self, mount_id: u32) -> Option<&Arc<Mount>> {
        let idx = self.entries.get_index_of(&mount_id)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        self.entries.get_index(last).map(|(_, mount)| mount)
    }

    /// Returns the entry for `mount_id` without touching its recency.
    pub fn peek(&self, mount_id: u32) -> Option<&Arc<Mount>> {
        self.entries.get(&mount_id)
    }

    /// Returns `true` if an entry exists for `mount_id`.
    pub fn contains(&self, mount_id: u32) -> bool {
        self.entries.contains_key(&mount_id)
    }

    /// Removes the entry for `mount_id` without treating it as an eviction.
    pub fn remove(&mut self, mount_id: u32) -> Option<Arc<Mount>> {
        self.entries.shift_remove(&mount_id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
