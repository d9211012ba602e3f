//! The workload collaborator: maps container IDs to the processes inside.
//!
//! The resolver only uses it to widen the list of PIDs whose mount table may
//! be scanned on a cache miss. An unknown container is not an error.

use std::collections::HashMap;

use mountscope_common::types::Workload;
use parking_lot::RwLock;

/// Capability to look up the workload of a container.
pub trait WorkloadResolver: Send + Sync {
    /// Returns the workload running in `container_id`, if known.
    fn get_workload(&self, container_id: &str) -> Option<Workload>;
}

/// Resolver that knows no workload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWorkloads;

impl WorkloadResolver for NoWorkloads {
    fn get_workload(&self, _container_id: &str) -> Option<Workload> {
        None
    }
}

/// In-memory workload table fed by the caller.
#[derive(Debug, Default)]
pub struct StaticWorkloads {
    workloads: RwLock<HashMap<String, Workload>>,
}

impl StaticWorkloads {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a workload.
    pub fn insert(&self, workload: Workload) {
        let _ = self
            .workloads
            .write()
            .insert(workload.container_id.clone(), workload);
    }

    /// Forgets the workload of `container_id`.
    pub fn remove(&self, container_id: &str) -> Option<Workload> {
        self.workloads.write().remove(container_id)
    }
}

impl WorkloadResolver for StaticWorkloads {
    fn get_workload(&self, container_id: &str) -> Option<Workload> {
        if container_id.is_empty() {
            return None;
        }
        self.workloads.read().get(container_id).cloned()
    }
}
