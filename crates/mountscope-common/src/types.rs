//! Domain primitive types used across the mountscope workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A workload known to the cgroup resolver: a container and the processes
/// currently running inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Container identifier as reported by the kernel events.
    pub container_id: String,
    /// Process IDs of the workload, in the order the cgroup resolver tracks them.
    pub pids: Vec<u32>,
}

impl Workload {
    /// Creates a workload from a container ID and its process IDs.
    #[must_use]
    pub fn new(container_id: impl Into<String>, pids: Vec<u32>) -> Self {
        Self {
            container_id: container_id.into(),
            pids,
        }
    }

    /// Returns the process IDs of the workload.
    #[must_use]
    pub fn pids(&self) -> &[u32] {
        &self.pids
    }
}

/// Lifecycle state of a mount ID inside the resolver.
///
/// A finalized mount is indistinguishable from one that was never seen and
/// reports [`MountState::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MountState {
    /// No record is held for this ID.
    Unknown,
    /// The record is present and resolvable.
    Live,
    /// Removal was requested; the record waits out its grace delay.
    PendingDelete,
    /// The grace delay elapsed; the record is kept warm in the redemption cache.
    Redeemed,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Live => write!(f, "live"),
            Self::PendingDelete => write!(f, "pending-delete"),
            Self::Redeemed => write!(f, "redeemed"),
        }
    }
}
