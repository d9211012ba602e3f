//! Unified error types for the mountscope workspace.
//!
//! Resolution failures such as [`MountError::NotFound`] are expected,
//! recoverable outcomes handed back to the caller; they are not agent errors.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MountError {
    /// The mount ID is zero or otherwise structurally invalid.
    #[error("undefined mount")]
    Undefined,

    /// The mount ID is below the lowest ID seen in the init mount table.
    #[error("mount {mount_id} is below the kernel floor {floor}")]
    BelowKernelFloor {
        /// Rejected mount ID.
        mount_id: u32,
        /// Lowest known mount ID at the time of the check.
        floor: u32,
    },

    /// The mount is unknown to the cache and could not be recovered from procfs.
    #[error("mount {mount_id} not found")]
    NotFound {
        /// Mount ID that could not be resolved.
        mount_id: u32,
    },

    /// A cycle was detected while walking the parent chain.
    #[error("mount path loop detected at mount {mount_id}")]
    PathLoop {
        /// Mount ID that was visited twice.
        mount_id: u32,
    },

    /// A computed mount path normalized to the empty string.
    #[error("empty path computed for mount {mount_id}")]
    PathEmpty {
        /// Mount whose path came out empty.
        mount_id: u32,
    },

    /// An I/O operation failed while scanning a mount table.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A mount table line could not be parsed.
    #[error("malformed mountinfo at {path}:{line}: {message}")]
    MountInfo {
        /// Mount table that was being parsed.
        path: PathBuf,
        /// One-based line number of the offending entry.
        line: usize,
        /// Description of the parse failure.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// A metrics sink rejected a sample.
    #[error("stats error: {message}")]
    Stats {
        /// Description of the sink failure.
        message: String,
    },
}

impl MountError {
    /// Returns `true` if this error means the mount is currently unknown.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for the expected outcomes of a lookup: undefined,
    /// untrackable, or unknown mount IDs.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Undefined | Self::BelowKernelFloor { .. } | Self::NotFound { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MountError>;
