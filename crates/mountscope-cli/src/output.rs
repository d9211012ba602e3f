//! Formatted output helpers for CLI commands.

use mountscope_common::types::MountState;
use mountscope_core::Mount;
use serde::Serialize;

/// One row of the mount table printed by `snapshot` and `watch`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MountRow {
    /// Mount ID.
    pub id: u32,
    /// Parent mount ID.
    pub parent: u32,
    /// Device as `major:minor`.
    pub device: String,
    /// Filesystem type.
    pub fs_type: String,
    /// Absolute path, `-` if it could not be built.
    pub path: String,
    /// Root within the source filesystem.
    pub root: String,
    /// Lifecycle state in the resolver.
    pub state: String,
}

impl MountRow {
    /// Builds a row from a cached mount.
    #[must_use]
    pub fn new(mount: &Mount, path: Option<String>, state: MountState) -> Self {
        Self {
            id: mount.mount_id,
            parent: mount.parent_mount_id,
            device: format_device(mount.device),
            fs_type: mount.fs_type().to_owned(),
            path: path.unwrap_or_else(|| "-".to_owned()),
            root: mount.root.clone(),
            state: state.to_string(),
        }
    }
}

/// Formats a device number as `major:minor`.
#[must_use]
pub fn format_device(device: u32) -> String {
    let dev = u64::from(device);
    format!(
        "{}:{}",
        nix::sys::stat::major(dev),
        nix::sys::stat::minor(dev)
    )
}

/// Prints rows as an aligned table.
pub fn print_mount_table(rows: &[MountRow]) {
    println!(
        "{:<8} {:<8} {:<10} {:<12} {:<16} {:<40} {}",
        "ID", "PARENT", "DEVICE", "FSTYPE", "STATE", "PATH", "ROOT"
    );
    for row in rows {
        println!(
            "{:<8} {:<8} {:<10} {:<12} {:<16} {:<40} {}",
            row.id, row.parent, row.device, row.fs_type, row.state, row.path, row.root
        );
    }
}

/// Prints rows as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_mount_json(rows: &[MountRow]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}
