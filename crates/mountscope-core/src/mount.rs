//! The mount record and path helpers.
//!
//! A [`Mount`] is a snapshot of one kernel mount point. Records are shared as
//! `Arc<Mount>`; two records are the "same" mount only when they are the same
//! allocation, which is how the resolver detects that an ID was reused.

use std::sync::OnceLock;

use mountscope_common::constants::{OVERLAY_FS, UNKNOWN_FS};

/// A kernel mount point snapshot.
#[derive(Debug, Clone)]
pub struct Mount {
    /// Kernel-assigned mount ID.
    pub mount_id: u32,
    /// Backing device number composed from major/minor.
    pub device: u32,
    /// Mount ID of the parent mount, `0` when unknown.
    pub parent_mount_id: u32,
    /// Filesystem type (`ext4`, `overlay`, `proc`, ...).
    pub fs_type: String,
    /// Mount point as reported by its source.
    pub mount_point: String,
    /// Root of the mount within its source filesystem.
    pub root: String,
    path: OnceLock<String>,
}

impl Mount {
    /// Creates a mount whose absolute path is not known yet.
    ///
    /// This is the shape of mounts reported by kernel events, where the mount
    /// point is relative to the parent mount.
    #[must_use]
    pub fn new(
        mount_id: u32,
        parent_mount_id: u32,
        device: u32,
        fs_type: impl Into<String>,
        mount_point: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            mount_id,
            device,
            parent_mount_id,
            fs_type: fs_type.into(),
            mount_point: mount_point.into(),
            root: root.into(),
            path: OnceLock::new(),
        }
    }

    /// Presets the absolute path, as known for mounts read from procfs.
    #[must_use]
    pub fn with_path(self, path: impl Into<String>) -> Self {
        let _ = self.path.set(path.into());
        self
    }

    /// Returns the absolute path if it has been resolved.
    pub fn path(&self) -> Option<&str> {
        self.path.get().map(String::as_str)
    }

    /// Memoizes the absolute path; the first stored value wins.
    pub(crate) fn cache_path(&self, path: String) -> &str {
        self.path.get_or_init(|| path)
    }

    /// Returns the filesystem type, or `"unknown"` when it was not reported.
    pub fn fs_type(&self) -> &str {
        if self.fs_type.is_empty() {
            UNKNOWN_FS
        } else {
            &self.fs_type
        }
    }

    /// Returns `true` for overlay mounts, which share their device with
    /// every other layer mounted from the same overlay.
    pub fn is_overlay(&self) -> bool {
        self.fs_type == OVERLAY_FS
    }

    /// Returns `true` if the mount point is the filesystem root.
    pub fn is_root(&self) -> bool {
        self.mount_point == "/"
    }

    /// Strips the leading separator from event mount points so they can be
    /// joined onto the parent path. Root mounts and mounts with a known path
    /// are left untouched.
    pub(crate) fn normalize_mount_point(&mut self) {
        if self.path.get().is_none() && !self.is_root() {
            if let Some(stripped) = self.mount_point.strip_prefix('/') {
                self.mount_point = stripped.to_owned();
            }
        }
    }
}

/// Joins two path segments and cleans the result.
///
/// Empty segments are ignored; joining two empty segments yields an empty
/// string.
pub fn join_path(parent: &str, child: &str) -> String {
    let joined = match (parent.is_empty(), child.is_empty()) {
        (true, true) => return String::new(),
        (false, true) => parent.to_owned(),
        (true, false) => child.to_owned(),
        (false, false) => format!("{parent}/{child}"),
    };
    clean_path(&joined)
}

/// Lexically normalizes a slash-separated path: collapses repeated
/// separators, drops `.` elements, and resolves `..` against the preceding
/// element.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    let _ = parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let body = parts.join("/");
    if rooted {
        format!("/{body}")
    } else if body.is_empty() {
        ".".into()
    } else {
        body
    }
}
