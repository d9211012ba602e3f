//! Parsing of `/proc/<pid>/mountinfo` with `nom`.
//!
//! Each line has the shape documented in `proc(5)`:
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt/parent rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! ```
//!
//! The optional fields before the `-` separator are variable in number.
//! Root and mount point fields escape whitespace and backslashes as octal
//! sequences (`\040`).

use std::path::{Path, PathBuf};

use mountscope_common::error::{MountError, Result};
use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{char, space1, u32 as dec_u32},
    combinator::{opt, verify},
    multi::many0,
    sequence::{preceded, separated_pair, terminated},
};

use crate::mount::Mount;

/// One parsed mount table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Mount ID.
    pub mount_id: u32,
    /// Parent mount ID.
    pub parent_id: u32,
    /// Device major number.
    pub major: u32,
    /// Device minor number.
    pub minor: u32,
    /// Root of the mount within its filesystem.
    pub root: String,
    /// Mount point relative to the process root.
    pub mount_point: String,
    /// Per-mount options.
    pub options: String,
    /// Optional `tag[:value]` fields (`shared:1`, `master:2`, ...).
    pub optional_fields: Vec<String>,
    /// Filesystem type.
    pub fs_type: String,
    /// Filesystem-specific source.
    pub source: String,
    /// Per-superblock options.
    pub super_options: String,
}

impl MountInfo {
    /// Device number composed from major and minor.
    #[allow(clippy::cast_possible_truncation)]
    pub fn device(&self) -> u32 {
        nix::sys::stat::makedev(u64::from(self.major), u64::from(self.minor)) as u32
    }

    /// Builds a mount record. Procfs reports absolute mount points, so the
    /// path is known up front.
    pub fn to_mount(&self) -> Mount {
        Mount::new(
            self.mount_id,
            self.parent_id,
            self.device(),
            self.fs_type.clone(),
            self.mount_point.clone(),
            self.root.clone(),
        )
        .with_path(self.mount_point.clone())
    }
}

/// Capability to read the mount table of a process.
///
/// Failing for one PID (the process exited, permission denied) is expected;
/// the resolver moves on to the next candidate.
pub trait MountInfoSource: Send + Sync {
    /// Returns the mount table of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or parsed.
    fn mount_info(&self, pid: u32) -> Result<Vec<MountInfo>>;
}

/// Reads mount tables from a proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcMountInfo {
    proc_root: PathBuf,
}

impl ProcMountInfo {
    /// Creates a source rooted at `proc_root` (usually `/proc`).
    #[must_use]
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Path of the mount table of `pid`.
    pub fn mount_info_path(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("mountinfo")
    }
}

impl MountInfoSource for ProcMountInfo {
    fn mount_info(&self, pid: u32) -> Result<Vec<MountInfo>> {
        let path = self.mount_info_path(pid);
        let content = std::fs::read_to_string(&path).map_err(|e| MountError::Io {
            path: path.clone(),
            source: e,
        })?;
        let entries = parse_mount_info(&content, &path)?;
        tracing::trace!(pid, entries = entries.len(), "mount table read");
        Ok(entries)
    }
}

/// Parses the content of a mount table. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`MountError::MountInfo`] with the line number of the first
/// malformed entry.
pub fn parse_mount_info(content: &str, path: &Path) -> Result<Vec<MountInfo>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            mount_info_line(line)
                .map(|(_, info)| info)
                .map_err(|e| MountError::MountInfo {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message: e.to_string(),
                })
        })
        .collect()
}

fn number(input: &str) -> IResult<&str, u32> {
    dec_u32(input)
}

fn separator(input: &str) -> IResult<&str, &str> {
    space1(input)
}

fn field(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ' ' || c == '\t')(input)
}

fn mount_info_line(input: &str) -> IResult<&str, MountInfo> {
    let (input, mount_id) = terminated(number, separator).parse(input)?;
    let (input, parent_id) = terminated(number, separator).parse(input)?;
    let (input, (major, minor)) =
        terminated(separated_pair(number, char(':'), number), separator).parse(input)?;
    let (input, root) = terminated(field, separator).parse(input)?;
    let (input, mount_point) = terminated(field, separator).parse(input)?;
    let (input, options) = terminated(field, separator).parse(input)?;
    let (input, optional_fields) =
        many0(terminated(verify(field, |f: &str| f != "-"), separator)).parse(input)?;
    let (input, _) = terminated(char('-'), separator).parse(input)?;
    let (input, fs_type) = terminated(field, separator).parse(input)?;
    let (input, source) = field(input)?;
    let (input, super_options) = opt(preceded(separator, field)).parse(input)?;

    Ok((
        input,
        MountInfo {
            mount_id,
            parent_id,
            major,
            minor,
            root: unescape_octal(root),
            mount_point: unescape_octal(mount_point),
            options: options.to_owned(),
            optional_fields: optional_fields.into_iter().map(str::to_owned).collect(),
            fs_type: fs_type.to_owned(),
            source: unescape_octal(source),
            super_options: super_options.unwrap_or_default().to_owned(),
        },
    ))
}

/// Decodes the `\ooo` escapes the kernel uses for whitespace and backslashes.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
