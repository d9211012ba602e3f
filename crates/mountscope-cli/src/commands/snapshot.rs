//! `mntscope snapshot` — Load a process mount table into the cache.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use mountscope_common::config::ResolverConfig;
use mountscope_common::constants::INIT_PID;
use mountscope_core::Resolver;
use mountscope_core::workload::NoWorkloads;

use crate::output::{self, MountRow};

/// Arguments for the `snapshot` command.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Process whose mount table is loaded.
    #[arg(long, default_value_t = INIT_PID)]
    pub pid: u32,

    /// Print the table as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `snapshot` command.
///
/// # Errors
///
/// Returns an error if the mount table cannot be read.
pub fn execute(args: SnapshotArgs, config: ResolverConfig) -> anyhow::Result<()> {
    let resolver = super::build_resolver(config, Arc::new(NoWorkloads))?;
    resolver
        .sync_cache(args.pid)
        .with_context(|| format!("failed to load mount table of pid {}", args.pid))?;

    let rows = collect_rows(&resolver, args.pid);
    if args.json {
        output::print_mount_json(&rows)
    } else {
        output::print_mount_table(&rows);
        Ok(())
    }
}

/// Builds one row per cached mount, sorted by mount ID.
pub(crate) fn collect_rows(resolver: &Resolver, pid: u32) -> Vec<MountRow> {
    resolver
        .mounts()
        .iter()
        .map(|mount| {
            let path = resolver.resolve_mount_path(mount.mount_id, pid, "").ok();
            MountRow::new(mount, path, resolver.mount_state(mount.mount_id))
        })
        .collect()
}
