//! `mntscope resolve` — Resolve one mount ID the way an event would.

use std::sync::Arc;

use anyhow::Context;
use clap::{Args, ValueEnum};
use mountscope_common::config::ResolverConfig;
use mountscope_common::constants::INIT_PID;
use mountscope_common::types::Workload;
use mountscope_core::Resolver;
use mountscope_core::workload::StaticWorkloads;

use crate::output::{self, MountRow};

/// What to print for the resolved mount.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Absolute mount path.
    Path,
    /// Root within the source filesystem.
    Root,
    /// Filesystem type.
    Fs,
    /// The whole record as JSON.
    Record,
}

/// Arguments for the `resolve` command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Mount ID to resolve.
    pub mount_id: u32,

    /// PID of the event referencing the mount.
    #[arg(long, default_value_t = INIT_PID)]
    pub pid: u32,

    /// Container ID of the event, empty for host processes.
    #[arg(long, default_value = "")]
    pub container: String,

    /// PIDs known to run in the container.
    #[arg(long, value_delimiter = ',')]
    pub workload_pids: Vec<u32>,

    /// Field to print.
    #[arg(long, value_enum, default_value_t = Target::Path)]
    pub what: Target,

    /// Start from an empty cache instead of loading the init mount table.
    #[arg(long)]
    pub cold: bool,
}

/// Executes the `resolve` command.
///
/// # Errors
///
/// Returns an error if the mount cannot be resolved.
pub fn execute(args: ResolveArgs, config: ResolverConfig) -> anyhow::Result<()> {
    let workloads = Arc::new(StaticWorkloads::new());
    if !args.container.is_empty() && !args.workload_pids.is_empty() {
        workloads.insert(Workload::new(
            args.container.clone(),
            args.workload_pids.clone(),
        ));
    }

    let resolver = super::build_resolver(config, workloads)?;
    if !args.cold {
        resolver
            .sync_cache(INIT_PID)
            .context("failed to load the init mount table")?;
    }

    let answer = resolve(&resolver, &args)
        .with_context(|| format!("failed to resolve mount {}", args.mount_id))?;
    println!("{answer}");

    let stats = resolver.stats();
    tracing::debug!(
        cache_hits = stats.cache_hits,
        cache_miss = stats.cache_miss,
        proc_hits = stats.proc_hits,
        proc_miss = stats.proc_miss,
        "resolution stats"
    );
    Ok(())
}

fn resolve(resolver: &Resolver, args: &ResolveArgs) -> anyhow::Result<String> {
    let (id, pid, container) = (args.mount_id, args.pid, args.container.as_str());

    let answer = match args.what {
        Target::Path => resolver.resolve_mount_path(id, pid, container)?,
        Target::Root => resolver.resolve_mount_root(id, pid, container)?,
        Target::Fs => resolver.resolve_filesystem(id, pid, container)?,
        Target::Record => {
            let mount = resolver.resolve_mount(id, pid, container)?;
            let path = resolver.resolve_mount_path(id, pid, container).ok();
            let row = MountRow::new(&mount, path, resolver.mount_state(id));
            serde_json::to_string_pretty(&row)?
        }
    };

    Ok(answer)
}
