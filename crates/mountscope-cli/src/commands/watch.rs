//! `mntscope watch` — Keep the cache in sync with a live mount table.
//!
//! Every resync, mounts that vanished from the table are deleted (and go
//! through the usual grace delay and redemption) and new ones are merged.
//! The maintenance loop runs alongside; stats are flushed to the log.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use mountscope_common::config::ResolverConfig;
use mountscope_common::constants::INIT_PID;
use mountscope_common::types::MountState;
use mountscope_core::Resolver;
use mountscope_core::mountinfo::{MountInfoSource, ProcMountInfo};
use mountscope_core::workload::NoWorkloads;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::output;

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Process whose mount table is tracked.
    #[arg(long, default_value_t = INIT_PID)]
    pub pid: u32,

    /// Seconds between two rescans of the mount table.
    #[arg(long, default_value_t = 10)]
    pub resync_secs: u64,

    /// Seconds between two stats flushes.
    #[arg(long, default_value_t = 30)]
    pub stats_secs: u64,

    /// Print the cached table on exit.
    #[arg(long)]
    pub dump: bool,
}

/// Outcome of one resync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// Mounts inserted from the table, reused IDs included.
    pub added: usize,
    /// Live mounts absent from the table, now pending deletion.
    pub removed: usize,
}

/// Executes the `watch` command.
///
/// # Errors
///
/// Returns an error if the runtime cannot start, the initial mount table
/// cannot be read, or the Ctrl+C handler cannot be installed.
pub fn execute(args: WatchArgs, config: ResolverConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: WatchArgs, config: ResolverConfig) -> anyhow::Result<()> {
    let source = ProcMountInfo::new(config.proc_root.clone());
    let resolver = Arc::new(super::build_resolver(config, Arc::new(NoWorkloads))?);

    resolver
        .sync_cache(args.pid)
        .with_context(|| format!("failed to load mount table of pid {}", args.pid))?;
    info!(pid = args.pid, mounts = resolver.len(), "watching mount table");

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let handler_tx = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        let _ = handler_tx.send(());
    })
    .context("failed to set Ctrl+C handler")?;

    let maintenance = resolver.start(shutdown_tx.subscribe());

    let mut resync = tokio::time::interval(Duration::from_secs(args.resync_secs.max(1)));
    let mut flush = tokio::time::interval(Duration::from_secs(args.stats_secs.max(1)));
    // both fire immediately otherwise
    let _ = resync.tick().await;
    let _ = flush.tick().await;

    loop {
        tokio::select! {
            _ = resync.tick() => {
                let (resolver, source) = (Arc::clone(&resolver), source.clone());
                let pid = args.pid;
                match tokio::task::spawn_blocking(move || reconcile(&resolver, &source, pid)).await {
                    Ok(Ok(outcome)) if outcome != Reconciled::default() => {
                        info!(added = outcome.added, removed = outcome.removed, "mount table changed");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(pid, error = %e, "mount table resync failed"),
                    Err(e) => warn!(error = %e, "resync task failed"),
                }
            }
            _ = flush.tick() => {
                if let Err(e) = resolver.send_stats() {
                    warn!(error = %e, "failed to flush resolver stats");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    info!("shutting down");
    drop(shutdown_tx);
    maintenance.await.context("maintenance task failed")?;

    if args.dump {
        output::print_mount_table(&super::snapshot::collect_rows(&resolver, args.pid));
    }
    Ok(())
}

/// Reads the mount table of `pid` once and aligns the cache with it.
///
/// # Errors
///
/// Returns an error if the table cannot be read.
pub fn reconcile(
    resolver: &Resolver,
    source: &impl MountInfoSource,
    pid: u32,
) -> anyhow::Result<Reconciled> {
    let table = source.mount_info(pid)?;
    let present: HashSet<u32> = table.iter().map(|entry| entry.mount_id).collect();

    let mut outcome = Reconciled::default();
    for mount in resolver.mounts() {
        let id = mount.mount_id;
        if present.contains(&id) || resolver.mount_state(id) != MountState::Live {
            continue;
        }
        // the mount may have been finalized since the snapshot was taken
        match resolver.delete(id) {
            Ok(()) => outcome.removed += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    // reinserting a superseded parent finalizes its children, so entries
    // torn down by the first pass are picked up by the second
    let mut added = HashSet::new();
    for _ in 0..2 {
        for entry in &table {
            if resolver.mount_state(entry.mount_id) != MountState::Live {
                resolver.insert(entry.to_mount())?;
                let _ = added.insert(entry.mount_id);
            }
        }
    }
    outcome.added = added.len();

    Ok(outcome)
}
