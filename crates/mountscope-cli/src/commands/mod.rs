//! CLI command definitions and dispatch.

pub mod resolve;
pub mod snapshot;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mountscope_common::config::ResolverConfig;
use mountscope_core::Resolver;
use mountscope_core::stats::TracingStatsSink;
use mountscope_core::workload::WorkloadResolver;

/// mountscope — kernel mount ID resolution cache.
#[derive(Parser, Debug)]
#[command(name = "mntscope", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON resolver configuration.
    #[arg(long, global = true, env = "MNTSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root of the proc filesystem (overrides the configuration).
    #[arg(long, global = true, env = "MNTSCOPE_PROC_ROOT")]
    pub proc_root: Option<PathBuf>,

    /// Disable the procfs fallback on cache misses.
    #[arg(long, global = true)]
    pub no_procfs: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the mount table of a process and print the cached mounts.
    Snapshot(snapshot::SnapshotArgs),
    /// Resolve a single mount ID.
    Resolve(resolve::ResolveArgs),
    /// Track the mount table of a process until interrupted.
    Watch(watch::WatchArgs),
}

impl Cli {
    /// Builds the resolver configuration from the config file and flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn resolver_config(&self) -> anyhow::Result<ResolverConfig> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ResolverConfig::default(),
        };

        if let Some(proc_root) = &self.proc_root {
            config.proc_root.clone_from(proc_root);
        }
        if self.no_procfs {
            config.use_procfs = false;
        }

        Ok(config)
    }
}

/// Builds a procfs-backed resolver reporting stats to the log.
pub(crate) fn build_resolver(
    config: ResolverConfig,
    workloads: Arc<dyn WorkloadResolver>,
) -> anyhow::Result<Resolver> {
    Resolver::with_procfs(config, workloads, Arc::new(TracingStatsSink))
        .context("invalid resolver configuration")
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolver_config()?;
    tracing::debug!(?config, "resolver configuration");

    match cli.command {
        Command::Snapshot(args) => snapshot::execute(args, config),
        Command::Resolve(args) => resolve::execute(args, config),
        Command::Watch(args) => watch::execute(args, config),
    }
}
