//! The mount resolver.
//!
//! Holds every known mount keyed by mount ID and answers path, root, and
//! filesystem lookups for kernel events. Deletions are delayed so that
//! in-flight events can still resolve a mount that was just unmounted: a
//! deleted mount first waits in the delete queue, then moves to the
//! redemption cache, and is only finalized when the cache evicts it or the
//! ID is reused.
//!
//! On a cache miss the resolver rescans `/proc/<pid>/mountinfo` for a few
//! candidate processes, throttled per mount ID by the fallback limiter.
//!
//! All state sits behind one `RwLock`. Touching the redemption cache changes
//! its recency order, so it always takes the exclusive lock, even on a hit.
//! Procfs scans run without the lock; their results are merged afterwards
//! and IDs inserted concurrently in the meantime are skipped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use mountscope_common::config::ResolverConfig;
use mountscope_common::constants::{
    CACHE_TAG, INIT_PID, METRIC_LIMITER_ALLOWED, METRIC_LIMITER_DROPPED,
    METRIC_RESOLVER_CACHE_SIZE, METRIC_RESOLVER_HITS, METRIC_RESOLVER_MISS, PROCFS_TAG,
    UNKNOWN_FS,
};
use mountscope_common::error::{MountError, Result};
use mountscope_common::types::MountState;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::limiter::FallbackLimiter;
use crate::map::MountMap;
use crate::mount::{Mount, join_path};
use crate::mountinfo::{MountInfo, MountInfoSource, ProcMountInfo};
use crate::redemption::RedemptionCache;
use crate::stats::{ResolverStats, StatsSink, StatsSnapshot};
use crate::workload::WorkloadResolver;

#[derive(Debug)]
struct DeleteRequest {
    mount: Arc<Mount>,
    timeout_at: Instant,
}

#[derive(Debug)]
struct State {
    mounts: MountMap,
    redemption: RedemptionCache,
    delete_queue: VecDeque<DeleteRequest>,
    min_mount_id: u32,
    limiter: FallbackLimiter,
}

impl State {
    fn validate(&self, mount_id: u32) -> Result<()> {
        if mount_id == 0 {
            return Err(MountError::Undefined);
        }
        if mount_id < self.min_mount_id {
            return Err(MountError::BelowKernelFloor {
                mount_id,
                floor: self.min_mount_id,
            });
        }
        Ok(())
    }

    fn is_current(&self, mount: &Arc<Mount>) -> bool {
        self.mounts
            .get(mount.mount_id)
            .is_some_and(|live| Arc::ptr_eq(live, mount))
    }

    fn lookup(&self, mount_id: u32) -> Result<Arc<Mount>> {
        self.mounts
            .get(mount_id)
            .cloned()
            .ok_or(MountError::NotFound { mount_id })
    }

    fn insert(&mut self, mut mount: Mount) {
        let mount_id = mount.mount_id;

        // the previous holder of the ID is torn down with its children,
        // whether it was still live or already redeemed
        if let Some(prev) = self.mounts.get(mount_id).cloned() {
            let _ = self.redemption.remove(mount_id);
            self.finalize(prev);
        }

        mount.normalize_mount_point();
        let _ = self.mounts.insert(mount_id, Arc::new(mount));

        if self.min_mount_id > mount_id {
            self.min_mount_id = mount_id;
        }
    }

    fn merge(&mut self, entries: &[MountInfo]) -> usize {
        let mut merged = 0;
        for entry in entries {
            if self.mounts.contains(entry.mount_id) {
                continue;
            }
            self.insert(entry.to_mount());
            merged += 1;
        }
        merged
    }

    /// Tears down `first`, every live descendant, and for overlay mounts
    /// every other live mount on the same device. Uses an explicit work
    /// stack; each mount ID is processed once.
    fn finalize(&mut self, first: Arc<Mount>) {
        let root_id = first.mount_id;
        let mut stack = vec![first];
        let mut seen = HashSet::new();
        let mut finalized = 0usize;

        while let Some(curr) = stack.pop() {
            if !seen.insert(curr.mount_id) {
                continue;
            }
            // a stale record owns nothing in the map anymore
            if !self.is_current(&curr) {
                continue;
            }

            let _ = self.mounts.remove(curr.mount_id);
            if self
                .redemption
                .peek(curr.mount_id)
                .is_some_and(|m| Arc::ptr_eq(m, &curr))
            {
                let _ = self.redemption.remove(curr.mount_id);
            }
            finalized += 1;

            stack.extend(
                self.mounts
                    .iter()
                    .filter(|child| {
                        child.parent_mount_id == curr.mount_id && !seen.contains(&child.mount_id)
                    })
                    .cloned(),
            );

            if curr.is_overlay() {
                stack.extend(
                    self.mounts
                        .iter()
                        .filter(|sibling| {
                            sibling.device == curr.device && !seen.contains(&sibling.mount_id)
                        })
                        .cloned(),
                );
            }
        }

        tracing::debug!(mount_id = root_id, finalized, "mount finalized");
    }

    fn redeem(&mut self, mount: Arc<Mount>) {
        if let Some(evicted) = self.redemption.add(mount.mount_id, mount) {
            tracing::trace!(mount_id = evicted.mount_id, "redemption entry evicted");
            self.finalize(evicted);
        }
    }

    fn dequeue(&mut self, now: Instant) -> usize {
        let mut redeemed = 0;

        while self
            .delete_queue
            .front()
            .is_some_and(|req| req.timeout_at <= now)
        {
            let Some(req) = self.delete_queue.pop_front() else {
                break;
            };
            // skip requests whose mount ID was reused since
            if self.is_current(&req.mount) {
                self.redeem(req.mount);
                redeemed += 1;
            }
        }

        redeemed
    }

    /// Builds the absolute path of `mount_id` by walking parent IDs up to a
    /// mount with a known path or the filesystem root, then memoizes the
    /// path on every mount of the walked chain.
    fn mount_path(&self, mount_id: u32) -> Result<String> {
        let mut chain: Vec<&Arc<Mount>> = Vec::new();
        let mut visited = HashSet::new();
        let mut id = mount_id;

        let base = loop {
            self.validate(id)?;
            let mount = self
                .mounts
                .get(id)
                .ok_or(MountError::NotFound { mount_id: id })?;

            if let Some(path) = mount.path() {
                break path.to_owned();
            }
            if mount.is_root() {
                break "/".to_owned();
            }
            if !visited.insert(id) {
                return Err(MountError::PathLoop { mount_id: id });
            }
            if mount.parent_mount_id == 0 {
                return Err(MountError::Undefined);
            }

            chain.push(mount);
            id = mount.parent_mount_id;
        };

        let mut path = base;
        for mount in chain.iter().rev() {
            let joined = join_path(&path, &mount.mount_point);
            if joined.is_empty() {
                return Err(MountError::PathEmpty {
                    mount_id: mount.mount_id,
                });
            }
            path = mount.cache_path(joined).to_owned();
        }

        Ok(path)
    }

    fn refresh_min_mount_id(&mut self) {
        if let Some(lowest) = self.mounts.iter().map(|m| m.mount_id).min() {
            if self.min_mount_id == 0 || lowest < self.min_mount_id {
                self.min_mount_id = lowest;
            }
        }
    }
}

/// Cache of mount points and the filesystems behind them.
pub struct Resolver {
    config: ResolverConfig,
    state: RwLock<State>,
    workloads: Arc<dyn WorkloadResolver>,
    source: Arc<dyn MountInfoSource>,
    sink: Arc<dyn StatsSink>,
    stats: ResolverStats,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("mounts", &self.len())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates a resolver with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] if the configuration is invalid.
    pub fn new(
        config: ResolverConfig,
        workloads: Arc<dyn WorkloadResolver>,
        source: Arc<dyn MountInfoSource>,
        sink: Arc<dyn StatsSink>,
    ) -> Result<Self> {
        config.validate()?;

        let state = State {
            mounts: MountMap::new(),
            redemption: RedemptionCache::new(config.redemption_capacity)?,
            delete_queue: VecDeque::new(),
            min_mount_id: 0,
            limiter: FallbackLimiter::new(
                config.fallback_limiter_keys,
                config.fallback_limiter_period,
                config.fallback_limiter_burst,
            )?,
        };

        Ok(Self {
            config,
            state: RwLock::new(state),
            workloads,
            source,
            sink,
            stats: ResolverStats::default(),
        })
    }

    /// Creates a resolver reading mount tables from the configured proc root.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] if the configuration is invalid.
    pub fn with_procfs(
        config: ResolverConfig,
        workloads: Arc<dyn WorkloadResolver>,
        sink: Arc<dyn StatsSink>,
    ) -> Result<Self> {
        let source = Arc::new(ProcMountInfo::new(config.proc_root.clone()));
        Self::new(config, workloads, source, sink)
    }

    /// Returns the configuration the resolver was built with.
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Checks that `mount_id` can be tracked at all.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Undefined`] for `0` and
    /// [`MountError::BelowKernelFloor`] for IDs below the lowest ID of the
    /// init mount table.
    pub fn validate_mount_id(&self, mount_id: u32) -> Result<()> {
        self.state.read().validate(mount_id)
    }

    /// Lowest trackable mount ID, `0` until PID 1 has been synced.
    pub fn min_mount_id(&self) -> u32 {
        self.state.read().min_mount_id
    }

    /// Snapshots the mount table of `pid` into the cache.
    ///
    /// Syncing PID 1 also establishes the kernel floor used to reject
    /// untrackable IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read or parsed.
    pub fn sync_cache(&self, pid: u32) -> Result<()> {
        let result = self.sync_pids(&[pid]);

        if pid == INIT_PID {
            let mut state = self.state.write();
            state.refresh_min_mount_id();
            tracing::debug!(min_mount_id = state.min_mount_id, "kernel floor established");
        }

        let merged = result?;
        tracing::debug!(pid, merged, "mount cache synced");
        Ok(())
    }

    /// Inserts a mount, replacing any record holding the same ID.
    ///
    /// The replaced record is finalized with its children and, for overlay
    /// mounts, its device siblings, whether it was live or redeemed.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Undefined`] if the mount ID is `0`.
    pub fn insert(&self, mount: Mount) -> Result<()> {
        if mount.mount_id == 0 {
            return Err(MountError::Undefined);
        }
        self.state.write().insert(mount);
        Ok(())
    }

    /// Schedules the removal of a mount after the configured grace delay.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::NotFound`] if the mount is not in the cache.
    pub fn delete(&self, mount_id: u32) -> Result<()> {
        self.delete_at(mount_id, Instant::now())
    }

    /// Same as [`Self::delete`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::NotFound`] if the mount is not in the cache.
    pub fn delete_at(&self, mount_id: u32, now: Instant) -> Result<()> {
        let mut state = self.state.write();
        let mount = state.lookup(mount_id)?;
        state.delete_queue.push_back(DeleteRequest {
            mount,
            timeout_at: now + self.config.delete_delay,
        });
        Ok(())
    }

    /// Moves every delete request due at `now` into the redemption cache,
    /// finalizing whatever the cache evicts. Returns the number of mounts
    /// redeemed.
    pub fn dequeue(&self, now: Instant) -> usize {
        let redeemed = self.state.write().dequeue(now);
        if redeemed > 0 {
            tracing::trace!(redeemed, "delete queue drained");
        }
        redeemed
    }

    /// Resolves a mount record.
    ///
    /// `pid` and `container_id` come from the event being processed and
    /// select the mount tables scanned on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::NotFound`] if the mount is unknown and could not
    /// be recovered from procfs, a validation error for untrackable IDs, or
    /// the scan error if no candidate mount table could be read.
    pub fn resolve_mount(&self, mount_id: u32, pid: u32, container_id: &str) -> Result<Arc<Mount>> {
        self.resolve_with(mount_id, pid, container_id, |state| state.lookup(mount_id))
    }

    /// Resolves the absolute path of a mount.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_mount`], plus [`MountError::PathLoop`] and
    /// [`MountError::PathEmpty`] for broken parent chains.
    pub fn resolve_mount_path(&self, mount_id: u32, pid: u32, container_id: &str) -> Result<String> {
        self.resolve_with(mount_id, pid, container_id, |state| {
            state.mount_path(mount_id)
        })
    }

    /// Resolves the root of a mount within its source filesystem.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_mount`].
    pub fn resolve_mount_root(&self, mount_id: u32, pid: u32, container_id: &str) -> Result<String> {
        self.resolve_mount(mount_id, pid, container_id)
            .map(|mount| mount.root.clone())
    }

    /// Resolves the filesystem type of a mount.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_mount`].
    pub fn resolve_filesystem(&self, mount_id: u32, pid: u32, container_id: &str) -> Result<String> {
        self.resolve_mount(mount_id, pid, container_id)
            .map(|mount| mount.fs_type().to_owned())
    }

    /// Resolves the filesystem type of a mount, `"unknown"` on failure.
    pub fn filesystem_or_unknown(&self, mount_id: u32, pid: u32, container_id: &str) -> String {
        self.resolve_filesystem(mount_id, pid, container_id)
            .unwrap_or_else(|e| {
                tracing::trace!(mount_id, error = %e, "filesystem unresolved");
                UNKNOWN_FS.to_owned()
            })
    }

    /// Where `mount_id` stands in its lifecycle.
    pub fn mount_state(&self, mount_id: u32) -> MountState {
        let state = self.state.read();
        let Some(mount) = state.mounts.get(mount_id) else {
            return MountState::Unknown;
        };

        if state
            .redemption
            .peek(mount_id)
            .is_some_and(|m| Arc::ptr_eq(m, mount))
        {
            MountState::Redeemed
        } else if state
            .delete_queue
            .iter()
            .any(|req| Arc::ptr_eq(&req.mount, mount))
        {
            MountState::PendingDelete
        } else {
            MountState::Live
        }
    }

    /// Number of mounts held, redeemed ones included.
    pub fn len(&self) -> usize {
        self.state.read().mounts.len()
    }

    /// Returns `true` if no mount is held.
    pub fn is_empty(&self) -> bool {
        self.state.read().mounts.is_empty()
    }

    /// Number of delete requests waiting for their grace delay.
    pub fn pending_deletes(&self) -> usize {
        self.state.read().delete_queue.len()
    }

    /// Every mount held, sorted by mount ID.
    pub fn mounts(&self) -> Vec<Arc<Mount>> {
        let mut mounts: Vec<_> = self.state.read().mounts.iter().cloned().collect();
        mounts.sort_by_key(|m| m.mount_id);
        mounts
    }

    /// Current hit and miss counters, without resetting them.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Flushes hit/miss counters, limiter counters, and the cache size to the
    /// stats sink. Counters restart from zero.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the sink.
    #[allow(clippy::cast_precision_loss)]
    pub fn send_stats(&self) -> Result<()> {
        let snapshot = self.stats.swap();
        let (size, limiter) = {
            let mut state = self.state.write();
            (state.mounts.len(), state.limiter.swap_stats())
        };

        self.sink
            .count(METRIC_RESOLVER_HITS, snapshot.cache_hits, &[CACHE_TAG])?;
        self.sink
            .count(METRIC_RESOLVER_MISS, snapshot.cache_miss, &[CACHE_TAG])?;
        self.sink
            .count(METRIC_RESOLVER_HITS, snapshot.proc_hits, &[PROCFS_TAG])?;
        self.sink
            .count(METRIC_RESOLVER_MISS, snapshot.proc_miss, &[PROCFS_TAG])?;
        self.sink.count(METRIC_LIMITER_ALLOWED, limiter.allowed, &[])?;
        self.sink.count(METRIC_LIMITER_DROPPED, limiter.dropped, &[])?;
        self.sink
            .gauge(METRIC_RESOLVER_CACHE_SIZE, size as f64, &[])
    }

    /// Spawns the maintenance loop on the current tokio runtime.
    pub fn start(self: &Arc<Self>, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        crate::maintenance::spawn_maintenance(Arc::clone(self), shutdown_rx)
    }

    /// PIDs whose mount tables may hold `container_id`'s mounts, in the
    /// order they are tried: the event PID, then the workload's PIDs when
    /// the container is known, else PID 1 when the event has no container.
    /// PID 0 and duplicates are dropped.
    pub fn candidate_pids(&self, pid: u32, container_id: &str) -> Vec<u32> {
        let mut pids = vec![pid];

        if let Some(workload) = self.workloads.get_workload(container_id) {
            pids.extend_from_slice(workload.pids());
        } else if container_id.is_empty() {
            pids.push(INIT_PID);
        }

        let mut seen = HashSet::new();
        pids.retain(|p| *p != 0 && seen.insert(*p));
        pids
    }

    fn resolve_with<T, F>(&self, mount_id: u32, pid: u32, container_id: &str, lookup: F) -> Result<T>
    where
        F: Fn(&State) -> Result<T>,
    {
        let hit = {
            let state = self.state.read();
            state.validate(mount_id)?;
            match lookup(&state) {
                Ok(found) => Some((found, state.redemption.contains(mount_id))),
                Err(e) if e.is_not_found() => None,
                // broken parent chains are not cured by a rescan
                Err(e) => return Err(e),
            }
        };

        if let Some((found, redeemed)) = hit {
            if redeemed {
                // the recency touch reorders the LRU: exclusive lock
                let _ = self.state.write().redemption.get(mount_id);
            }
            self.stats.cache_hit();
            return Ok(found);
        }

        self.stats.cache_miss();
        tracing::trace!(mount_id, pid, "mount cache miss");

        if !self.config.use_procfs {
            return Err(MountError::NotFound { mount_id });
        }
        if !self.state.write().limiter.is_allowed(mount_id) {
            tracing::trace!(mount_id, "procfs fallback throttled");
            return Err(MountError::NotFound { mount_id });
        }

        let pids = self.candidate_pids(pid, container_id);
        if pids.is_empty() {
            self.fallback_failed(mount_id);
            return Err(MountError::NotFound { mount_id });
        }

        if let Err(e) = self.sync_pids(&pids) {
            self.fallback_failed(mount_id);
            return Err(e);
        }

        let state = self.state.read();
        match lookup(&state) {
            Ok(found) => {
                self.stats.proc_hit();
                Ok(found)
            }
            Err(e) => {
                self.stats.proc_miss();
                Err(e)
            }
        }
    }

    fn fallback_failed(&self, mount_id: u32) {
        self.stats.proc_miss();
        self.state.write().limiter.count(mount_id);
    }

    /// Merges the mount table of the first PID that can be read.
    fn sync_pids(&self, pids: &[u32]) -> Result<usize> {
        let mut last_err = None;

        for &pid in pids {
            match self.source.mount_info(pid) {
                Ok(entries) => {
                    let merged = self.state.write().merge(&entries);
                    tracing::debug!(pid, merged, "mount table merged");
                    return Ok(merged);
                }
                Err(e) => {
                    tracing::trace!(pid, error = %e, "mount table unavailable");
                    last_err = Some(e);
                }
            }
        }

        last_err.map_or(Ok(0), Err)
    }
}
