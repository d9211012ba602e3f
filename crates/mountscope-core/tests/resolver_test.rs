//! Integration tests for the mount resolver.
//!
//! These tests drive the public resolver API end to end:
//! 1. Cache hits and path construction
//! 2. Delayed deletion, redemption, and supersession
//! 3. Finalization of children and overlay siblings
//! 4. Procfs fallback against a fake proc tree
//! 5. Kernel floor and stats reporting

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mountscope_common::config::ResolverConfig;
use mountscope_common::constants::{
    CACHE_TAG, METRIC_RESOLVER_CACHE_SIZE, METRIC_RESOLVER_HITS, METRIC_RESOLVER_MISS, PROCFS_TAG,
    UNKNOWN_FS,
};
use mountscope_common::error::{MountError, Result};
use mountscope_common::types::{MountState, Workload};
use mountscope_core::mountinfo::{MountInfo, MountInfoSource};
use mountscope_core::stats::{StatsSink, TracingStatsSink};
use mountscope_core::workload::{NoWorkloads, StaticWorkloads};
use mountscope_core::{Mount, Resolver};

const GRACE: Duration = Duration::from_secs(5);

/// Mount table source that fails every read and counts attempts.
#[derive(Default)]
struct CountingSource {
    scans: AtomicUsize,
}

impl MountInfoSource for CountingSource {
    fn mount_info(&self, pid: u32) -> Result<Vec<MountInfo>> {
        let _ = self.scans.fetch_add(1, Ordering::SeqCst);
        Err(MountError::Io {
            path: format!("/proc/{pid}/mountinfo").into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    samples: Mutex<Vec<(String, f64, Vec<String>)>>,
}

impl RecordingSink {
    fn value(&self, metric: &str, tag: Option<&str>) -> Option<f64> {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _, tags)| m == metric && tag.is_none_or(|t| tags.iter().any(|x| x == t)))
            .map(|(_, v, _)| *v)
    }
}

impl StatsSink for RecordingSink {
    fn count(&self, metric: &str, value: u64, tags: &[&str]) -> Result<()> {
        self.samples.lock().unwrap().push((
            metric.to_owned(),
            value as f64,
            tags.iter().map(|t| (*t).to_owned()).collect(),
        ));
        Ok(())
    }

    fn gauge(&self, metric: &str, value: f64, tags: &[&str]) -> Result<()> {
        self.samples.lock().unwrap().push((
            metric.to_owned(),
            value,
            tags.iter().map(|t| (*t).to_owned()).collect(),
        ));
        Ok(())
    }
}

fn offline_config() -> ResolverConfig {
    ResolverConfig {
        use_procfs: false,
        ..ResolverConfig::default()
    }
}

fn resolver_with(config: ResolverConfig) -> (Resolver, Arc<CountingSource>) {
    let source = Arc::new(CountingSource::default());
    let resolver = Resolver::new(
        config,
        Arc::new(NoWorkloads),
        Arc::clone(&source) as Arc<dyn MountInfoSource>,
        Arc::new(TracingStatsSink),
    )
    .expect("valid config");
    (resolver, source)
}

fn offline_resolver() -> Resolver {
    resolver_with(offline_config()).0
}

fn insert_root(resolver: &Resolver) {
    resolver
        .insert(Mount::new(1, 0, 1, "ext4", "/", "/"))
        .expect("insert root");
}

/// Deletes `mount_id` at `t0` and sweeps once the grace delay is over.
fn delete_and_sweep(resolver: &Resolver, mount_id: u32, t0: Instant) {
    resolver.delete_at(mount_id, t0).expect("delete");
    let _ = resolver.dequeue(t0 + GRACE + Duration::from_secs(1));
}

fn write_mountinfo(proc_root: &Path, pid: u32, content: &str) {
    let dir = proc_root.join(pid.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("mountinfo"), content).unwrap();
}

// ── Cache hits ───────────────────────────────────────────────────────

#[test]
fn resolve_returns_inserted_record() {
    let resolver = offline_resolver();
    insert_root(&resolver);
    resolver
        .insert(Mount::new(7, 1, 3, "xfs", "srv", "/volumes/7"))
        .unwrap();

    let mount = resolver.resolve_mount(7, 100, "").unwrap();
    assert_eq!(mount.mount_id, 7);
    assert_eq!(mount.parent_mount_id, 1);
    assert_eq!(mount.device, 3);
    assert_eq!(resolver.resolve_mount_root(7, 100, "").unwrap(), "/volumes/7");
    assert_eq!(resolver.resolve_filesystem(7, 100, "").unwrap(), "xfs");
    assert_eq!(resolver.stats().cache_hits, 3);
}

#[test]
fn child_path_joins_onto_root() {
    let resolver = offline_resolver();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "data", "/")).unwrap();

    assert_eq!(resolver.resolve_mount_path(2, 1, "").unwrap(), "/data");
}

#[test]
fn event_mount_point_leading_separator_is_stripped() {
    let resolver = offline_resolver();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "/data", "/")).unwrap();
    resolver.insert(Mount::new(3, 2, 3, "tmpfs", "/cache", "/")).unwrap();

    assert_eq!(resolver.resolve_mount_path(3, 1, "").unwrap(), "/data/cache");
}

#[test]
fn path_resolution_is_idempotent_and_cached() {
    let resolver = offline_resolver();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "var", "/")).unwrap();
    resolver.insert(Mount::new(3, 2, 3, "ext4", "lib", "/")).unwrap();

    let first = resolver.resolve_mount_path(3, 1, "").unwrap();
    let cached = resolver.resolve_mount(3, 1, "").unwrap();
    assert_eq!(cached.path(), Some(first.as_str()));

    let second = resolver.resolve_mount_path(3, 1, "").unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "/var/lib");
}

#[test]
fn missing_parent_fails_path_but_not_record() {
    let resolver = offline_resolver();
    resolver.insert(Mount::new(9, 8, 2, "ext4", "lost", "/")).unwrap();

    assert!(resolver.resolve_mount(9, 1, "").is_ok());
    assert!(resolver.resolve_mount_path(9, 1, "").unwrap_err().is_not_found());
}

#[test]
fn parent_cycle_is_reported() {
    let resolver = offline_resolver();
    resolver.insert(Mount::new(4, 5, 1, "ext4", "a", "/")).unwrap();
    resolver.insert(Mount::new(5, 4, 1, "ext4", "b", "/")).unwrap();

    let err = resolver.resolve_mount_path(4, 1, "").unwrap_err();
    assert!(matches!(err, MountError::PathLoop { .. }));
}

// ── Validation ───────────────────────────────────────────────────────

#[test]
fn mount_id_zero_is_undefined() {
    let resolver = offline_resolver();
    assert!(matches!(resolver.validate_mount_id(0), Err(MountError::Undefined)));

    insert_root(&resolver);
    assert!(matches!(resolver.validate_mount_id(0), Err(MountError::Undefined)));
    assert!(matches!(resolver.resolve_mount(0, 1, ""), Err(MountError::Undefined)));
    assert!(matches!(
        resolver.insert(Mount::new(0, 1, 1, "ext4", "x", "/")),
        Err(MountError::Undefined)
    ));
}

#[test]
fn unknown_mount_without_fallback_is_not_found_without_scanning() {
    let (resolver, source) = resolver_with(offline_config());

    let err = resolver.resolve_mount(5, 1, "").unwrap_err();
    assert!(matches!(err, MountError::NotFound { mount_id: 5 }));
    assert_eq!(source.scans.load(Ordering::SeqCst), 0);
    assert_eq!(resolver.stats().cache_miss, 1);
}

#[test]
fn unknown_mount_with_unreadable_proc_is_an_error() {
    let (resolver, source) = resolver_with(ResolverConfig::default());

    let err = resolver.resolve_mount(5, 42, "").unwrap_err();
    assert!(matches!(err, MountError::Io { .. }));
    // pid 42, then pid 1 for an event without container
    assert_eq!(source.scans.load(Ordering::SeqCst), 2);
    assert_eq!(resolver.stats().proc_miss, 1);

    // throttled on the next attempt
    let err = resolver.resolve_mount(5, 42, "").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(source.scans.load(Ordering::SeqCst), 2);
}

#[test]
fn filesystem_or_unknown_falls_back_to_sentinel() {
    let resolver = offline_resolver();
    assert_eq!(resolver.filesystem_or_unknown(11, 1, ""), UNKNOWN_FS);
}

#[test]
fn delete_of_unknown_mount_is_not_found() {
    let resolver = offline_resolver();
    assert!(resolver.delete(3).unwrap_err().is_not_found());
}

// ── Delayed deletion ─────────────────────────────────────────────────

#[test]
fn deleted_mount_resolves_during_grace_period() {
    let resolver = offline_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "data", "/")).unwrap();

    resolver.delete_at(2, t0).unwrap();
    assert_eq!(resolver.mount_state(2), MountState::PendingDelete);
    assert_eq!(resolver.resolve_mount_path(2, 1, "").unwrap(), "/data");

    assert_eq!(resolver.dequeue(t0 + Duration::from_secs(1)), 0);
    assert_eq!(resolver.mount_state(2), MountState::PendingDelete);
}

#[test]
fn swept_mount_is_redeemed_and_still_resolvable() {
    let resolver = offline_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "data", "/")).unwrap();

    delete_and_sweep(&resolver, 2, t0);
    assert_eq!(resolver.mount_state(2), MountState::Redeemed);
    assert_eq!(resolver.pending_deletes(), 0);
    assert_eq!(resolver.resolve_mount_path(2, 1, "").unwrap(), "/data");
}

#[test]
fn reinserted_id_supersedes_redeemed_record() {
    let resolver = offline_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "old", "/")).unwrap();
    resolver.insert(Mount::new(3, 2, 3, "ext4", "child", "/")).unwrap();
    let old = resolver.resolve_mount(2, 1, "").unwrap();

    resolver.delete_at(2, t0).unwrap();
    assert_eq!(resolver.dequeue(t0 + GRACE + Duration::from_secs(1)), 1);
    assert_eq!(resolver.mount_state(2), MountState::Redeemed);
    resolver.insert(Mount::new(2, 1, 9, "btrfs", "new", "/")).unwrap();

    let new = resolver.resolve_mount(2, 1, "").unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert_eq!(new.fs_type(), "btrfs");
    assert_eq!(resolver.mount_state(2), MountState::Live);
    assert_eq!(resolver.resolve_mount_path(2, 1, "").unwrap(), "/new");

    // the old record's child must not hang off the new mount
    assert_eq!(resolver.mount_state(3), MountState::Unknown);
    assert!(resolver.resolve_mount_path(3, 1, "").unwrap_err().is_not_found());
    assert_eq!(resolver.len(), 2);
}

#[test]
fn reinserted_redeemed_overlay_finalizes_device_siblings() {
    let resolver = offline_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(30, 1, 99, "overlay", "merged", "/")).unwrap();
    resolver.insert(Mount::new(31, 1, 99, "overlay", "layer", "/")).unwrap();

    delete_and_sweep(&resolver, 30, t0);
    resolver.insert(Mount::new(30, 1, 7, "ext4", "fresh", "/")).unwrap();

    assert_eq!(resolver.mount_state(31), MountState::Unknown);
    assert_eq!(resolver.mount_state(30), MountState::Live);
}

#[test]
fn reinserted_live_id_finalizes_previous_record_and_children() {
    let resolver = offline_resolver();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "old", "/")).unwrap();
    resolver.insert(Mount::new(3, 2, 3, "ext4", "child", "/")).unwrap();

    resolver.insert(Mount::new(2, 1, 4, "xfs", "new", "/")).unwrap();

    assert_eq!(resolver.resolve_filesystem(2, 1, "").unwrap(), "xfs");
    assert_eq!(resolver.mount_state(3), MountState::Unknown);
    assert_eq!(resolver.len(), 2);
}

#[test]
fn stale_delete_request_skips_superseding_record() {
    let resolver = offline_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "old", "/")).unwrap();

    resolver.delete_at(2, t0).unwrap();
    resolver.insert(Mount::new(2, 1, 5, "ext4", "new", "/")).unwrap();

    assert_eq!(resolver.dequeue(t0 + GRACE), 0);
    assert_eq!(resolver.mount_state(2), MountState::Live);
    assert_eq!(resolver.resolve_mount_path(2, 1, "").unwrap(), "/new");
}

#[test]
fn dequeue_drains_in_arrival_order() {
    let resolver = offline_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    for id in 2..=4 {
        resolver
            .insert(Mount::new(id, 1, id, "ext4", format!("m{id}"), "/"))
            .unwrap();
    }

    resolver.delete_at(2, t0).unwrap();
    resolver.delete_at(3, t0 + Duration::from_secs(1)).unwrap();
    resolver.delete_at(4, t0 + Duration::from_secs(2)).unwrap();

    assert_eq!(resolver.dequeue(t0 + GRACE + Duration::from_secs(1)), 2);
    assert_eq!(resolver.mount_state(4), MountState::PendingDelete);
    assert_eq!(resolver.dequeue(t0 + GRACE + Duration::from_secs(2)), 1);
    assert_eq!(resolver.pending_deletes(), 0);
}

// ── Finalization ─────────────────────────────────────────────────────

fn single_slot_resolver() -> Resolver {
    resolver_with(ResolverConfig {
        redemption_capacity: 1,
        ..offline_config()
    })
    .0
}

#[test]
fn eviction_finalizes_three_level_chain() {
    let resolver = single_slot_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(10, 1, 10, "ext4", "grand", "/")).unwrap();
    resolver.insert(Mount::new(11, 10, 11, "ext4", "parent", "/")).unwrap();
    resolver.insert(Mount::new(12, 11, 12, "ext4", "child", "/")).unwrap();
    resolver.insert(Mount::new(20, 1, 20, "ext4", "other", "/")).unwrap();

    delete_and_sweep(&resolver, 10, t0);
    assert_eq!(resolver.mount_state(10), MountState::Redeemed);
    assert_eq!(resolver.mount_state(12), MountState::Live);

    // redeeming another mount evicts the grandparent
    delete_and_sweep(&resolver, 20, t0);

    for id in [10, 11, 12] {
        assert_eq!(resolver.mount_state(id), MountState::Unknown, "mount {id}");
        assert!(resolver.resolve_mount(id, 1, "").unwrap_err().is_not_found());
    }
    assert_eq!(resolver.mount_state(20), MountState::Redeemed);
    assert_eq!(resolver.mount_state(1), MountState::Live);
}

#[test]
fn eviction_of_overlay_finalizes_device_siblings() {
    let resolver = single_slot_resolver();
    let t0 = Instant::now();
    insert_root(&resolver);
    resolver.insert(Mount::new(30, 1, 99, "overlay", "merged", "/")).unwrap();
    resolver.insert(Mount::new(31, 1, 99, "overlay", "elsewhere", "/")).unwrap();
    resolver.insert(Mount::new(32, 1, 5, "ext4", "unrelated", "/")).unwrap();
    resolver.insert(Mount::new(33, 1, 6, "ext4", "spare", "/")).unwrap();

    delete_and_sweep(&resolver, 30, t0);
    delete_and_sweep(&resolver, 33, t0);

    assert_eq!(resolver.mount_state(30), MountState::Unknown);
    assert_eq!(resolver.mount_state(31), MountState::Unknown);
    assert_eq!(resolver.mount_state(32), MountState::Live);
    assert_eq!(resolver.mount_state(33), MountState::Redeemed);
}

#[test]
fn touching_redeemed_mount_keeps_it_warm() {
    let resolver = resolver_with(ResolverConfig {
        redemption_capacity: 2,
        ..offline_config()
    })
    .0;
    let t0 = Instant::now();
    insert_root(&resolver);
    for id in 40..=42 {
        resolver
            .insert(Mount::new(id, 1, id, "ext4", format!("m{id}"), "/"))
            .unwrap();
    }

    delete_and_sweep(&resolver, 40, t0);
    delete_and_sweep(&resolver, 41, t0);
    assert!(resolver.resolve_mount(40, 1, "").is_ok());

    delete_and_sweep(&resolver, 42, t0);
    assert_eq!(resolver.mount_state(40), MountState::Redeemed);
    assert_eq!(resolver.mount_state(41), MountState::Unknown);
}

// ── Procfs fallback ──────────────────────────────────────────────────

const INIT_TABLE: &str = "\
21 1 0:20 / /proc rw,nosuid - proc proc rw
20 0 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
25 20 0:44 / /var/lib/docker rw - xfs /dev/sdb1 rw
";

const CONTAINER_TABLE: &str = "\
300 299 0:90 / / rw - overlay overlay rw,lowerdir=/l
301 300 0:91 / /proc rw - proc proc rw
";

fn procfs_resolver(
    proc_root: &Path,
    workloads: Arc<dyn mountscope_core::workload::WorkloadResolver>,
) -> Resolver {
    let config = ResolverConfig {
        proc_root: proc_root.to_path_buf(),
        ..ResolverConfig::default()
    };
    Resolver::with_procfs(config, workloads, Arc::new(TracingStatsSink)).unwrap()
}

#[test]
fn sync_init_establishes_kernel_floor() {
    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(dir.path(), 1, INIT_TABLE);
    let resolver = procfs_resolver(dir.path(), Arc::new(NoWorkloads));

    assert_eq!(resolver.min_mount_id(), 0);
    resolver.sync_cache(1).unwrap();

    assert_eq!(resolver.min_mount_id(), 20);
    assert_eq!(resolver.len(), 3);
    assert!(matches!(
        resolver.validate_mount_id(5),
        Err(MountError::BelowKernelFloor { mount_id: 5, floor: 20 })
    ));
    assert_eq!(
        resolver.resolve_mount_path(25, 1, "").unwrap(),
        "/var/lib/docker"
    );
    assert_eq!(resolver.stats().proc_hits, 0);
}

#[test]
fn sync_of_missing_pid_fails() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = procfs_resolver(dir.path(), Arc::new(NoWorkloads));

    assert!(matches!(resolver.sync_cache(4242), Err(MountError::Io { .. })));
    assert!(resolver.is_empty());
}

#[test]
fn sync_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(dir.path(), 1, INIT_TABLE);
    let resolver = procfs_resolver(dir.path(), Arc::new(NoWorkloads));

    resolver.sync_cache(1).unwrap();
    let before = resolver.resolve_mount(25, 1, "").unwrap();
    resolver.sync_cache(1).unwrap();
    let after = resolver.resolve_mount(25, 1, "").unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(resolver.len(), 3);
}

#[test]
fn cache_miss_recovers_from_init_table() {
    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(dir.path(), 1, INIT_TABLE);
    let resolver = procfs_resolver(dir.path(), Arc::new(NoWorkloads));

    // pid 777 is gone, the event has no container: init is tried next
    let mount = resolver.resolve_mount(25, 777, "").unwrap();
    assert_eq!(mount.fs_type(), "xfs");
    assert_eq!(mount.path(), Some("/var/lib/docker"));

    let stats = resolver.stats();
    assert_eq!(stats.cache_miss, 1);
    assert_eq!(stats.proc_hits, 1);
}

#[test]
fn cache_miss_scans_workload_pids() {
    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(dir.path(), 1, INIT_TABLE);
    write_mountinfo(dir.path(), 501, CONTAINER_TABLE);
    let workloads = Arc::new(StaticWorkloads::new());
    workloads.insert(Workload::new("c0ffee", vec![500, 501]));
    let resolver = procfs_resolver(dir.path(), workloads);

    let fs = resolver.resolve_filesystem(300, 0, "c0ffee").unwrap();
    assert_eq!(fs, "overlay");
    // the container table does not hold the host mounts
    assert_eq!(resolver.mount_state(25), MountState::Unknown);
}

#[test]
fn unknown_container_does_not_fall_back_to_init() {
    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(dir.path(), 1, INIT_TABLE);
    let resolver = procfs_resolver(dir.path(), Arc::new(NoWorkloads));

    let err = resolver.resolve_mount(25, 0, "deadbeef").unwrap_err();
    assert!(err.is_not_found());
    assert!(resolver.is_empty());
}

#[test]
fn candidate_pid_precedence() {
    let workloads = Arc::new(StaticWorkloads::new());
    workloads.insert(Workload::new("c1", vec![10, 11]));
    let resolver = Resolver::new(
        ResolverConfig::default(),
        workloads,
        Arc::new(CountingSource::default()),
        Arc::new(TracingStatsSink),
    )
    .unwrap();

    assert_eq!(resolver.candidate_pids(1, ""), vec![1]);
    assert_eq!(resolver.candidate_pids(9, ""), vec![9, 1]);
    assert_eq!(resolver.candidate_pids(11, "c1"), vec![11, 10]);
    assert_eq!(resolver.candidate_pids(0, "c1"), vec![10, 11]);
    assert_eq!(resolver.candidate_pids(9, "c2"), vec![9]);
}

#[test]
fn merge_keeps_directly_inserted_record() {
    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(dir.path(), 1, INIT_TABLE);
    let resolver = procfs_resolver(dir.path(), Arc::new(NoWorkloads));
    resolver
        .insert(Mount::new(25, 20, 44, "xfs", "var/lib/docker", "/"))
        .unwrap();
    let before = resolver.resolve_mount(25, 1, "").unwrap();

    resolver.sync_cache(1).unwrap();

    let after = resolver.resolve_mount(25, 1, "").unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(resolver.len(), 3);
}

// ── Concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_operations_keep_state_consistent() {
    const WORKERS: u32 = 8;
    const ROUNDS: u32 = 2000;

    let dir = tempfile::tempdir().unwrap();
    write_mountinfo(
        dir.path(),
        1,
        "1 0 8:1 / / rw - ext4 /dev/sda1 rw\n100 1 0:100 / /srv rw - xfs /dev/sdb1 rw\n",
    );
    let config = ResolverConfig {
        proc_root: dir.path().to_path_buf(),
        redemption_capacity: 4,
        ..ResolverConfig::default()
    };
    let resolver =
        Resolver::with_procfs(config, Arc::new(NoWorkloads), Arc::new(TracingStatsSink)).unwrap();
    insert_root(&resolver);
    resolver.sync_cache(1).unwrap();
    let srv = resolver.resolve_mount(100, 1, "").unwrap();
    let t0 = Instant::now();

    std::thread::scope(|scope| {
        for worker in 0..WORKERS {
            let resolver = &resolver;
            let _ = scope.spawn(move || {
                for n in 0..ROUNDS {
                    let id = 2 + (n + worker) % 16;
                    match n % 5 {
                        0 => {
                            let _ = resolver.insert(Mount::new(id, 1, id, "ext4", "m", "/"));
                        }
                        1 => {
                            let _ = resolver.resolve_mount_path(id, 1, "");
                        }
                        2 => {
                            let _ = resolver.delete_at(id, t0);
                        }
                        3 => {
                            let _ = resolver.dequeue(t0 + GRACE + Duration::from_secs(1));
                        }
                        _ if worker == 0 => {
                            let _ = resolver.sync_cache(1);
                        }
                        _ => {
                            let _ = resolver.mount_state(id);
                        }
                    }
                }
            });
        }
    });

    assert_eq!(resolver.len(), resolver.mounts().len());
    assert_eq!(resolver.mount_state(1), MountState::Live);
    assert_eq!(resolver.resolve_mount_path(100, 1, "").unwrap(), "/srv");

    resolver.sync_cache(1).unwrap();
    let after = resolver.resolve_mount(100, 1, "").unwrap();
    assert!(Arc::ptr_eq(&srv, &after));
}

// ── Stats ────────────────────────────────────────────────────────────

#[test]
fn send_stats_reports_and_resets_counters() {
    let sink = Arc::new(RecordingSink::default());
    let resolver = Resolver::new(
        offline_config(),
        Arc::new(NoWorkloads),
        Arc::new(CountingSource::default()),
        Arc::clone(&sink) as Arc<dyn StatsSink>,
    )
    .unwrap();
    insert_root(&resolver);
    resolver.insert(Mount::new(2, 1, 2, "ext4", "data", "/")).unwrap();

    let _ = resolver.resolve_mount(2, 1, "").unwrap();
    let _ = resolver.resolve_mount(9, 1, "").unwrap_err();
    resolver.send_stats().unwrap();

    assert_eq!(sink.value(METRIC_RESOLVER_HITS, Some(CACHE_TAG)), Some(1.0));
    assert_eq!(sink.value(METRIC_RESOLVER_MISS, Some(CACHE_TAG)), Some(1.0));
    assert_eq!(sink.value(METRIC_RESOLVER_HITS, Some(PROCFS_TAG)), Some(0.0));
    assert_eq!(sink.value(METRIC_RESOLVER_CACHE_SIZE, None), Some(2.0));
    assert_eq!(resolver.stats().cache_hits, 0);
}
