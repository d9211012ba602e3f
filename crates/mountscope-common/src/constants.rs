//! System-wide constants and defaults.

use std::time::Duration;

/// Default procfs mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Delay between a delete request and its move into the redemption cache.
pub const DEFAULT_DELETE_DELAY: Duration = Duration::from_secs(5);

/// Period of the maintenance sweep draining the delete queue.
pub const DEFAULT_DEQUEUE_INTERVAL: Duration = Duration::from_secs(2);

/// Number of recently deleted mounts kept warm before finalization.
pub const DEFAULT_REDEMPTION_CAPACITY: usize = 1024;

/// Number of mount IDs tracked by the procfs fallback limiter.
pub const DEFAULT_FALLBACK_LIMITER_KEYS: usize = 64;

/// Window in which a single mount ID may trigger a procfs rescan.
pub const DEFAULT_FALLBACK_LIMITER_PERIOD: Duration = Duration::from_secs(5);

/// Rescans allowed per mount ID and window.
pub const DEFAULT_FALLBACK_LIMITER_BURST: u32 = 1;

/// PID of the init process, whose mount table defines the kernel floor.
pub const INIT_PID: u32 = 1;

/// Filesystem type reported when a mount cannot be resolved.
pub const UNKNOWN_FS: &str = "unknown";

/// Filesystem type of overlay mounts, which share one device across mounts.
pub const OVERLAY_FS: &str = "overlay";

/// Metric counting successful resolutions.
pub const METRIC_RESOLVER_HITS: &str = "mountscope.mount_resolver.hits";

/// Metric counting failed resolutions.
pub const METRIC_RESOLVER_MISS: &str = "mountscope.mount_resolver.miss";

/// Gauge of the number of mounts held by the resolver.
pub const METRIC_RESOLVER_CACHE_SIZE: &str = "mountscope.mount_resolver.cache_size";

/// Metric counting procfs rescans let through by the fallback limiter.
pub const METRIC_LIMITER_ALLOWED: &str = "mountscope.mount_resolver.fallback.allowed";

/// Metric counting procfs rescans throttled by the fallback limiter.
pub const METRIC_LIMITER_DROPPED: &str = "mountscope.mount_resolver.fallback.dropped";

/// Tag for resolutions served from the in-memory cache.
pub const CACHE_TAG: &str = "resolution:cache";

/// Tag for resolutions served after a procfs rescan.
pub const PROCFS_TAG: &str = "resolution:procfs";

/// Application name used in CLI output.
pub const APP_NAME: &str = "mountscope";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "mntscope";
