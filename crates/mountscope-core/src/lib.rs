//! # mountscope-core
//!
//! Translates kernel mount IDs into paths, roots, and filesystem types.
//!
//! This crate provides:
//! - **Mount map**: O(1) storage of mount records keyed by mount ID.
//! - **Redemption cache**: a bounded LRU of recently deleted mounts whose
//!   eviction finalizes the mount, its children, and its overlay siblings.
//! - **Fallback limiter**: per mount ID throttling of procfs rescans.
//! - **Resolver**: lookups with lazy parent-chain path construction, delayed
//!   deletion, and a `/proc/<pid>/mountinfo` fallback on cache misses.
//! - **Maintenance**: the periodic sweep that drains the delete queue.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod limiter;
pub mod maintenance;
pub mod map;
pub mod mount;
pub mod mountinfo;
pub mod redemption;
pub mod resolver;
pub mod stats;
pub mod workload;

pub use mount::Mount;
pub use resolver::Resolver;
