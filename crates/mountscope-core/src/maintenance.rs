//! Background sweep of the delete queue.
//!
//! Runs until a shutdown signal is received or the shutdown channel closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::resolver::Resolver;

/// Drains due delete requests every `period`.
pub async fn run_maintenance_loop(
    resolver: Arc<Resolver>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            now = ticker.tick() => {
                let redeemed = resolver.dequeue(now.into_std());
                trace!(redeemed, pending = resolver.pending_deletes(), "maintenance sweep");
            }
            _ = shutdown_rx.recv() => {
                debug!(
                    pending = resolver.pending_deletes(),
                    mounts = resolver.len(),
                    "mount resolver maintenance shutting down"
                );
                break;
            }
        }
    }
}

/// Spawns [`run_maintenance_loop`] with the resolver's configured period.
pub fn spawn_maintenance(
    resolver: Arc<Resolver>,
    shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let period = resolver.config().dequeue_interval;
    tokio::spawn(run_maintenance_loop(resolver, period, shutdown_rx))
}
