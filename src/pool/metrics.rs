//! Per-node connection pool metrics: a point-in-time snapshot derived
//! from slot state, plus a rolling ping RTT average fed by the
//! background health checker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Simple moving average of ping round-trip time, updated from the
/// health-check loop without taking a lock.
#[derive(Default)]
pub struct PingRtt {
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl PingRtt {
    pub fn record(&self, rtt: Duration) {
        self.sum_micros.fetch_add(rtt.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn average(&self) -> Duration {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.sum_micros.load(Ordering::Relaxed) / count)
    }
}

/// Snapshot of one node pool's connection health, surfaced by
/// [`crate::client::ClientMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMetrics {
    pub host: String,
    pub port: u16,
    pub healthy_connections: usize,
    pub reconnecting_slots: usize,
    pub blocking_reserved: usize,
    pub total_slots: usize,
    pub last_reconnect_backoff: Duration,
    pub avg_ping_rtt: Duration,
}
