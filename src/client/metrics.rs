//! Read-only diagnostic snapshot of a client's pool and topology
//! health, grounded on the pool's own per-node metrics. Not part of
//! the FFI surface; reachable only from an in-process Rust caller
//! holding an `Arc<Client>` directly.

use tokio::time::Instant;

use crate::pool::PoolMetrics;

/// Aggregate health snapshot across every node pool this client
/// currently maintains, plus (cluster mode only) topology freshness.
#[derive(Debug, Clone)]
pub struct ClientMetrics {
    pub pools: Vec<PoolMetrics>,
    pub topology: Option<TopologyMetrics>,
}

#[derive(Debug, Clone)]
pub struct TopologyMetrics {
    pub generation: u64,
    pub slot_coverage_percentage: f64,
    pub last_refresh: Option<Instant>,
}
