//! Cluster topology: the slot map, the node arena, snapshot
//! publication, and discovery against `CLUSTER SHARDS`/`CLUSTER SLOTS`.

pub mod discovery;
pub mod slot_map;
pub mod snapshot;

pub use discovery::{parse_cluster_shards, parse_cluster_slots};
pub use slot_map::{NodeArena, NodeId, NodeRecord, NodeRole, SlotMap, TOTAL_SLOTS};
pub use snapshot::{TopologyHandle, TopologySnapshot};

use tokio::sync::Mutex;

/// Guards at-most-one topology refresh in flight; a second caller that
/// arrives mid-refresh simply waits on the same lock instead of
/// issuing its own `CLUSTER SHARDS` round-trip.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    lock: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `refresh` with exclusive access; concurrent callers queue
    /// behind the mutex and each still re-runs `refresh` once it is
    /// their turn — callers that only want the side effect of a
    /// *coalesced* refresh should check the handle's generation before
    /// deciding whether to call this at all.
    pub async fn run_coalesced<F, Fut>(&self, refresh: F) -> crate::error::Result<TopologySnapshot>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::error::Result<TopologySnapshot>>,
    {
        let _guard = self.lock.lock().await;
        refresh().await
    }
}
