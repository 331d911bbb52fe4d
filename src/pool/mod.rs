//! Connection pooling: one [`connection_pool::NodePool`] per server,
//! keyed by address and shared across standalone and cluster modes.

pub mod connection_pool;
pub mod metrics;

pub use connection_pool::NodePool;
pub use metrics::PoolMetrics;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::codec::PushFrame;
use crate::config::ClientConfig;
use crate::error::{CoreError, Result};

/// Owns every node pool the client currently talks to, creating them
/// lazily as the topology (or the single standalone seed) introduces
/// new addresses.
pub struct PoolRegistry {
    config: ClientConfig,
    pools: RwLock<HashMap<(String, u16), Arc<NodePool>>>,
    push_forward: mpsc::UnboundedSender<PushFrame>,
    on_connected: Option<Arc<dyn Fn(crate::connection::Connection) + Send + Sync>>,
}

impl PoolRegistry {
    pub fn new(config: ClientConfig, push_forward: mpsc::UnboundedSender<PushFrame>) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
            push_forward,
            on_connected: None,
        }
    }

    /// Attaches a hook invoked for every (re)established connection
    /// across every node pool this registry creates from this point on.
    pub fn with_on_connected(
        mut self,
        hook: Arc<dyn Fn(crate::connection::Connection) + Send + Sync>,
    ) -> Self {
        self.on_connected = Some(hook);
        self
    }

    /// Returns the pool for `(host, port)`, creating and connecting it
    /// on first use.
    pub async fn pool_for(&self, host: &str, port: u16) -> Arc<NodePool> {
        if let Some(existing) = self.pools.read().get(&(host.to_string(), port)) {
            return existing.clone();
        }
        let pool = NodePool::new(
            host,
            port,
            &self.config,
            self.push_forward.clone(),
            self.on_connected.clone(),
        )
        .await;
        self.pools
            .write()
            .insert((host.to_string(), port), pool.clone());
        pool
    }

    pub fn existing_pool(&self, host: &str, port: u16) -> Option<Arc<NodePool>> {
        self.pools.read().get(&(host.to_string(), port)).cloned()
    }

    /// Drops pools for addresses no longer present in the current
    /// topology, closing their connections.
    pub fn prune(&self, keep: impl Fn(&str, u16) -> bool) {
        let mut pools = self.pools.write();
        let stale: Vec<_> = pools
            .keys()
            .filter(|(h, p)| !keep(h, *p))
            .cloned()
            .collect();
        for key in stale {
            if let Some(pool) = pools.remove(&key) {
                pool.close();
            }
        }
    }

    pub async fn health_check_all(&self) {
        let pools: Vec<_> = self.pools.read().values().cloned().collect();
        for pool in pools {
            pool.health_check().await;
        }
    }

    pub fn close_all(&self) {
        for pool in self.pools.read().values() {
            pool.close();
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshots every node pool currently live in this registry.
    pub fn metrics(&self) -> Vec<PoolMetrics> {
        self.pools.read().values().map(|pool| pool.metrics()).collect()
    }

    pub async fn acquire(&self, host: &str, port: u16) -> Result<crate::connection::Connection> {
        let pool = self.pool_for(host, port).await;
        pool.acquire()
            .map_err(|e| CoreError::ConnectionClosed(format!("{host}:{port}: {e}")))
    }
}
