//! Per-node connection pool: maintains N connections to one server,
//! round-robins healthy ones, takes blocking-command holders out of
//! rotation, and reconnects broken slots with exponential backoff.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::codec::{encode_command, PushFrame};
use crate::config::{AuthConfig, BackoffStrategy, ClientConfig, ProtocolVersion, TlsMode};
use crate::connection::{Connection, ConnectionState};
use crate::error::{CoreError, Result};

use super::metrics::{PingRtt, PoolMetrics};

struct Slot {
    conn: Option<Connection>,
    attempt: u32,
}

/// One node's pool. `push_rx` for every newly-established connection
/// is forwarded to `push_forward` so the pub/sub dispatcher sees
/// frames from whichever physical socket currently backs a slot.
pub struct NodePool {
    host: String,
    port: u16,
    tls_mode: TlsMode,
    protocol: ProtocolVersion,
    auth: Option<AuthConfig>,
    client_name: Option<String>,
    database_id: u32,
    backoff: BackoffStrategy,
    slots: Vec<Arc<RwLock<Slot>>>,
    rr_counter: AtomicUsize,
    push_forward: mpsc::UnboundedSender<PushFrame>,
    closed: std::sync::atomic::AtomicBool,
    on_connected: Option<Arc<dyn Fn(Connection) + Send + Sync>>,
    ping_rtt: PingRtt,
    last_reconnect_backoff_millis: AtomicU64,
}

impl NodePool {
    /// Creates the pool and eagerly attempts `connections_per_node`
    /// initial connections; slots that fail start a background
    /// reconnect loop instead of failing the whole pool. `on_connected`
    /// fires for every newly-established (or re-established)
    /// connection, letting the pub/sub subsystem replay subscriptions.
    pub async fn new(
        host: impl Into<String>,
        port: u16,
        config: &ClientConfig,
        push_forward: mpsc::UnboundedSender<PushFrame>,
        on_connected: Option<Arc<dyn Fn(Connection) + Send + Sync>>,
    ) -> Arc<Self> {
        let host = host.into();
        let n = config.connections_per_node.max(1);
        let pool = Arc::new(NodePool {
            host,
            port,
            tls_mode: config.tls_mode,
            protocol: config.protocol,
            auth: config.auth.clone(),
            client_name: config.client_name.clone(),
            database_id: config.database_id,
            backoff: config.retry,
            slots: (0..n)
                .map(|_| Arc::new(RwLock::new(Slot { conn: None, attempt: 0 })))
                .collect(),
            rr_counter: AtomicUsize::new(0),
            push_forward,
            closed: std::sync::atomic::AtomicBool::new(false),
            on_connected,
            ping_rtt: PingRtt::default(),
            last_reconnect_backoff_millis: AtomicU64::new(0),
        });

        for idx in 0..n {
            pool.clone().spawn_slot_manager(idx);
        }

        pool
    }

    pub fn address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Round-robins across healthy, non-blocking-reserved connections.
    pub fn acquire(&self) -> Result<Connection> {
        let n = self.slots.len();
        for offset in 0..n {
            let idx = (self.rr_counter.fetch_add(1, Ordering::Relaxed) + offset) % n;
            let guard = self.slots[idx].read();
            if let Some(conn) = &guard.conn {
                if conn.state() == ConnectionState::Healthy && !conn.holds_blocking() {
                    return Ok(conn.clone());
                }
            }
        }
        Err(CoreError::ConnectionClosed(format!(
            "no healthy connection available to {}:{}",
            self.host, self.port
        )))
    }

    /// Pings every idle healthy connection; a failed ping marks it
    /// broken, letting the slot manager's next tick reconnect it.
    pub async fn health_check(&self) {
        for slot in &self.slots {
            let conn = {
                let guard = slot.read();
                match &guard.conn {
                    Some(c) if c.state() == ConnectionState::Healthy && !c.holds_blocking() => c.clone(),
                    _ => continue,
                }
            };
            let frame = encode_command(b"PING", std::iter::empty());
            let started = Instant::now();
            if conn.send(frame).await.is_err() {
                warn!(host = %self.host, port = self.port, "health check ping failed");
                conn.close();
            } else {
                self.ping_rtt.record(started.elapsed());
            }
        }
    }

    /// Point-in-time snapshot of this pool's connection health.
    pub fn metrics(&self) -> PoolMetrics {
        let mut healthy = 0;
        let mut reconnecting = 0;
        let mut blocking = 0;
        for slot in &self.slots {
            let guard = slot.read();
            match &guard.conn {
                Some(c) if c.state() == ConnectionState::Healthy => {
                    healthy += 1;
                    if c.holds_blocking() {
                        blocking += 1;
                    }
                }
                _ => reconnecting += 1,
            }
        }
        PoolMetrics {
            host: self.host.clone(),
            port: self.port,
            healthy_connections: healthy,
            reconnecting_slots: reconnecting,
            blocking_reserved: blocking,
            total_slots: self.slots.len(),
            last_reconnect_backoff: Duration::from_millis(
                self.last_reconnect_backoff_millis.load(Ordering::Relaxed),
            ),
            avg_ping_rtt: self.ping_rtt.average(),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        for slot in &self.slots {
            if let Some(conn) = slot.read().conn.as_ref() {
                conn.close();
            }
        }
    }

    fn spawn_slot_manager(self: Arc<Self>, idx: usize) {
        tokio::spawn(async move {
            loop {
                if self.closed.load(Ordering::Relaxed) {
                    return;
                }
                let needs_connect = {
                    let guard = self.slots[idx].read();
                    match &guard.conn {
                        Some(c) => c.state() == ConnectionState::Broken || c.state() == ConnectionState::Closed,
                        None => true,
                    }
                };
                if !needs_connect {
                    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
                    continue;
                }

                let attempt = self.slots[idx].read().attempt;
                match Connection::open(
                    &self.host,
                    self.port,
                    self.tls_mode,
                    self.protocol,
                    &self.auth,
                    &self.client_name,
                    self.database_id,
                )
                .await
                {
                    Ok((conn, mut push_rx)) => {
                        info!(host = %self.host, port = self.port, "connection established");
                        let forward = self.push_forward.clone();
                        tokio::spawn(async move {
                            while let Some(frame) = push_rx.recv().await {
                                let _ = forward.send(frame);
                            }
                        });
                        if let Some(hook) = &self.on_connected {
                            hook(conn.clone());
                        }
                        let mut guard = self.slots[idx].write();
                        guard.conn = Some(conn);
                        guard.attempt = 0;
                    }
                    Err(e) => {
                        warn!(host = %self.host, port = self.port, error = %e, attempt, "reconnect failed");
                        let delay = self.backoff.delay_for_attempt(attempt);
                        self.last_reconnect_backoff_millis
                            .store(delay.as_millis() as u64, Ordering::Relaxed);
                        self.slots[idx].write().attempt = attempt.saturating_add(1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_grows_until_capped() {
        let backoff = BackoffStrategy {
            number_of_retries: 2,
            factor: 50,
            exponent_base: 2,
        };
        assert!(backoff.delay_for_attempt(0) < backoff.delay_for_attempt(1));
        assert_eq!(backoff.delay_for_attempt(2), backoff.delay_for_attempt(5));
    }
}
