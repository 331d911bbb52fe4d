//! Pub/sub subsystem: tracks desired subscriptions, replays them on
//! reconnect, and dispatches incoming push frames to the caller.

pub mod dispatcher;
pub mod subscription;

pub use dispatcher::{PushKind, PushMessage, DEFAULT_QUEUE_BOUND};
pub use subscription::{SubscriptionKind, SubscriptionState};

use std::sync::Arc;

use crate::codec::encode_command;
use crate::config::PubSubSubscriptions;
use crate::connection::Connection;

/// Owns the client's desired subscription set and knows how to replay
/// it onto a freshly (re)established connection.
pub struct PubSubManager {
    state: Arc<SubscriptionState>,
}

impl PubSubManager {
    pub fn new(initial: &PubSubSubscriptions) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(SubscriptionState::from_initial(initial)),
        })
    }

    pub fn state(&self) -> &Arc<SubscriptionState> {
        &self.state
    }

    pub fn record(&self, kind: SubscriptionKind, channels: Vec<Vec<u8>>) {
        self.state.add(kind, channels);
    }

    pub fn forget(&self, kind: SubscriptionKind, channels: &[Vec<u8>]) {
        self.state.remove(kind, channels);
    }

    /// Returns a hook suitable for `PoolRegistry::with_on_connected`:
    /// every (re)established connection gets the full desired
    /// subscription set replayed onto it.
    pub fn on_connected_hook(self: Arc<Self>) -> Arc<dyn Fn(Connection) + Send + Sync> {
        let manager = self;
        Arc::new(move |conn: Connection| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.resubscribe(&conn).await;
            });
        })
    }

    async fn resubscribe(&self, conn: &Connection) {
        if self.state.is_empty() {
            return;
        }
        for (kind, verb) in [
            (SubscriptionKind::Exact, "SUBSCRIBE"),
            (SubscriptionKind::Pattern, "PSUBSCRIBE"),
            (SubscriptionKind::Shard, "SSUBSCRIBE"),
        ] {
            let channels = self.state.snapshot(kind);
            if channels.is_empty() {
                continue;
            }
            let frame = encode_command(verb.as_bytes(), channels.iter().map(|c| c.as_slice()));
            let _ = conn.send(frame).await;
        }
    }
}
