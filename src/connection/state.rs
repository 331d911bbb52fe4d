//! Connection state machine.

/// Lifecycle state of one [`super::core::Connection`]. Transitions are
/// one-directional except `Broken -> Connecting`, which only the owning
/// pool drives on reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Healthy,
    Broken,
    Closed,
}

impl ConnectionState {
    pub fn is_usable(self) -> bool {
        matches!(self, ConnectionState::Healthy)
    }
}
