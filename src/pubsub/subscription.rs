//! Desired subscription state: the channels/patterns/shard-channels the
//! client wants every relevant connection subscribed to, rebuilt after
//! every reconnect.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::config::PubSubSubscriptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Exact,
    Pattern,
    Shard,
}

/// Thread-safe desired-state set, mutated by `subscribe`/`unsubscribe`
/// calls and read whenever a connection needs to replay it.
#[derive(Debug, Default)]
pub struct SubscriptionState {
    exact: RwLock<HashSet<Vec<u8>>>,
    pattern: RwLock<HashSet<Vec<u8>>>,
    shard: RwLock<HashSet<Vec<u8>>>,
}

impl SubscriptionState {
    pub fn from_initial(initial: &PubSubSubscriptions) -> Self {
        Self {
            exact: RwLock::new(initial.exact.iter().cloned().collect()),
            pattern: RwLock::new(initial.pattern.iter().cloned().collect()),
            shard: RwLock::new(initial.shard.iter().cloned().collect()),
        }
    }

    pub fn add(&self, kind: SubscriptionKind, channels: impl IntoIterator<Item = Vec<u8>>) {
        let mut set = self.set_for(kind).write();
        set.extend(channels);
    }

    pub fn remove(&self, kind: SubscriptionKind, channels: &[Vec<u8>]) {
        let mut set = self.set_for(kind).write();
        for c in channels {
            set.remove(c);
        }
    }

    pub fn snapshot(&self, kind: SubscriptionKind) -> Vec<Vec<u8>> {
        self.set_for(kind).read().iter().cloned().collect()
    }

    fn set_for(&self, kind: SubscriptionKind) -> &RwLock<HashSet<Vec<u8>>> {
        match kind {
            SubscriptionKind::Exact => &self.exact,
            SubscriptionKind::Pattern => &self.pattern,
            SubscriptionKind::Shard => &self.shard,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.read().is_empty() && self.pattern.read().is_empty() && self.shard.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_snapshot_round_trips() {
        let state = SubscriptionState::default();
        state.add(SubscriptionKind::Exact, [b"news".to_vec()]);
        assert_eq!(state.snapshot(SubscriptionKind::Exact), vec![b"news".to_vec()]);
    }

    #[test]
    fn remove_drops_channel() {
        let state = SubscriptionState::default();
        state.add(SubscriptionKind::Pattern, [b"foo.*".to_vec()]);
        state.remove(SubscriptionKind::Pattern, &[b"foo.*".to_vec()]);
        assert!(state.snapshot(SubscriptionKind::Pattern).is_empty());
    }
}
