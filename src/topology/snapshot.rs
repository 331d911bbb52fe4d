//! Immutable topology snapshot and its atomically-swapped handle.

use std::sync::Arc;

use parking_lot::RwLock;

use super::slot_map::{NodeArena, NodeId, SlotMap};

/// `{ slot_map, nodes_by_id, generation }` — generation increases on
/// every successful refresh, letting callers (scan cursors, pending
/// redirects) detect that the world moved under them.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub nodes: NodeArena,
    pub slot_map: SlotMap,
    pub generation: u64,
}

impl TopologySnapshot {
    pub fn empty() -> Self {
        Self {
            nodes: NodeArena::new(),
            slot_map: SlotMap::empty(),
            generation: 0,
        }
    }

    pub fn primary_for_slot(&self, slot: u16) -> Option<&super::slot_map::NodeRecord> {
        self.slot_map.owner(slot).and_then(|id| self.nodes.get(id))
    }

    pub fn replica_for_slot(&self, slot: u16) -> Option<&super::slot_map::NodeRecord> {
        let primary = self.slot_map.owner(slot)?;
        self.nodes.replicas_of(primary).next()
    }

    pub fn node(&self, id: NodeId) -> Option<&super::slot_map::NodeRecord> {
        self.nodes.get(id)
    }
}

/// Readers acquire the lock only to clone the `Arc` — the snapshot
/// itself never mutates, so a routing decision holds its own
/// reference for as long as it needs without blocking a concurrent
/// refresh.
#[derive(Debug)]
pub struct TopologyHandle {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl TopologyHandle {
    pub fn new(initial: TopologySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<TopologySnapshot> {
        self.current.read().clone()
    }

    /// Installs `next` as current, unless a concurrent refresh already
    /// installed an equal-or-newer generation.
    pub fn publish(&self, next: TopologySnapshot) {
        let mut guard = self.current.write();
        if next.generation > guard.generation {
            *guard = Arc::new(next);
        }
    }
}

impl Default for TopologyHandle {
    fn default() -> Self {
        Self::new(TopologySnapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_rejects_stale_generation() {
        let handle = TopologyHandle::new(TopologySnapshot {
            generation: 5,
            ..TopologySnapshot::empty()
        });
        handle.publish(TopologySnapshot {
            generation: 3,
            ..TopologySnapshot::empty()
        });
        assert_eq!(handle.load().generation, 5);
    }

    #[test]
    fn publish_accepts_newer_generation() {
        let handle = TopologyHandle::default();
        handle.publish(TopologySnapshot {
            generation: 1,
            ..TopologySnapshot::empty()
        });
        assert_eq!(handle.load().generation, 1);
    }
}
