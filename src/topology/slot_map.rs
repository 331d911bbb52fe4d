//! Arena-indexed node table and the 16384-entry slot→node map.
//!
//! The topology is naturally a cyclic graph (a primary's replica set,
//! a replica's primary pointer); representing nodes by id in an arena
//! instead of linking them with `Rc`/`Arc` back-edges sidesteps that
//! entirely, the same trade the teacher's cluster node table makes.

use std::collections::HashMap;

pub const TOTAL_SLOTS: usize = 16384;

/// Arena index into a [`NodeArena`]. Stable for the lifetime of one
/// [`super::snapshot::TopologySnapshot`]; a refresh may reassign ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Primary,
    Replica,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
    /// Set for replicas; `None` for primaries.
    pub replica_of: Option<NodeId>,
    pub availability_zone: Option<String>,
}

impl NodeRecord {
    pub fn address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Owns every node known in one topology snapshot, addressable either
/// by [`NodeId`] or by host:port.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: HashMap<NodeId, NodeRecord>,
    by_address: HashMap<(String, u16), NodeId>,
    next_id: u32,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        host: String,
        port: u16,
        role: NodeRole,
        replica_of: Option<NodeId>,
        availability_zone: Option<String>,
    ) -> NodeId {
        if let Some(&existing) = self.by_address.get(&(host.clone(), port)) {
            return existing;
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.by_address.insert((host.clone(), port), id);
        self.nodes.insert(
            id,
            NodeRecord {
                id,
                host,
                port,
                role,
                replica_of,
                availability_zone,
            },
        );
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn by_address(&self, host: &str, port: u16) -> Option<NodeId> {
        self.by_address.get(&(host.to_string(), port)).copied()
    }

    pub fn primaries(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values().filter(|n| n.role == NodeRole::Primary)
    }

    pub fn all(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    pub fn replicas_of(&self, primary: NodeId) -> impl Iterator<Item = &NodeRecord> {
        self.nodes
            .values()
            .filter(move |n| n.replica_of == Some(primary))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The 16384-entry slot→primary map. Every slot either has exactly one
/// owning primary or is unassigned (during initial discovery, or a
/// transient migration gap); `owner` panics-free returns `None` rather
/// than asserting full coverage, and callers decide whether a gap is
/// fatal (see `CoverageLost`).
#[derive(Debug, Clone)]
pub struct SlotMap {
    owners: Box<[Option<NodeId>; TOTAL_SLOTS]>,
}

impl SlotMap {
    pub fn empty() -> Self {
        Self {
            owners: Box::new([None; TOTAL_SLOTS]),
        }
    }

    pub fn assign_range(&mut self, start: u16, end_inclusive: u16, owner: NodeId) {
        for slot in start..=end_inclusive {
            self.owners[slot as usize] = Some(owner);
        }
    }

    pub fn owner(&self, slot: u16) -> Option<NodeId> {
        self.owners[slot as usize]
    }

    /// Every slot 0..16383 has an assigned primary.
    pub fn is_fully_covered(&self) -> bool {
        self.owners.iter().all(Option::is_some)
    }

    pub fn uncovered_slots(&self) -> impl Iterator<Item = u16> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter_map(|(slot, owner)| owner.is_none().then_some(slot as u16))
    }

    /// Fraction of the 16384 slots with an assigned primary, as a
    /// percentage.
    pub fn coverage_percentage(&self) -> f64 {
        let covered = self.owners.iter().filter(|o| o.is_some()).count();
        (covered as f64 / TOTAL_SLOTS as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_dedupes_by_address() {
        let mut arena = NodeArena::new();
        let a = arena.insert("10.0.0.1".into(), 6379, NodeRole::Primary, None, None);
        let b = arena.insert("10.0.0.1".into(), 6379, NodeRole::Primary, None, None);
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn slot_map_assigns_contiguous_range() {
        let mut map = SlotMap::empty();
        let mut arena = NodeArena::new();
        let node = arena.insert("10.0.0.1".into(), 6379, NodeRole::Primary, None, None);
        map.assign_range(0, 5460, node);
        assert_eq!(map.owner(0), Some(node));
        assert_eq!(map.owner(5460), Some(node));
        assert_eq!(map.owner(5461), None);
        assert!(!map.is_fully_covered());
    }

    #[test]
    fn fully_covered_after_assigning_all_slots() {
        let mut map = SlotMap::empty();
        let mut arena = NodeArena::new();
        let node = arena.insert("10.0.0.1".into(), 6379, NodeRole::Primary, None, None);
        map.assign_range(0, (TOTAL_SLOTS - 1) as u16, node);
        assert!(map.is_fully_covered());
    }
}
