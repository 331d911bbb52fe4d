//! Cluster-aware `SCAN` cursor: iterates every primary in slot order,
//! exhausting each node's own cursor before moving to the next, and
//! detects topology changes mid-scan per `allow_non_covered_slots`.

use crate::client::Client;
use crate::codec::Value;
use crate::error::{CoreError, Result};
use crate::router::{RequestType, RoutingDirective};
use crate::topology::{NodeId, TopologySnapshot};
use tracing::{debug, warn};

/// Opaque cursor a caller holds across `scan_next` calls. Cheap to
/// clone; carries no connection state of its own.
#[derive(Debug, Clone)]
pub struct ClusterScanCursor {
    generation: u64,
    node_order: Vec<NodeId>,
    node_index: usize,
    node_cursor: u64,
    finished: bool,
}

impl ClusterScanCursor {
    /// Snapshots the current set of primaries in a stable (sorted)
    /// order and starts scanning from the first one.
    pub fn new(snapshot: &TopologySnapshot) -> Self {
        let mut node_order: Vec<NodeId> = snapshot.nodes.primaries().map(|n| n.id).collect();
        node_order.sort();
        let finished = node_order.is_empty();
        Self {
            generation: snapshot.generation,
            node_order,
            node_index: 0,
            node_cursor: 0,
            finished,
        }
    }

    /// True once every primary's cursor has returned to zero.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Cluster-wide scan options, mirroring `SCAN`'s own `MATCH`/`COUNT`.
#[derive(Debug, Clone, Default)]
pub struct ClusterScanOptions {
    pub pattern: Option<Vec<u8>>,
    pub count: Option<u64>,
}

/// Advances `cursor` by one `SCAN` round-trip against whichever node
/// it currently points at, returning the keys that round yielded
/// (possibly empty — a round with no matches is not the same as
/// being finished; keep calling until `is_finished()`).
///
/// If the cluster's topology has moved on since `cursor` was created,
/// this either starts a fresh node-ordered pass (when
/// `allow_non_covered_slots` is set — results may repeat or skip keys
/// across the topology change) or fails with `CoverageLost`.
pub async fn scan_next(
    client: &Client,
    cursor: &mut ClusterScanCursor,
    options: &ClusterScanOptions,
) -> Result<Vec<Vec<u8>>> {
    loop {
        if cursor.finished {
            return Ok(Vec::new());
        }

        let topology = client
            .topology()
            .ok_or_else(|| CoreError::Protocol("cluster scan requires cluster mode".into()))?;
        let snapshot = topology.load();

        if snapshot.generation != cursor.generation {
            if client.config().allow_non_covered_slots {
                debug!(
                    from = cursor.generation,
                    to = snapshot.generation,
                    "topology moved mid-scan, restarting cursor"
                );
                *cursor = ClusterScanCursor::new(&snapshot);
                continue;
            }
            warn!(
                from = cursor.generation,
                to = snapshot.generation,
                "cluster scan coverage lost"
            );
            return Err(CoreError::CoverageLost(format!(
                "topology changed from generation {} to {} mid-scan",
                cursor.generation, snapshot.generation
            )));
        }

        let node_id = cursor.node_order[cursor.node_index];
        let node = snapshot.node(node_id).ok_or_else(|| {
            CoreError::CoverageLost(format!("node {node_id:?} removed from topology mid-scan"))
        })?;
        let (host, port) = node.address();

        let mut args = vec![cursor.node_cursor.to_string().into_bytes()];
        if let Some(pattern) = &options.pattern {
            args.push(b"MATCH".to_vec());
            args.push(pattern.clone());
        }
        if let Some(count) = options.count {
            args.push(b"COUNT".to_vec());
            args.push(count.to_string().into_bytes());
        }

        let reply = client
            .command(RequestType::Scan, args, Some(RoutingDirective::ByAddress(host, port)))
            .await?;
        let (next_cursor, keys) = parse_scan_reply(&reply)?;

        cursor.node_cursor = next_cursor;
        if next_cursor == 0 {
            cursor.node_index += 1;
            if cursor.node_index >= cursor.node_order.len() {
                cursor.finished = true;
            } else {
                debug!(node_index = cursor.node_index, "cluster scan moved to next primary");
            }
        }

        if !keys.is_empty() || cursor.finished {
            return Ok(keys);
        }
    }
}

fn parse_scan_reply(reply: &Value) -> Result<(u64, Vec<Vec<u8>>)> {
    let items = reply
        .as_array_ref()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| CoreError::Protocol(format!("malformed SCAN reply: {reply:?}")))?;

    let cursor_text = items[0]
        .as_bytes()
        .and_then(|b| std::str::from_utf8(b).ok())
        .ok_or_else(|| CoreError::Protocol("SCAN cursor was not a bulk string".into()))?;
    let next_cursor: u64 = cursor_text
        .parse()
        .map_err(|_| CoreError::Protocol(format!("SCAN cursor not numeric: {cursor_text}")))?;

    let keys = items[1]
        .as_array_ref()
        .ok_or_else(|| CoreError::Protocol("SCAN key list was not an array".into()))?
        .iter()
        .map(|v| {
            v.as_bytes()
                .map(|b| b.to_vec())
                .ok_or_else(|| CoreError::Protocol("SCAN key was not a bulk string".into()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((next_cursor, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{NodeArena, NodeRole, SlotMap};

    fn sample_snapshot(generation: u64) -> TopologySnapshot {
        let mut nodes = NodeArena::new();
        nodes.insert("10.0.0.1".into(), 6379, NodeRole::Primary, None, None);
        nodes.insert("10.0.0.2".into(), 6379, NodeRole::Primary, None, None);
        TopologySnapshot {
            nodes,
            slot_map: SlotMap::empty(),
            generation,
        }
    }

    #[test]
    fn new_cursor_orders_primaries_and_starts_unfinished() {
        let snapshot = sample_snapshot(1);
        let cursor = ClusterScanCursor::new(&snapshot);
        assert_eq!(cursor.node_order.len(), 2);
        assert!(!cursor.is_finished());
    }

    #[test]
    fn empty_topology_starts_finished() {
        let snapshot = TopologySnapshot::empty();
        let cursor = ClusterScanCursor::new(&snapshot);
        assert!(cursor.is_finished());
    }

    #[test]
    fn parses_scan_reply() {
        let reply = Value::Array(vec![
            Value::BulkString(b"42".to_vec()),
            Value::Array(vec![Value::BulkString(b"foo".to_vec())]),
        ]);
        let (cursor, keys) = parse_scan_reply(&reply).unwrap();
        assert_eq!(cursor, 42);
        assert_eq!(keys, vec![b"foo".to_vec()]);
    }

    #[test]
    fn rejects_malformed_reply() {
        let reply = Value::Integer(1);
        assert!(parse_scan_reply(&reply).is_err());
    }
}
