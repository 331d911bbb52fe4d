//! Topology discovery: issues `CLUSTER SHARDS` (preferred) or
//! `CLUSTER SLOTS` (fallback) against a reachable seed and parses the
//! reply into a new [`TopologySnapshot`].

use crate::codec::Value;
use crate::error::{CoreError, Result};

use super::slot_map::{NodeArena, NodeId, NodeRole, SlotMap};
use super::snapshot::TopologySnapshot;

/// Builds a snapshot from a `CLUSTER SHARDS` reply.
///
/// Each shard is `[ "slots", [start1, end1, ...], "nodes", [ {node}, ... ] ]`
/// on RESP2 (flat alternating array) or the RESP3 map-equivalent; this
/// accepts both shapes.
pub fn parse_cluster_shards(reply: &Value, generation: u64) -> Result<TopologySnapshot> {
    let shards = as_array(reply, "CLUSTER SHARDS")?;
    let mut nodes = NodeArena::new();
    let mut slot_map = SlotMap::empty();

    for shard in shards {
        let fields = as_kv_pairs(shard)?;
        let slots = fields
            .get("slots")
            .ok_or_else(|| CoreError::Protocol("CLUSTER SHARDS entry missing slots".into()))?;
        let slot_ranges = flat_integers(slots)?;
        let node_entries = fields
            .get("nodes")
            .and_then(Value::as_array_ref)
            .ok_or_else(|| CoreError::Protocol("CLUSTER SHARDS entry missing nodes".into()))?;

        let mut primary_id: Option<NodeId> = None;
        let mut pending_replicas: Vec<(String, u16, Option<String>)> = Vec::new();

        for node in node_entries {
            let nf = as_kv_pairs(node)?;
            let host = text_field(&nf, "endpoint")
                .or_else(|| text_field(&nf, "ip"))
                .ok_or_else(|| CoreError::Protocol("cluster node missing endpoint/ip".into()))?;
            let port = int_field(&nf, "port")
                .ok_or_else(|| CoreError::Protocol("cluster node missing port".into()))?
                as u16;
            let role = text_field(&nf, "role").unwrap_or_default();
            let az = text_field(&nf, "availability-zone");

            if role.eq_ignore_ascii_case("master") || role.eq_ignore_ascii_case("primary") {
                primary_id = Some(nodes.insert(host, port, NodeRole::Primary, None, az));
            } else {
                pending_replicas.push((host, port, az));
            }
        }

        let primary_id = primary_id
            .ok_or_else(|| CoreError::Protocol("shard has no primary node".into()))?;
        for (host, port, az) in pending_replicas {
            nodes.insert(host, port, NodeRole::Replica, Some(primary_id), az);
        }

        for pair in slot_ranges.chunks(2) {
            if let [start, end] = pair {
                slot_map.assign_range(*start as u16, *end as u16, primary_id);
            }
        }
    }

    Ok(TopologySnapshot {
        nodes,
        slot_map,
        generation,
    })
}

/// Builds a snapshot from the legacy `CLUSTER SLOTS` reply:
/// `[start, end, [master_ip, master_port, node_id, ...], [replica...], ...]`.
pub fn parse_cluster_slots(reply: &Value, generation: u64) -> Result<TopologySnapshot> {
    let ranges = as_array(reply, "CLUSTER SLOTS")?;
    let mut nodes = NodeArena::new();
    let mut slot_map = SlotMap::empty();

    for range in ranges {
        let entries = as_array(range, "CLUSTER SLOTS range")?;
        if entries.len() < 3 {
            return Err(CoreError::Protocol(
                "CLUSTER SLOTS range missing master descriptor".into(),
            ));
        }
        let start = as_integer(&entries[0])?;
        let end = as_integer(&entries[1])?;

        let master = as_array(&entries[2], "CLUSTER SLOTS master")?;
        let host = as_text(&master[0])?;
        let port = as_integer(&master[1])? as u16;
        let primary_id = nodes.insert(host, port, NodeRole::Primary, None, None);

        for replica in &entries[3..] {
            let fields = as_array(replica, "CLUSTER SLOTS replica")?;
            let rhost = as_text(&fields[0])?;
            let rport = as_integer(&fields[1])? as u16;
            nodes.insert(rhost, rport, NodeRole::Replica, Some(primary_id), None);
        }

        slot_map.assign_range(start as u16, end as u16, primary_id);
    }

    Ok(TopologySnapshot {
        nodes,
        slot_map,
        generation,
    })
}

fn as_array<'a>(v: &'a Value, ctx: &str) -> Result<&'a [Value]> {
    v.as_array_ref()
        .ok_or_else(|| CoreError::Protocol(format!("expected array in {ctx} reply")))
}

fn as_integer(v: &Value) -> Result<i64> {
    match v {
        Value::Integer(n) => Ok(*n),
        other => Err(CoreError::Protocol(format!(
            "expected integer in topology reply, got {other:?}"
        ))),
    }
}

fn as_text(v: &Value) -> Result<String> {
    v.as_bytes()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .ok_or_else(|| CoreError::Protocol("expected string in topology reply".into()))
}

fn flat_integers(v: &Value) -> Result<Vec<i64>> {
    as_array(v, "slot range list")?
        .iter()
        .map(as_integer)
        .collect()
}

/// Accepts either a RESP3 `Map` or a RESP2 flat array alternating
/// string keys and values, and returns it as a lookup table.
fn as_kv_pairs(v: &Value) -> Result<std::collections::HashMap<String, Value>> {
    let mut out = std::collections::HashMap::new();
    match v {
        Value::Map(pairs) => {
            for (k, val) in pairs {
                out.insert(as_text(k)?, val.clone());
            }
        }
        Value::Array(items) => {
            let mut it = items.iter();
            while let (Some(k), Some(val)) = (it.next(), it.next()) {
                out.insert(as_text(k)?, val.clone());
            }
        }
        other => {
            return Err(CoreError::Protocol(format!(
                "expected map-like value in topology reply, got {other:?}"
            )))
        }
    }
    Ok(out)
}

fn text_field(fields: &std::collections::HashMap<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(|v| {
        v.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    })
}

fn int_field(fields: &std::collections::HashMap<String, Value>, key: &str) -> Option<i64> {
    fields.get(key).and_then(|v| match v {
        Value::Integer(n) => Some(*n),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn parses_cluster_slots_reply() {
        let reply = Value::Array(vec![Value::Array(vec![
            Value::Integer(0),
            Value::Integer(5460),
            Value::Array(vec![bulk("10.0.0.1"), Value::Integer(6379), bulk("nodeid1")]),
            Value::Array(vec![bulk("10.0.0.2"), Value::Integer(6379), bulk("nodeid2")]),
        ])]);

        let snap = parse_cluster_slots(&reply, 1).unwrap();
        assert_eq!(snap.generation, 1);
        let primary = snap.primary_for_slot(0).unwrap();
        assert_eq!(primary.host, "10.0.0.1");
        assert!(snap.replica_for_slot(0).is_some());
    }

    #[test]
    fn parses_cluster_shards_flat_array_form() {
        let shard = Value::Array(vec![
            bulk("slots"),
            Value::Array(vec![Value::Integer(0), Value::Integer(16383)]),
            bulk("nodes"),
            Value::Array(vec![Value::Array(vec![
                bulk("id"),
                bulk("abc"),
                bulk("port"),
                Value::Integer(6379),
                bulk("endpoint"),
                bulk("10.0.0.1"),
                bulk("role"),
                bulk("master"),
            ])]),
        ]);
        let reply = Value::Array(vec![shard]);
        let snap = parse_cluster_shards(&reply, 2).unwrap();
        assert!(snap.slot_map.is_fully_covered());
        assert_eq!(snap.primary_for_slot(100).unwrap().host, "10.0.0.1");
    }
}
