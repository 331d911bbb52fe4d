//! Translates a command request into one or more (node, sub-command)
//! targets, following the caller's routing directive or the command
//! table's default.

use super::command_table::{metadata, AggregationPolicy, MultiSlotPattern, RequestType, RoutingDefault};
use super::hashing::key_slot;
use crate::config::ReadFrom;
use crate::error::{CoreError, Result};
use crate::topology::NodeId;

/// Which server role a single-node read should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTarget {
    Primary,
    Replica,
}

/// Caller-supplied routing directive, overriding the command table's
/// default for unkeyed commands (or forcing a specific target for a
/// keyed one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDirective {
    Random,
    RandomPrimary,
    ByAddress(String, u16),
    SpecificSlot(u16, SlotTarget),
    SpecificKeyedSlot(Vec<u8>, SlotTarget),
    AllNodes,
    AllPrimaries,
}

/// Resolved routing decision for one command (or the command's own
/// multi-slot split plan).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Single(SingleTarget),
    Multi(Vec<SingleTarget>, AggregationPolicy),
    /// Pre-split sub-commands, one per slot group; `key_order` records
    /// where each original key's result belongs in the reassembled
    /// response.
    Split(Vec<SlotGroup>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleTarget {
    pub slot: Option<u16>,
    pub prefer: SlotTarget,
    pub explicit_address: Option<(String, u16)>,
    pub all_nodes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGroup {
    pub slot: u16,
    /// Indices into the original argument list that belong to this group,
    /// in the order the final response must reassemble them.
    pub original_indices: Vec<usize>,
}

/// Computes the routing destination for a command given its keys (if
/// any), an optional caller-supplied directive, and the read-from
/// policy in effect for read-only commands.
pub fn resolve(
    request_type: &RequestType,
    keys: &[Vec<u8>],
    directive: Option<RoutingDirective>,
    read_from: &ReadFrom,
) -> Result<Destination> {
    let meta = metadata(request_type);

    if let Some(directive) = directive {
        return resolve_directive(directive);
    }

    if let Some(pattern) = meta.multi_slot {
        return split_multi_slot(pattern, keys);
    }

    if !keys.is_empty() {
        let prefer = if meta.read_only {
            preferred_replica_target(read_from)
        } else {
            SlotTarget::Primary
        };
        let slot = keys_single_slot(keys)?;
        return Ok(Destination::Single(SingleTarget {
            slot: Some(slot),
            prefer,
            explicit_address: None,
            all_nodes: false,
        }));
    }

    match meta.routing_default {
        RoutingDefault::Keyed => Err(CoreError::CrossSlot(
            "keyed command invoked with no keys".into(),
        )),
        RoutingDefault::Random | RoutingDefault::RandomPrimary => {
            Ok(Destination::Single(SingleTarget {
                slot: None,
                prefer: SlotTarget::Primary,
                explicit_address: None,
                all_nodes: false,
            }))
        }
        RoutingDefault::AllPrimaries => Ok(Destination::Multi(
            vec![SingleTarget {
                slot: None,
                prefer: SlotTarget::Primary,
                explicit_address: None,
                all_nodes: false,
            }],
            meta.aggregation,
        )),
        RoutingDefault::AllNodes => Ok(Destination::Multi(
            vec![SingleTarget {
                slot: None,
                prefer: SlotTarget::Primary,
                explicit_address: None,
                all_nodes: true,
            }],
            meta.aggregation,
        )),
    }
}

fn preferred_replica_target(read_from: &ReadFrom) -> SlotTarget {
    match read_from {
        ReadFrom::Primary => SlotTarget::Primary,
        ReadFrom::PreferReplica | ReadFrom::LowestLatency | ReadFrom::AzAffinity(_) => {
            SlotTarget::Replica
        }
    }
}

fn resolve_directive(directive: RoutingDirective) -> Result<Destination> {
    Ok(match directive {
        RoutingDirective::Random => Destination::Single(SingleTarget {
            slot: None,
            prefer: SlotTarget::Primary,
            explicit_address: None,
            all_nodes: false,
        }),
        RoutingDirective::RandomPrimary => Destination::Single(SingleTarget {
            slot: None,
            prefer: SlotTarget::Primary,
            explicit_address: None,
            all_nodes: false,
        }),
        RoutingDirective::ByAddress(host, port) => Destination::Single(SingleTarget {
            slot: None,
            prefer: SlotTarget::Primary,
            explicit_address: Some((host, port)),
            all_nodes: false,
        }),
        RoutingDirective::SpecificSlot(slot, target) => Destination::Single(SingleTarget {
            slot: Some(slot),
            prefer: target,
            explicit_address: None,
            all_nodes: false,
        }),
        RoutingDirective::SpecificKeyedSlot(key, target) => Destination::Single(SingleTarget {
            slot: Some(key_slot(&key)),
            prefer: target,
            explicit_address: None,
            all_nodes: false,
        }),
        RoutingDirective::AllNodes => Destination::Multi(
            vec![SingleTarget {
                slot: None,
                prefer: SlotTarget::Primary,
                explicit_address: None,
                all_nodes: true,
            }],
            AggregationPolicy::Special,
        ),
        RoutingDirective::AllPrimaries => Destination::Multi(
            vec![SingleTarget {
                slot: None,
                prefer: SlotTarget::Primary,
                explicit_address: None,
                all_nodes: false,
            }],
            AggregationPolicy::Special,
        ),
    })
}

/// Verifies every key maps to the same slot, returning it; fails with
/// `CrossSlot` when a command cannot split and its keys disagree.
fn keys_single_slot(keys: &[Vec<u8>]) -> Result<u16> {
    let mut slots = keys.iter().map(|k| key_slot(k));
    let first = slots.next().expect("keys is non-empty");
    if slots.all(|s| s == first) {
        Ok(first)
    } else {
        Err(CoreError::CrossSlot(format!(
            "command keys span {} distinct slots",
            keys.iter().map(|k| key_slot(k)).collect::<std::collections::HashSet<_>>().len()
        )))
    }
}

/// Groups key-bearing arguments by slot according to the command's
/// declared multi-slot pattern.
fn split_multi_slot(pattern: MultiSlotPattern, keys: &[Vec<u8>]) -> Result<Destination> {
    if keys.is_empty() {
        return Err(CoreError::CrossSlot("multi-slot command with no keys".into()));
    }
    let stride = match pattern {
        MultiSlotPattern::KeysOnly | MultiSlotPattern::KeysAndLastArg => 1,
        MultiSlotPattern::KeyValuePairs => 1,
        MultiSlotPattern::KeyWithTwoArgTriples => 1,
    };
    debug_assert_eq!(stride, 1, "keys slice already holds one entry per logical item");

    let mut groups: std::collections::BTreeMap<u16, Vec<usize>> = std::collections::BTreeMap::new();
    for (idx, key) in keys.iter().enumerate() {
        groups.entry(key_slot(key)).or_default().push(idx);
    }

    let slot_groups = groups
        .into_iter()
        .map(|(slot, original_indices)| SlotGroup {
            slot,
            original_indices,
        })
        .collect();

    Ok(Destination::Split(slot_groups))
}

/// Reassembles per-group array responses back into original key order,
/// used by `CombineArrays` aggregation after a `Split` dispatch.
pub fn reassemble_in_order<T: Clone>(
    groups: &[SlotGroup],
    per_group_results: &[Vec<T>],
    total_len: usize,
) -> Vec<Option<T>> {
    let mut out: Vec<Option<T>> = vec![None; total_len];
    for (group, results) in groups.iter().zip(per_group_results.iter()) {
        for (pos, &original_idx) in group.original_indices.iter().enumerate() {
            if let Some(value) = results.get(pos) {
                out[original_idx] = Some(value.clone());
            }
        }
    }
    out
}

// Placeholder for topology lookups that translate a NodeId back to an
// address; real resolution happens in the client facade where a
// topology snapshot is available.
pub type ResolvedNode = NodeId;

/// Derives the logical "key list" a command's arguments carry, per its
/// declared multi-slot pattern (or the single leading key for an
/// ordinary keyed command).
pub fn extract_keys(pattern: Option<MultiSlotPattern>, is_keyed: bool, args: &[Vec<u8>]) -> Vec<Vec<u8>> {
    match pattern {
        None => {
            if is_keyed {
                args.first().cloned().into_iter().collect()
            } else {
                Vec::new()
            }
        }
        Some(MultiSlotPattern::KeysOnly) => args.to_vec(),
        Some(MultiSlotPattern::KeyValuePairs) => args.iter().step_by(2).cloned().collect(),
        Some(MultiSlotPattern::KeysAndLastArg) => {
            if args.is_empty() {
                Vec::new()
            } else {
                args[..args.len() - 1].to_vec()
            }
        }
        Some(MultiSlotPattern::KeyWithTwoArgTriples) => args.iter().step_by(3).cloned().collect(),
    }
}

/// Rebuilds the argument list for one slot group's sub-command, given
/// the pattern that determined how keys were extracted in the first
/// place.
pub fn build_group_args(pattern: MultiSlotPattern, args: &[Vec<u8>], group: &SlotGroup) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    match pattern {
        MultiSlotPattern::KeysOnly => {
            for &ki in &group.original_indices {
                out.push(args[ki].clone());
            }
        }
        MultiSlotPattern::KeyValuePairs => {
            for &ki in &group.original_indices {
                out.push(args[ki * 2].clone());
                out.push(args[ki * 2 + 1].clone());
            }
        }
        MultiSlotPattern::KeysAndLastArg => {
            for &ki in &group.original_indices {
                out.push(args[ki].clone());
            }
            if let Some(last) = args.last() {
                out.push(last.clone());
            }
        }
        MultiSlotPattern::KeyWithTwoArgTriples => {
            for &ki in &group.original_indices {
                out.push(args[ki * 3].clone());
                out.push(args[ki * 3 + 1].clone());
                out.push(args[ki * 3 + 2].clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn get_routes_to_single_slot() {
        let dest = resolve(&RequestType::Get, &[k("foo")], None, &ReadFrom::Primary).unwrap();
        match dest {
            Destination::Single(t) => assert!(t.slot.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cross_slot_keys_on_non_splittable_command_fails() {
        let err = resolve(&RequestType::Rename, &[k("{a}1"), k("{b}1")], None, &ReadFrom::Primary);
        assert!(matches!(err, Err(CoreError::CrossSlot(_))));
    }

    #[test]
    fn mget_splits_by_slot_and_preserves_order() {
        // {a}1 and {a}2 share a slot, {b}1 is different.
        let keys = vec![k("{a}1"), k("{b}1"), k("{a}2")];
        let dest = resolve(&RequestType::MGet, &keys, None, &ReadFrom::Primary).unwrap();
        let Destination::Split(groups) = dest else {
            panic!("expected split");
        };
        assert_eq!(groups.len(), 2);
        let total: usize = groups.iter().map(|g| g.original_indices.len()).sum();
        assert_eq!(total, 3);

        let per_group_results: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.original_indices.iter().map(|&i| if i == 0 { "va1" } else if i == 1 { "vb1" } else { "va2" }).collect())
            .collect();
        let reassembled = reassemble_in_order(&groups, &per_group_results, 3);
        assert_eq!(
            reassembled,
            vec![Some("va1"), Some("vb1"), Some("va2")]
        );
    }

    #[test]
    fn preferred_replica_target_respects_read_from() {
        assert_eq!(preferred_replica_target(&ReadFrom::Primary), SlotTarget::Primary);
        assert_eq!(preferred_replica_target(&ReadFrom::PreferReplica), SlotTarget::Replica);
    }

    #[test]
    fn extract_keys_handles_key_value_pairs() {
        let args = vec![k("k1"), k("v1"), k("k2"), k("v2")];
        let keys = extract_keys(Some(MultiSlotPattern::KeyValuePairs), false, &args);
        assert_eq!(keys, vec![k("k1"), k("k2")]);
    }

    #[test]
    fn build_group_args_rebuilds_key_value_pairs() {
        let args = vec![k("k1"), k("v1"), k("k2"), k("v2")];
        let group = SlotGroup {
            slot: 0,
            original_indices: vec![1],
        };
        let rebuilt = build_group_args(MultiSlotPattern::KeyValuePairs, &args, &group);
        assert_eq!(rebuilt, vec![k("k2"), k("v2")]);
    }

    #[test]
    fn specific_keyed_slot_directive_hashes_key() {
        let dest = resolve(
            &RequestType::Get,
            &[],
            Some(RoutingDirective::SpecificKeyedSlot(k("foo"), SlotTarget::Replica)),
            &ReadFrom::Primary,
        )
        .unwrap();
        match dest {
            Destination::Single(t) => {
                assert_eq!(t.slot, Some(key_slot(b"foo")));
                assert_eq!(t.prefer, SlotTarget::Replica);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
