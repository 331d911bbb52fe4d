// Multi-slot command splitting: keys sharing a hash tag land in the
// same slot group, the command table's MGet pattern drives both
// extraction and per-group argument rebuilding, and the aggregator
// puts results back in the caller's original key order.

use valkey_core::config::ReadFrom;
use valkey_core::router::{
    build_group_args, extract_keys, metadata, reassemble_in_order, resolve, Destination,
    MultiSlotPattern, RequestType,
};

#[test]
fn mget_splits_by_hash_tag_and_reassembles_in_order() {
    // {a}1, {b}1, {a}2 -- the two `{a}` keys must land in the same
    // slot group, `{b}1` in a different one.
    let args: Vec<Vec<u8>> = vec![b"{a}1".to_vec(), b"{b}1".to_vec(), b"{a}2".to_vec()];

    let meta = metadata(&RequestType::MGet);
    let pattern = meta.multi_slot.expect("MGET is a multi-slot command");
    assert_eq!(pattern, MultiSlotPattern::KeysOnly);

    let keys = extract_keys(Some(pattern), meta.routing_default == valkey_core::router::RoutingDefault::Keyed, &args);
    assert_eq!(keys, args);

    let destination = resolve(&RequestType::MGet, &keys, None, &ReadFrom::Primary).unwrap();
    let groups = match destination {
        Destination::Split(groups) => groups,
        other => panic!("expected a split destination, got {other:?}"),
    };

    assert_eq!(groups.len(), 2, "two distinct slots: {{a}} and {{b}}");

    let a_group = groups
        .iter()
        .find(|g| g.original_indices == vec![0, 2])
        .expect("the {a} group should carry both {a}1 and {a}2, in order");
    let b_group = groups
        .iter()
        .find(|g| g.original_indices == vec![1])
        .expect("the {b} group should carry only {b}1");
    assert_ne!(a_group.slot, b_group.slot);

    let a_subcommand = build_group_args(pattern, &args, a_group);
    assert_eq!(a_subcommand, vec![b"{a}1".to_vec(), b"{a}2".to_vec()]);
    let b_subcommand = build_group_args(pattern, &args, b_group);
    assert_eq!(b_subcommand, vec![b"{b}1".to_vec()]);

    // Server A replies to its sub-command, server B to its own.
    let a_reply = vec!["va1".to_string(), "va2".to_string()];
    let b_reply = vec!["vb1".to_string()];
    let per_group_results = if groups[0].original_indices == vec![0, 2] {
        vec![a_reply, b_reply]
    } else {
        vec![b_reply, a_reply]
    };

    let reassembled = reassemble_in_order(&groups, &per_group_results, args.len());
    assert_eq!(
        reassembled,
        vec![
            Some("va1".to_string()),
            Some("vb1".to_string()),
            Some("va2".to_string()),
        ]
    );
}

#[test]
fn single_key_command_resolves_to_one_slot_not_a_split() {
    let args = vec![b"onlykey".to_vec()];
    let destination = resolve(&RequestType::Get, &args, None, &ReadFrom::Primary).unwrap();
    match destination {
        Destination::Single(target) => assert!(target.slot.is_some()),
        other => panic!("GET on one key should resolve to a single target, got {other:?}"),
    }
}

#[test]
fn keys_without_hash_tags_that_still_collide_share_a_group() {
    // Two distinct keys can still land in the same slot group if they
    // happen to hash to the same slot; the group must then carry both
    // indices in original order.
    let args: Vec<Vec<u8>> = vec![b"{same}1".to_vec(), b"{same}2".to_vec(), b"{same}3".to_vec()];
    let destination = resolve(&RequestType::MGet, &args, None, &ReadFrom::Primary).unwrap();
    let groups = match destination {
        Destination::Split(groups) => groups,
        other => panic!("expected a split destination, got {other:?}"),
    };
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].original_indices, vec![0, 1, 2]);
}
