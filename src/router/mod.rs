//! Command routing: slot hashing, the per-command metadata table, the
//! routing-directive resolver, and response aggregation.

pub mod aggregate;
pub mod command_table;
pub mod hashing;
pub mod route;

pub use aggregate::aggregate;
pub use command_table::{
    is_keyed, metadata, request_type_from_code, verb_tokens, AggregationPolicy, CommandMeta,
    MultiSlotPattern, RequestType, RoutingDefault,
};
pub use hashing::{hash_tag, key_slot};
pub use route::{
    build_group_args, extract_keys, reassemble_in_order, resolve, Destination, RoutingDirective,
    SingleTarget, SlotGroup, SlotTarget,
};
