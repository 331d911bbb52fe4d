//! Static command metadata: routing default, idempotency, aggregation
//! policy and multi-slot split pattern, keyed by request kind — a data
//! table, not per-command code paths.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Closed enum of the command surface, plus an escape hatch for
/// anything the table doesn't enumerate by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestType {
    Get,
    Set,
    SetEx,
    GetSet,
    GetDel,
    MGet,
    MSet,
    MSetNx,
    Append,
    StrLen,
    Incr,
    IncrBy,
    Decr,
    DecrBy,
    Del,
    Unlink,
    Exists,
    Expire,
    Pexpire,
    Ttl,
    Pttl,
    Persist,
    Type,
    Rename,
    RenameNx,
    Copy,
    Touch,
    Dump,
    Restore,
    HGet,
    HSet,
    HSetNx,
    HDel,
    HGetAll,
    HMGet,
    HIncrBy,
    HExists,
    HKeys,
    HVals,
    HLen,
    LPush,
    RPush,
    LPop,
    RPop,
    LRange,
    LLen,
    LRem,
    LIndex,
    LSet,
    LInsert,
    BLPop,
    BRPop,
    SAdd,
    SRem,
    SMembers,
    SIsMember,
    SCard,
    SInter,
    SUnion,
    SDiff,
    SInterStore,
    ZAdd,
    ZRem,
    ZRange,
    ZRangeByScore,
    ZScore,
    ZCard,
    ZIncrBy,
    ZRank,
    XAdd,
    XRead,
    XReadBlock,
    XLen,
    XRange,
    Keys,
    Scan,
    RandomKey,
    DbSize,
    FlushDb,
    FlushAll,
    Select,
    SwapDb,
    Ping,
    Echo,
    Auth,
    Hello,
    ClientSetName,
    ClientGetName,
    ClientId,
    ClientNoEvict,
    Subscribe,
    Unsubscribe,
    PSubscribe,
    PUnsubscribe,
    SSubscribe,
    SUnsubscribe,
    Publish,
    SPublish,
    Asking,
    ReadOnly,
    ReadWrite,
    ClusterSlots,
    ClusterShards,
    ClusterNodes,
    ClusterInfo,
    ClusterKeySlot,
    ClusterCountKeysInSlot,
    ClusterGetKeysInSlot,
    Multi,
    Exec,
    Discard,
    Watch,
    Unwatch,
    Eval,
    EvalSha,
    Script,
    Info,
    ConfigGet,
    ConfigSet,
    Lolwut,
    JsonMGet,
    JsonMSet,
    /// Any command not named in this table; `verb` carries the literal
    /// RESP command tokens (e.g. `["CLUSTER", "SLOTS"]` would instead be
    /// modeled by its own variant above — this is for genuinely
    /// user-supplied custom commands).
    CustomCommand,
}

/// Single-node routing a command resolves to when the caller doesn't
/// supply an explicit routing directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDefault {
    /// Computed from the command's key argument(s).
    Keyed,
    /// No key; any node will do.
    Random,
    /// No key, but must land on a primary (write-shaped unkeyed command).
    RandomPrimary,
    /// Unkeyed, must fan out to every primary.
    AllPrimaries,
    /// Unkeyed, must fan out to every node.
    AllNodes,
}

/// How a multi-key command's arguments are grouped and re-split across
/// slots, per §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiSlotPattern {
    /// `MGET k1 k2 k3` — one sub-command per slot group, responses
    /// concatenated in original key order.
    KeysOnly,
    /// `MSET k1 v1 k2 v2` — group pairs by slot, combine into one OK.
    KeyValuePairs,
    /// `JSON.MGET k1 k2 path` — like KeysOnly, each sub-command appends
    /// the shared trailing argument.
    KeysAndLastArg,
    /// `JSON.MSET k1 p1 v1 k2 p2 v2` — group triples by slot.
    KeyWithTwoArgTriples,
}

/// How sub-responses from a multi-node fan-out combine into one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    OneSucceeded,
    FirstSucceededNonEmptyOrAllEmpty,
    AllSucceeded,
    CombineArrays,
    CombineMaps,
    AggregateLogicalAnd,
    AggregateMin,
    AggregateSum,
    Special,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandMeta {
    pub routing_default: RoutingDefault,
    pub idempotent: bool,
    pub aggregation: AggregationPolicy,
    pub multi_slot: Option<MultiSlotPattern>,
    pub read_only: bool,
}

const fn keyed(idempotent: bool, read_only: bool) -> CommandMeta {
    CommandMeta {
        routing_default: RoutingDefault::Keyed,
        idempotent,
        aggregation: AggregationPolicy::Special,
        multi_slot: None,
        read_only,
    }
}

const fn multi_slot(pattern: MultiSlotPattern, aggregation: AggregationPolicy, read_only: bool) -> CommandMeta {
    CommandMeta {
        routing_default: RoutingDefault::Keyed,
        idempotent: true,
        aggregation,
        multi_slot: Some(pattern),
        read_only,
    }
}

const fn unkeyed(routing_default: RoutingDefault, idempotent: bool, aggregation: AggregationPolicy, read_only: bool) -> CommandMeta {
    CommandMeta {
        routing_default,
        idempotent,
        aggregation,
        multi_slot: None,
        read_only,
    }
}

static TABLE: Lazy<HashMap<RequestType, CommandMeta>> = Lazy::new(|| {
    use AggregationPolicy::*;
    use MultiSlotPattern::*;
    use RequestType::*;
    use RoutingDefault::*;

    let mut m = HashMap::new();
    // Strings
    m.insert(Get, keyed(true, true));
    m.insert(Set, keyed(false, false));
    m.insert(SetEx, keyed(false, false));
    m.insert(GetSet, keyed(false, false));
    m.insert(GetDel, keyed(false, false));
    m.insert(MGet, multi_slot(KeysOnly, CombineArrays, true));
    m.insert(MSet, multi_slot(KeyValuePairs, AllSucceeded, false));
    m.insert(MSetNx, multi_slot(KeyValuePairs, AggregateLogicalAnd, false));
    m.insert(Append, keyed(false, false));
    m.insert(StrLen, keyed(true, true));
    m.insert(Incr, keyed(false, false));
    m.insert(IncrBy, keyed(false, false));
    m.insert(Decr, keyed(false, false));
    m.insert(DecrBy, keyed(false, false));
    // Generic
    m.insert(Del, multi_slot(KeysOnly, AggregateSum, false));
    m.insert(Unlink, multi_slot(KeysOnly, AggregateSum, false));
    m.insert(Exists, multi_slot(KeysOnly, AggregateSum, true));
    m.insert(Expire, keyed(false, false));
    m.insert(Pexpire, keyed(false, false));
    m.insert(Ttl, keyed(true, true));
    m.insert(Pttl, keyed(true, true));
    m.insert(Persist, keyed(false, false));
    m.insert(Type, keyed(true, true));
    m.insert(Rename, keyed(false, false));
    m.insert(RenameNx, keyed(false, false));
    m.insert(Copy, keyed(false, false));
    m.insert(Touch, multi_slot(KeysOnly, AggregateSum, true));
    m.insert(Dump, keyed(true, true));
    m.insert(Restore, keyed(false, false));
    // Hashes
    m.insert(HGet, keyed(true, true));
    m.insert(HSet, keyed(false, false));
    m.insert(HSetNx, keyed(false, false));
    m.insert(HDel, keyed(false, false));
    m.insert(HGetAll, keyed(true, true));
    m.insert(HMGet, keyed(true, true));
    m.insert(HIncrBy, keyed(false, false));
    m.insert(HExists, keyed(true, true));
    m.insert(HKeys, keyed(true, true));
    m.insert(HVals, keyed(true, true));
    m.insert(HLen, keyed(true, true));
    // Lists
    m.insert(LPush, keyed(false, false));
    m.insert(RPush, keyed(false, false));
    m.insert(LPop, keyed(false, false));
    m.insert(RPop, keyed(false, false));
    m.insert(LRange, keyed(true, true));
    m.insert(LLen, keyed(true, true));
    m.insert(LRem, keyed(false, false));
    m.insert(LIndex, keyed(true, true));
    m.insert(LSet, keyed(false, false));
    m.insert(LInsert, keyed(false, false));
    m.insert(BLPop, keyed(false, false));
    m.insert(BRPop, keyed(false, false));
    // Sets
    m.insert(SAdd, keyed(false, false));
    m.insert(SRem, keyed(false, false));
    m.insert(SMembers, keyed(true, true));
    m.insert(SIsMember, keyed(true, true));
    m.insert(SCard, keyed(true, true));
    m.insert(SInter, keyed(true, true));
    m.insert(SUnion, keyed(true, true));
    m.insert(SDiff, keyed(true, true));
    m.insert(SInterStore, keyed(false, false));
    // Sorted sets
    m.insert(ZAdd, keyed(false, false));
    m.insert(ZRem, keyed(false, false));
    m.insert(ZRange, keyed(true, true));
    m.insert(ZRangeByScore, keyed(true, true));
    m.insert(ZScore, keyed(true, true));
    m.insert(ZCard, keyed(true, true));
    m.insert(ZIncrBy, keyed(false, false));
    m.insert(ZRank, keyed(true, true));
    // Streams
    m.insert(XAdd, keyed(false, false));
    m.insert(XRead, keyed(true, true));
    m.insert(XReadBlock, keyed(false, true));
    m.insert(XLen, keyed(true, true));
    m.insert(XRange, keyed(true, true));
    // Keyspace-wide / unkeyed
    m.insert(Keys, unkeyed(AllPrimaries, true, Special, true));
    m.insert(Scan, unkeyed(AllPrimaries, true, Special, true));
    m.insert(RandomKey, unkeyed(Random, true, OneSucceeded, true));
    m.insert(DbSize, unkeyed(AllPrimaries, true, AggregateSum, true));
    m.insert(FlushDb, unkeyed(AllPrimaries, false, AllSucceeded, false));
    m.insert(FlushAll, unkeyed(AllPrimaries, false, AllSucceeded, false));
    m.insert(Select, unkeyed(Random, false, AllSucceeded, false));
    m.insert(SwapDb, unkeyed(AllPrimaries, false, AllSucceeded, false));
    // Connection / server
    m.insert(Ping, unkeyed(Random, true, OneSucceeded, true));
    m.insert(Echo, unkeyed(Random, true, OneSucceeded, true));
    m.insert(Auth, unkeyed(Random, false, AllSucceeded, false));
    m.insert(Hello, unkeyed(Random, false, AllSucceeded, false));
    m.insert(ClientSetName, unkeyed(AllNodes, false, AllSucceeded, false));
    m.insert(ClientGetName, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClientId, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClientNoEvict, unkeyed(AllNodes, false, AllSucceeded, false));
    m.insert(Info, unkeyed(AllNodes, true, Special, true));
    m.insert(ConfigGet, unkeyed(AllNodes, true, Special, true));
    m.insert(ConfigSet, unkeyed(AllNodes, false, AllSucceeded, false));
    m.insert(Lolwut, unkeyed(Random, true, OneSucceeded, true));
    // Pub/sub
    m.insert(Subscribe, unkeyed(Random, false, Special, false));
    m.insert(Unsubscribe, unkeyed(Random, false, Special, false));
    m.insert(PSubscribe, unkeyed(AllNodes, false, Special, false));
    m.insert(PUnsubscribe, unkeyed(AllNodes, false, Special, false));
    m.insert(SSubscribe, keyed(false, false));
    m.insert(SUnsubscribe, keyed(false, false));
    m.insert(Publish, unkeyed(AllNodes, true, AggregateSum, false));
    m.insert(SPublish, keyed(true, false));
    // Cluster internals
    m.insert(Asking, unkeyed(Random, false, AllSucceeded, false));
    m.insert(ReadOnly, unkeyed(Random, false, AllSucceeded, false));
    m.insert(ReadWrite, unkeyed(Random, false, AllSucceeded, false));
    m.insert(ClusterSlots, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClusterShards, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClusterNodes, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClusterInfo, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClusterKeySlot, keyed(true, true));
    m.insert(ClusterCountKeysInSlot, unkeyed(Random, true, OneSucceeded, true));
    m.insert(ClusterGetKeysInSlot, unkeyed(Random, true, OneSucceeded, true));
    // Transactions / scripting
    m.insert(Multi, unkeyed(Random, false, AllSucceeded, false));
    m.insert(Exec, unkeyed(Random, false, AllSucceeded, false));
    m.insert(Discard, unkeyed(Random, false, AllSucceeded, false));
    m.insert(Watch, keyed(false, false));
    m.insert(Unwatch, unkeyed(Random, false, AllSucceeded, false));
    m.insert(Eval, keyed(false, false));
    m.insert(EvalSha, keyed(false, false));
    m.insert(Script, unkeyed(AllPrimaries, false, AllSucceeded, false));
    // Multi-key JSON (module-style) examples of the remaining patterns
    m.insert(JsonMGet, multi_slot(KeysAndLastArg, CombineArrays, true));
    m.insert(JsonMSet, multi_slot(KeyWithTwoArgTriples, AllSucceeded, false));
    m
});

/// Default metadata applied to `CustomCommand` and any variant this
/// table does not list (defensive default: must be routed explicitly
/// and is never retried automatically).
const CUSTOM_DEFAULT: CommandMeta = CommandMeta {
    routing_default: RoutingDefault::Random,
    idempotent: false,
    aggregation: AggregationPolicy::Special,
    multi_slot: None,
    read_only: false,
};

/// Looks up a command's routing/aggregation/idempotency metadata.
pub fn metadata(request_type: &RequestType) -> CommandMeta {
    TABLE.get(request_type).copied().unwrap_or(CUSTOM_DEFAULT)
}

/// True when the command routes from its key argument(s) (covers both
/// plain keyed commands and multi-slot ones, which are keyed too).
pub fn is_keyed(request_type: &RequestType) -> bool {
    matches!(metadata(request_type).routing_default, RoutingDefault::Keyed)
}

/// The wire command name(s) for every non-`CustomCommand` variant, as
/// the leading bulk strings of the encoded frame (most are one token;
/// a handful like `CLUSTER SHARDS` are two).
pub fn verb_tokens(request_type: &RequestType) -> &'static [&'static [u8]] {
    use RequestType::*;
    match request_type {
        Get => &[b"GET"],
        Set => &[b"SET"],
        SetEx => &[b"SETEX"],
        GetSet => &[b"GETSET"],
        GetDel => &[b"GETDEL"],
        MGet => &[b"MGET"],
        MSet => &[b"MSET"],
        MSetNx => &[b"MSETNX"],
        Append => &[b"APPEND"],
        StrLen => &[b"STRLEN"],
        Incr => &[b"INCR"],
        IncrBy => &[b"INCRBY"],
        Decr => &[b"DECR"],
        DecrBy => &[b"DECRBY"],
        Del => &[b"DEL"],
        Unlink => &[b"UNLINK"],
        Exists => &[b"EXISTS"],
        Expire => &[b"EXPIRE"],
        Pexpire => &[b"PEXPIRE"],
        Ttl => &[b"TTL"],
        Pttl => &[b"PTTL"],
        Persist => &[b"PERSIST"],
        Type => &[b"TYPE"],
        Rename => &[b"RENAME"],
        RenameNx => &[b"RENAMENX"],
        Copy => &[b"COPY"],
        Touch => &[b"TOUCH"],
        Dump => &[b"DUMP"],
        Restore => &[b"RESTORE"],
        HGet => &[b"HGET"],
        HSet => &[b"HSET"],
        HSetNx => &[b"HSETNX"],
        HDel => &[b"HDEL"],
        HGetAll => &[b"HGETALL"],
        HMGet => &[b"HMGET"],
        HIncrBy => &[b"HINCRBY"],
        HExists => &[b"HEXISTS"],
        HKeys => &[b"HKEYS"],
        HVals => &[b"HVALS"],
        HLen => &[b"HLEN"],
        LPush => &[b"LPUSH"],
        RPush => &[b"RPUSH"],
        LPop => &[b"LPOP"],
        RPop => &[b"RPOP"],
        LRange => &[b"LRANGE"],
        LLen => &[b"LLEN"],
        LRem => &[b"LREM"],
        LIndex => &[b"LINDEX"],
        LSet => &[b"LSET"],
        LInsert => &[b"LINSERT"],
        BLPop => &[b"BLPOP"],
        BRPop => &[b"BRPOP"],
        SAdd => &[b"SADD"],
        SRem => &[b"SREM"],
        SMembers => &[b"SMEMBERS"],
        SIsMember => &[b"SISMEMBER"],
        SCard => &[b"SCARD"],
        SInter => &[b"SINTER"],
        SUnion => &[b"SUNION"],
        SDiff => &[b"SDIFF"],
        SInterStore => &[b"SINTERSTORE"],
        ZAdd => &[b"ZADD"],
        ZRem => &[b"ZREM"],
        ZRange => &[b"ZRANGE"],
        ZRangeByScore => &[b"ZRANGEBYSCORE"],
        ZScore => &[b"ZSCORE"],
        ZCard => &[b"ZCARD"],
        ZIncrBy => &[b"ZINCRBY"],
        ZRank => &[b"ZRANK"],
        XAdd => &[b"XADD"],
        XRead => &[b"XREAD"],
        XReadBlock => &[b"XREAD"],
        XLen => &[b"XLEN"],
        XRange => &[b"XRANGE"],
        Keys => &[b"KEYS"],
        Scan => &[b"SCAN"],
        RandomKey => &[b"RANDOMKEY"],
        DbSize => &[b"DBSIZE"],
        FlushDb => &[b"FLUSHDB"],
        FlushAll => &[b"FLUSHALL"],
        Select => &[b"SELECT"],
        SwapDb => &[b"SWAPDB"],
        Ping => &[b"PING"],
        Echo => &[b"ECHO"],
        Auth => &[b"AUTH"],
        Hello => &[b"HELLO"],
        ClientSetName => &[b"CLIENT", b"SETNAME"],
        ClientGetName => &[b"CLIENT", b"GETNAME"],
        ClientId => &[b"CLIENT", b"ID"],
        ClientNoEvict => &[b"CLIENT", b"NO-EVICT"],
        Subscribe => &[b"SUBSCRIBE"],
        Unsubscribe => &[b"UNSUBSCRIBE"],
        PSubscribe => &[b"PSUBSCRIBE"],
        PUnsubscribe => &[b"PUNSUBSCRIBE"],
        SSubscribe => &[b"SSUBSCRIBE"],
        SUnsubscribe => &[b"SUNSUBSCRIBE"],
        Publish => &[b"PUBLISH"],
        SPublish => &[b"SPUBLISH"],
        Asking => &[b"ASKING"],
        ReadOnly => &[b"READONLY"],
        ReadWrite => &[b"READWRITE"],
        ClusterSlots => &[b"CLUSTER", b"SLOTS"],
        ClusterShards => &[b"CLUSTER", b"SHARDS"],
        ClusterNodes => &[b"CLUSTER", b"NODES"],
        ClusterInfo => &[b"CLUSTER", b"INFO"],
        ClusterKeySlot => &[b"CLUSTER", b"KEYSLOT"],
        ClusterCountKeysInSlot => &[b"CLUSTER", b"COUNTKEYSINSLOT"],
        ClusterGetKeysInSlot => &[b"CLUSTER", b"GETKEYSINSLOT"],
        Multi => &[b"MULTI"],
        Exec => &[b"EXEC"],
        Discard => &[b"DISCARD"],
        Watch => &[b"WATCH"],
        Unwatch => &[b"UNWATCH"],
        Eval => &[b"EVAL"],
        EvalSha => &[b"EVALSHA"],
        Script => &[b"SCRIPT"],
        Info => &[b"INFO"],
        ConfigGet => &[b"CONFIG", b"GET"],
        ConfigSet => &[b"CONFIG", b"SET"],
        Lolwut => &[b"LOLWUT"],
        JsonMGet => &[b"JSON.MGET"],
        JsonMSet => &[b"JSON.MSET"],
        CustomCommand => &[],
    }
}

/// Maps the FFI boundary's integer `request_type` code to a
/// [`RequestType`], in the enum's declaration order. The embedder and
/// the core must agree on this order; it is part of the ABI.
pub fn request_type_from_code(code: u32) -> Option<RequestType> {
    use RequestType::*;
    const TABLE: &[RequestType] = &[
        Get, Set, SetEx, GetSet, GetDel, MGet, MSet, MSetNx, Append, StrLen, Incr, IncrBy, Decr,
        DecrBy, Del, Unlink, Exists, Expire, Pexpire, Ttl, Pttl, Persist, Type, Rename, RenameNx,
        Copy, Touch, Dump, Restore, HGet, HSet, HSetNx, HDel, HGetAll, HMGet, HIncrBy, HExists,
        HKeys, HVals, HLen, LPush, RPush, LPop, RPop, LRange, LLen, LRem, LIndex, LSet, LInsert,
        BLPop, BRPop, SAdd, SRem, SMembers, SIsMember, SCard, SInter, SUnion, SDiff, SInterStore,
        ZAdd, ZRem, ZRange, ZRangeByScore, ZScore, ZCard, ZIncrBy, ZRank, XAdd, XRead, XReadBlock,
        XLen, XRange, Keys, Scan, RandomKey, DbSize, FlushDb, FlushAll, Select, SwapDb, Ping,
        Echo, Auth, Hello, ClientSetName, ClientGetName, ClientId, ClientNoEvict, Subscribe,
        Unsubscribe, PSubscribe, PUnsubscribe, SSubscribe, SUnsubscribe, Publish, SPublish,
        Asking, ReadOnly, ReadWrite, ClusterSlots, ClusterShards, ClusterNodes, ClusterInfo,
        ClusterKeySlot, ClusterCountKeysInSlot, ClusterGetKeysInSlot, Multi, Exec, Discard, Watch,
        Unwatch, Eval, EvalSha, Script, Info, ConfigGet, ConfigSet, Lolwut, JsonMGet, JsonMSet,
        CustomCommand,
    ];
    TABLE.get(code as usize).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mget_is_keys_only_combine_arrays() {
        let meta = metadata(&RequestType::MGet);
        assert_eq!(meta.multi_slot, Some(MultiSlotPattern::KeysOnly));
        assert_eq!(meta.aggregation, AggregationPolicy::CombineArrays);
        assert!(meta.idempotent);
    }

    #[test]
    fn mset_requires_all_succeeded() {
        let meta = metadata(&RequestType::MSet);
        assert_eq!(meta.multi_slot, Some(MultiSlotPattern::KeyValuePairs));
        assert_eq!(meta.aggregation, AggregationPolicy::AllSucceeded);
    }

    #[test]
    fn custom_command_defaults_to_non_idempotent() {
        let meta = metadata(&RequestType::CustomCommand);
        assert!(!meta.idempotent);
    }

    #[test]
    fn every_read_command_marked_read_only() {
        assert!(metadata(&RequestType::Get).read_only);
        assert!(!metadata(&RequestType::Set).read_only);
    }

    #[test]
    fn request_type_from_code_matches_declaration_order() {
        assert_eq!(request_type_from_code(0), Some(RequestType::Get));
        assert_eq!(request_type_from_code(1), Some(RequestType::Set));
        assert_eq!(request_type_from_code(122), Some(RequestType::CustomCommand));
        assert_eq!(request_type_from_code(123), None);
    }
}
