//! The client facade: ties the pool registry, router, retry engine,
//! topology handle, and pub/sub manager into the single entry point
//! the FFI boundary (and any future in-process caller) drives.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use super::callback::{CallbackId, CallbackRegistry};
use super::metrics::ClientMetrics;
use crate::codec::{encode_command_multi_verb, Value};
use crate::config::{parse_config, Address, ClientConfig, ReadFrom};
use crate::error::{CoreError, Result};
use crate::pool::PoolRegistry;
use crate::pubsub::{dispatcher, PubSubManager, PushMessage, DEFAULT_QUEUE_BOUND};
use crate::retry::{execute_with_retry, RefreshNotifier};
use crate::router::{
    self, is_keyed, metadata, verb_tokens, AggregationPolicy, Destination, RequestType,
    RoutingDirective, SlotGroup, SlotTarget,
};
use crate::topology::{self, NodeRecord, RefreshCoordinator, TopologyHandle, TopologySnapshot};

/// Owns every long-lived resource backing one logical client: the
/// connection pools, the (optional, cluster-mode-only) topology
/// handle, and the pub/sub subscription tracker.
pub struct Client {
    config: ClientConfig,
    pools: Arc<PoolRegistry>,
    topology: Option<Arc<TopologyHandle>>,
    refresh_notifier: RefreshNotifier,
    refresh_coordinator: Arc<RefreshCoordinator>,
    pubsub: Arc<PubSubManager>,
    closed: Arc<AtomicBool>,
    callbacks: CallbackRegistry,
    last_topology_refresh: Mutex<Option<Instant>>,
}

impl Client {
    /// Parses `config_bytes`, opens initial connections (discovering
    /// cluster topology first when `cluster_mode` is set), and blocks
    /// until at least one node is reachable or `connection_timeout`
    /// elapses. `on_push` receives every pub/sub message delivered to
    /// this client, in receipt order.
    pub async fn create(
        config_bytes: &[u8],
        on_push: Arc<dyn Fn(PushMessage) + Send + Sync>,
    ) -> Result<Arc<Self>> {
        let config = parse_config(config_bytes)?;

        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let pubsub = PubSubManager::new(&config.pubsub_subscriptions);
        dispatcher::spawn(push_rx, on_push, DEFAULT_QUEUE_BOUND);

        let pools = Arc::new(
            PoolRegistry::new(config.clone(), push_tx).with_on_connected(pubsub.clone().on_connected_hook()),
        );

        let topology = if config.cluster_mode {
            Some(Arc::new(TopologyHandle::default()))
        } else {
            None
        };

        let client = Arc::new(Client {
            config,
            pools,
            topology,
            refresh_notifier: RefreshNotifier::new(),
            refresh_coordinator: Arc::new(RefreshCoordinator::new()),
            pubsub,
            closed: Arc::new(AtomicBool::new(false)),
            callbacks: CallbackRegistry::new(),
            last_topology_refresh: Mutex::new(None),
        });

        if client.topology.is_some() {
            client.refresh_topology().await?;
        } else {
            let seed = &client.config.addresses[0];
            client.pools.pool_for(&seed.host, seed.port).await;
        }

        client.wait_until_ready().await?;
        client.clone().spawn_background_tasks();

        info!(
            nodes = client.config.addresses.len(),
            mode = if client.config.cluster_mode { "cluster" } else { "standalone" },
            "client bootstrap complete"
        );

        Ok(client)
    }

    /// Dispatches one command, following the command's routing default
    /// (or `directive`, when the caller overrides it), splitting and
    /// recombining multi-slot commands as needed. `args` holds the
    /// command's arguments only, except for `RequestType::CustomCommand`
    /// where `args[0]` carries the literal verb.
    pub async fn command(
        &self,
        request_type: RequestType,
        args: Vec<Vec<u8>>,
        directive: Option<RoutingDirective>,
    ) -> Result<Value> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(CoreError::ClientClosed);
        }

        let meta = metadata(&request_type);
        let keyed = is_keyed(&request_type);
        let keys = router::extract_keys(meta.multi_slot, keyed, &args);

        if self.topology.is_none() {
            let seed = &self.config.addresses[0];
            let (verb, full_args) = build_verb_and_args(&request_type, &args);
            return self
                .dispatch_one(&verb, &full_args, seed.host.clone(), seed.port, meta.idempotent)
                .await;
        }

        let dest = router::resolve(&request_type, &keys, directive, &self.config.read_from)?;

        match dest {
            Destination::Single(target) => {
                let (host, port) = self.resolve_single_address(&target)?;
                let (verb, full_args) = build_verb_and_args(&request_type, &args);
                self.dispatch_one(&verb, &full_args, host, port, meta.idempotent).await
            }
            Destination::Multi(templates, policy) => {
                let template = templates.first().cloned().ok_or_else(|| {
                    CoreError::Protocol("empty multi-target routing destination".into())
                })?;
                let targets = self.fan_out_addresses(&template)?;
                let (verb, full_args) = build_verb_and_args(&request_type, &args);
                let results = futures::future::join_all(targets.into_iter().map(|(host, port)| {
                    self.dispatch_one(&verb, &full_args, host, port, meta.idempotent)
                }))
                .await;
                router::aggregate(policy, results)
            }
            Destination::Split(groups) => {
                self.dispatch_split(
                    &request_type,
                    &args,
                    meta.multi_slot.unwrap(),
                    &groups,
                    meta.aggregation,
                    keys.len(),
                    meta.idempotent,
                )
                .await
            }
        }
    }

    pub fn pubsub(&self) -> &Arc<PubSubManager> {
        &self.pubsub
    }

    /// Returns the current topology snapshot, or `None` in standalone
    /// mode. Used by the cluster scan cursor.
    pub fn topology(&self) -> Option<&Arc<TopologyHandle>> {
        self.topology.as_ref()
    }

    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fails every in-flight and future request with `ClientClosed` and
    /// tears down every pool's connections.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.callbacks.abort_all();
        self.pools.close_all();
    }

    /// Spawns `command` as a background task and invokes `on_complete`
    /// exactly once with its result, matching the FFI boundary's
    /// fire-and-forget calling convention. Returns the id the caller
    /// can use to correlate the eventual callback; cancelled instead of
    /// invoked if `close()` runs first.
    pub fn spawn_command(
        self: &Arc<Self>,
        request_type: RequestType,
        args: Vec<Vec<u8>>,
        directive: Option<RoutingDirective>,
        on_complete: impl FnOnce(Result<Value>) + Send + 'static,
    ) -> CallbackId {
        let id = self.callbacks.reserve();
        let client = self.clone();
        let handle = tokio::spawn(async move {
            let result = client.command(request_type, args, directive).await;
            on_complete(result);
            client.callbacks.complete(id);
        });
        self.callbacks.attach(id, handle.abort_handle());
        id
    }

    async fn dispatch_one(
        &self,
        verb: &[u8],
        args: &[Vec<u8>],
        host: String,
        port: u16,
        idempotent: bool,
    ) -> Result<Value> {
        execute_with_retry(
            &self.pools,
            &self.config,
            &self.refresh_notifier,
            verb,
            args,
            host,
            port,
            idempotent,
        )
        .await
    }

    fn resolve_single_address(&self, target: &crate::router::SingleTarget) -> Result<(String, u16)> {
        if let Some((host, port)) = &target.explicit_address {
            return Ok((host.clone(), *port));
        }
        let snapshot = self.current_snapshot()?;
        if let Some(slot) = target.slot {
            let record = match target.prefer {
                SlotTarget::Primary => snapshot.primary_for_slot(slot),
                SlotTarget::Replica => snapshot
                    .replica_for_slot(slot)
                    .or_else(|| snapshot.primary_for_slot(slot)),
            };
            return record
                .map(|n| n.address())
                .ok_or_else(|| CoreError::ClusterDown(format!("no owner for slot {slot}")));
        }
        snapshot
            .nodes
            .primaries()
            .choose(&mut rand::rng())
            .map(|n| n.address())
            .ok_or_else(|| CoreError::ClusterDown("no primaries in topology".into()))
    }

    fn fan_out_addresses(&self, template: &crate::router::SingleTarget) -> Result<Vec<(String, u16)>> {
        let snapshot = self.current_snapshot()?;
        let nodes: Vec<(String, u16)> = if template.all_nodes {
            snapshot.nodes.all().map(NodeRecord::address).collect()
        } else {
            snapshot.nodes.primaries().map(NodeRecord::address).collect()
        };
        if nodes.is_empty() {
            return Err(CoreError::ClusterDown("no nodes in topology".into()));
        }
        Ok(nodes)
    }

    async fn dispatch_split(
        &self,
        request_type: &RequestType,
        args: &[Vec<u8>],
        pattern: crate::router::MultiSlotPattern,
        groups: &[SlotGroup],
        policy: AggregationPolicy,
        total_keys: usize,
        idempotent: bool,
    ) -> Result<Value> {
        let prefer = if metadata(request_type).read_only {
            match self.config.read_from {
                ReadFrom::Primary => SlotTarget::Primary,
                _ => SlotTarget::Replica,
            }
        } else {
            SlotTarget::Primary
        };

        let tokens = verb_tokens(request_type);
        let verb = tokens.first().copied().unwrap_or(b"").to_vec();
        let prefix: Vec<Vec<u8>> = tokens.iter().skip(1).map(|t| t.to_vec()).collect();

        let snapshot = self.current_snapshot()?;
        let mut dispatches = Vec::with_capacity(groups.len());
        for group in groups {
            let record = match prefer {
                SlotTarget::Primary => snapshot.primary_for_slot(group.slot),
                SlotTarget::Replica => snapshot
                    .replica_for_slot(group.slot)
                    .or_else(|| snapshot.primary_for_slot(group.slot)),
            };
            let (host, port) = record
                .map(NodeRecord::address)
                .ok_or_else(|| CoreError::ClusterDown(format!("no owner for slot {}", group.slot)))?;
            let mut group_args = prefix.clone();
            group_args.extend(router::build_group_args(pattern, args, group));
            dispatches.push(self.dispatch_one(&verb, &group_args, host, port, idempotent));
        }
        let results = futures::future::join_all(dispatches).await;

        if policy == AggregationPolicy::CombineArrays {
            let mut per_group_items = Vec::with_capacity(results.len());
            for r in results {
                match r? {
                    Value::Array(items) | Value::Set(items) => per_group_items.push(items),
                    other => {
                        return Err(CoreError::Protocol(format!(
                            "expected array response from split sub-command, got {other:?}"
                        )))
                    }
                }
            }
            let reassembled = router::reassemble_in_order(groups, &per_group_items, total_keys);
            let values = reassembled.into_iter().map(|v| v.unwrap_or(Value::Nil)).collect();
            Ok(Value::Array(values))
        } else {
            router::aggregate(policy, results)
        }
    }

    fn current_snapshot(&self) -> Result<Arc<TopologySnapshot>> {
        Ok(self
            .topology
            .as_ref()
            .ok_or_else(|| CoreError::Protocol("not in cluster mode".into()))?
            .load())
    }

    async fn refresh_topology(&self) -> Result<()> {
        let Some(handle) = &self.topology else {
            return Ok(());
        };
        let next_generation = handle.load().generation + 1;
        let seeds = self.config.addresses.clone();
        let pools = self.pools.clone();
        let snapshot = self
            .refresh_coordinator
            .run_coalesced(move || discover_topology(pools, seeds, next_generation))
            .await?;

        for node in snapshot.nodes.all() {
            self.pools.pool_for(&node.host, node.port).await;
        }
        let known: HashSet<(String, u16)> =
            snapshot.nodes.all().map(|n| (n.host.clone(), n.port)).collect();
        self.pools.prune(|h, p| known.contains(&(h.to_string(), p)));

        handle.publish(snapshot);
        *self.last_topology_refresh.lock() = Some(Instant::now());
        Ok(())
    }

    /// Diagnostic snapshot of pool and topology health. Reachable only
    /// from in-process Rust callers linking the `rlib` directly; the
    /// FFI surface has no accessor for this.
    pub fn metrics(&self) -> ClientMetrics {
        let pools = self.pools.metrics();
        let topology = self.topology.as_ref().map(|handle| {
            let snapshot = handle.load();
            super::metrics::TopologyMetrics {
                generation: snapshot.generation,
                slot_coverage_percentage: snapshot.slot_map.coverage_percentage(),
                last_refresh: *self.last_topology_refresh.lock(),
            }
        });
        ClientMetrics { pools, topology }
    }

    fn spawn_background_tasks(self: Arc<Self>) {
        if self.topology.is_some() {
            let refresh_listener = self.clone();
            tokio::spawn(async move {
                loop {
                    refresh_listener.refresh_notifier.notified().await;
                    if refresh_listener.closed.load(Ordering::Relaxed) {
                        return;
                    }
                    if let Err(e) = refresh_listener.refresh_topology().await {
                        warn!(error = %e, "coalesced topology refresh failed");
                    }
                }
            });

            let periodic = self.clone();
            let interval = self.config.topology_refresh_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    if periodic.closed.load(Ordering::Relaxed) {
                        return;
                    }
                    if let Err(e) = periodic.refresh_topology().await {
                        warn!(error = %e, "periodic topology refresh failed");
                    }
                }
            });
        }

        let health = self.clone();
        let interval = self.config.health_check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if health.closed.load(Ordering::Relaxed) {
                    return;
                }
                health.pools.health_check_all().await;
            }
        });
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.connection_timeout;
        loop {
            if self.any_pool_healthy() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CoreError::Timeout(self.config.connection_timeout));
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    fn any_pool_healthy(&self) -> bool {
        let addresses: Vec<(String, u16)> = if let Some(topology) = &self.topology {
            topology
                .load()
                .nodes
                .all()
                .map(|n| (n.host.clone(), n.port))
                .collect()
        } else {
            vec![(self.config.addresses[0].host.clone(), self.config.addresses[0].port)]
        };
        addresses.iter().any(|(h, p)| {
            self.pools
                .existing_pool(h, *p)
                .map(|pool| pool.acquire().is_ok())
                .unwrap_or(false)
        })
    }
}

/// Splits a command's wire verb into its leading token (what
/// `execute_with_retry` frames as the command name) and the remaining
/// verb tokens plus arguments, in the order they must be sent.
fn build_verb_and_args(request_type: &RequestType, args: &[Vec<u8>]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let tokens = verb_tokens(request_type);
    if tokens.is_empty() {
        let mut it = args.iter().cloned();
        let verb = it.next().unwrap_or_default();
        (verb, it.collect())
    } else {
        let mut full = Vec::with_capacity(tokens.len() - 1 + args.len());
        full.extend(tokens[1..].iter().map(|t| t.to_vec()));
        full.extend(args.iter().cloned());
        (tokens[0].to_vec(), full)
    }
}

async fn discover_topology(
    pools: Arc<PoolRegistry>,
    seeds: Vec<Address>,
    generation: u64,
) -> Result<TopologySnapshot> {
    let mut last_err = None;
    for seed in &seeds {
        match discover_from_seed(&pools, seed, generation).await {
            Ok(snapshot) => {
                info!(host = %seed.host, port = seed.port, "topology discovered");
                return Ok(snapshot);
            }
            Err(e) => {
                warn!(host = %seed.host, port = seed.port, error = %e, "topology discovery failed against seed, trying next");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| CoreError::ClusterDown("no seed addresses configured".into())))
}

async fn discover_from_seed(
    pools: &PoolRegistry,
    seed: &Address,
    generation: u64,
) -> Result<TopologySnapshot> {
    let conn = pools.acquire(&seed.host, seed.port).await?;

    let shards_frame = encode_command_multi_verb(&[b"CLUSTER", b"SHARDS"], std::iter::empty());
    if let Ok(reply) = conn.send(shards_frame).await {
        if let Ok(snapshot) = topology::parse_cluster_shards(&reply, generation) {
            return Ok(snapshot);
        }
    }

    let slots_frame = encode_command_multi_verb(&[b"CLUSTER", b"SLOTS"], std::iter::empty());
    let reply = conn.send(slots_frame).await?;
    topology::parse_cluster_slots(&reply, generation)
}
