//! Client configuration: the binary wire record deserialized inside
//! `create_client`, and the typed configuration it expands into.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One seed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

/// TLS negotiation mode for every connection the client opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum TlsMode {
    NoTls,
    SecureTls,
    InsecureTls,
}

/// Wire protocol version preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum ProtocolVersion {
    Resp2,
    Resp3,
}

/// Read-from policy for read-only commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum ReadFrom {
    Primary,
    PreferReplica,
    LowestLatency,
    AzAffinity(String),
}

impl Default for ReadFrom {
    fn default() -> Self {
        ReadFrom::Primary
    }
}

/// Credentials used for `AUTH`/`HELLO`.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: String,
}

/// Reconnect/retry backoff schedule: the i-th reconnect waits
/// `factor * exponent_base^min(i, number_of_retries)` milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct BackoffStrategy {
    pub number_of_retries: u32,
    pub factor: u64,
    pub exponent_base: u32,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            number_of_retries: 5,
            factor: 100,
            exponent_base: 2,
        }
    }
}

impl BackoffStrategy {
    /// Delay before the i-th (0-indexed) reconnect attempt. Capped at
    /// `number_of_retries` so the schedule never grows unbounded even
    /// after the pool gives up surrendering the node.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.number_of_retries);
        let base = self.exponent_base.max(1) as u64;
        let multiplier = base.saturating_pow(exponent);
        Duration::from_millis(self.factor.saturating_mul(multiplier))
    }
}

/// Initial pub/sub subscriptions, reapplied on every reconnect.
#[derive(Debug, Clone, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct PubSubSubscriptions {
    pub exact: Vec<Vec<u8>>,
    pub pattern: Vec<Vec<u8>>,
    pub shard: Vec<Vec<u8>>,
}

/// The binary configuration record accepted by `create_client`,
/// deserialized with `bincode` exactly as described in the external
/// interfaces section.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ClientConfigWire {
    pub addresses: Vec<Address>,
    pub cluster_mode: bool,
    pub tls_mode: TlsMode,
    pub auth: Option<AuthConfig>,
    pub database_id: u32,
    pub protocol: ProtocolVersion,
    pub client_name: Option<String>,
    pub request_timeout_ms: u32,
    pub connection_timeout_ms: u32,
    pub read_from: ReadFrom,
    pub retry: BackoffStrategy,
    pub pubsub_subscriptions: Option<PubSubSubscriptions>,
    pub connections_per_node: Option<u32>,
    /// Idle-connection ping interval; `None` uses the 30s default.
    pub health_check_interval_ms: Option<u32>,
    /// Topology refresh interval; `None` uses the 60s default.
    pub topology_refresh_interval_ms: Option<u32>,
    /// Caller-visible routing override for scan/allow_non_covered_slots
    /// behavior; see `ClusterScanOptions`.
    pub allow_non_covered_slots: bool,
}

impl Default for ClientConfigWire {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            cluster_mode: false,
            tls_mode: TlsMode::NoTls,
            auth: None,
            database_id: 0,
            protocol: ProtocolVersion::Resp3,
            client_name: None,
            request_timeout_ms: 1000,
            connection_timeout_ms: 250,
            read_from: ReadFrom::Primary,
            retry: BackoffStrategy::default(),
            pubsub_subscriptions: None,
            connections_per_node: None,
            health_check_interval_ms: None,
            topology_refresh_interval_ms: None,
            allow_non_covered_slots: false,
        }
    }
}

/// Expanded, validated configuration used internally by the client
/// facade, pool, and router.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addresses: Vec<Address>,
    pub cluster_mode: bool,
    pub tls_mode: TlsMode,
    pub auth: Option<AuthConfig>,
    pub database_id: u32,
    pub protocol: ProtocolVersion,
    pub client_name: Option<String>,
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    pub read_from: ReadFrom,
    pub retry: BackoffStrategy,
    pub pubsub_subscriptions: PubSubSubscriptions,
    pub connections_per_node: usize,
    pub health_check_interval: Duration,
    pub topology_refresh_interval: Duration,
    pub allow_non_covered_slots: bool,
}

impl TryFrom<ClientConfigWire> for ClientConfig {
    type Error = crate::error::CoreError;

    fn try_from(wire: ClientConfigWire) -> Result<Self, Self::Error> {
        if wire.addresses.is_empty() {
            return Err(crate::error::CoreError::Config(
                "at least one seed address is required".into(),
            ));
        }
        Ok(ClientConfig {
            addresses: wire.addresses,
            cluster_mode: wire.cluster_mode,
            tls_mode: wire.tls_mode,
            auth: wire.auth,
            database_id: wire.database_id,
            protocol: wire.protocol,
            client_name: wire.client_name,
            request_timeout: Duration::from_millis(wire.request_timeout_ms as u64),
            connection_timeout: Duration::from_millis(wire.connection_timeout_ms as u64),
            read_from: wire.read_from,
            retry: wire.retry,
            pubsub_subscriptions: wire.pubsub_subscriptions.unwrap_or_default(),
            connections_per_node: wire.connections_per_node.unwrap_or(1) as usize,
            health_check_interval: Duration::from_millis(
                wire.health_check_interval_ms.unwrap_or(30_000) as u64,
            ),
            topology_refresh_interval: Duration::from_millis(
                wire.topology_refresh_interval_ms.unwrap_or(60_000) as u64,
            ),
            allow_non_covered_slots: wire.allow_non_covered_slots,
        })
    }
}

/// Parses the binary configuration record accepted over the FFI
/// boundary into a validated [`ClientConfig`].
pub fn parse_config(bytes: &[u8]) -> crate::error::Result<ClientConfig> {
    let (wire, _): (ClientConfigWire, usize) =
        bincode::decode_from_slice(bytes, bincode::config::standard())?;
    ClientConfig::try_from(wire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_number_of_retries() {
        let b = BackoffStrategy {
            number_of_retries: 3,
            factor: 10,
            exponent_base: 2,
        };
        assert_eq!(b.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(b.delay_for_attempt(3), Duration::from_millis(80));
        assert_eq!(b.delay_for_attempt(10), Duration::from_millis(80));
    }

    #[test]
    fn rejects_empty_addresses() {
        let wire = ClientConfigWire::default();
        assert!(ClientConfig::try_from(wire).is_err());
    }

    #[test]
    fn roundtrips_through_bincode() {
        let mut wire = ClientConfigWire::default();
        wire.addresses.push(Address {
            host: "127.0.0.1".into(),
            port: 6379,
        });
        let bytes = bincode::encode_to_vec(&wire, bincode::config::standard()).unwrap();
        let parsed = parse_config(&bytes).unwrap();
        assert_eq!(parsed.addresses.len(), 1);
        assert_eq!(parsed.request_timeout, Duration::from_millis(1000));
    }
}
