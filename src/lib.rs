//! Core client runtime for a polyglot Valkey/Redis client.
//!
//! This crate is the engine language wrappers embed: a RESP2/RESP3
//! wire codec, a per-node connection pool, a cluster router with
//! MOVED/ASK-aware retry, topology discovery, pub/sub, cluster-aware
//! `SCAN`, and the C ABI other languages call into. It never decides
//! transport between a wrapper process and this engine (UDS vs. an
//! in-process FFI call) — that is the wrapper's concern.

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod ffi;
pub mod pool;
pub mod pubsub;
pub mod retry;
pub mod router;
pub mod scan;
pub mod topology;

pub use client::{Client, ClientMetrics};
pub use config::{ClientConfig, ClientConfigWire};
pub use error::{CoreError, ErrorKind, Result};
