//! Client facade: the single entry point tying pool, router, retry
//! engine, topology, and pub/sub together.

pub mod callback;
pub mod facade;
pub mod metrics;

pub use callback::{CallbackId, CallbackRegistry};
pub use facade::Client;
pub use metrics::{ClientMetrics, TopologyMetrics};
