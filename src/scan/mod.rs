//! Cluster-aware key scanning: walks every primary's own `SCAN` cursor
//! in turn, surfacing a `CoverageLost` error (or transparently
//! restarting, depending on configuration) if the topology moves
//! under an in-progress scan.

pub mod cursor;

pub use cursor::{scan_next, ClusterScanCursor, ClusterScanOptions};
