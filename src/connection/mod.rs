//! One multiplexed connection to a single server: socket ownership,
//! handshake, and the in-flight request/response correlation queue.

pub mod core;
pub mod handshake;
pub mod state;
pub mod transport;

pub use core::Connection;
pub use state::ConnectionState;
pub use transport::Transport;
