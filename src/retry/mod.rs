//! Retry engine: error classification and the deadline-aware redirect/
//! backoff loop that drives one logical request to completion.

pub mod classify;
pub mod engine;

pub use classify::{classify_response_error, classify_transport_error, RetryAction};
pub use engine::{execute_with_retry, RefreshNotifier, MAX_REDIRECTS};
