//! Deadline-aware retry loop: drives one logical request (including
//! its MOVED/ASK redirects and transport retries) to a final result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::codec::Value;
use crate::config::ClientConfig;
use crate::error::{CoreError, Result};
use crate::pool::PoolRegistry;

use super::classify::{classify_response_error, classify_transport_error, RetryAction};

/// Default cap on MOVED/ASK redirects per logical request, per the
/// retry table ("more than N redirects ... fails with TooManyRedirects").
pub const MAX_REDIRECTS: u32 = 5;

/// Fired whenever the retry engine observes a MOVED or READONLY
/// response; a background task elsewhere debounces these into a
/// single coalesced topology refresh. Multiple notifications that
/// arrive while the task is busy collapse into the one pending permit
/// `Notify` already provides.
#[derive(Clone, Default)]
pub struct RefreshNotifier(Arc<Notify>);

impl RefreshNotifier {
    pub fn new() -> Self {
        Self(Arc::new(Notify::new()))
    }

    pub fn notify(&self) {
        self.0.notify_one();
    }

    pub async fn notified(&self) {
        self.0.notified().await;
    }
}

/// Executes `verb`/`args` against `(host, port)`, following MOVED/ASK
/// redirects and retrying transport failures (only for idempotent
/// commands) until the request's deadline expires.
#[allow(clippy::too_many_arguments)]
pub async fn execute_with_retry(
    pools: &PoolRegistry,
    config: &ClientConfig,
    refresh: &RefreshNotifier,
    verb: &[u8],
    args: &[Vec<u8>],
    mut host: String,
    mut port: u16,
    idempotent: bool,
) -> Result<Value> {
    let deadline = Instant::now() + config.request_timeout;
    let mut redirects: u32 = 0;
    let mut transport_attempt: u32 = 0;
    let mut asking = false;
    let mut last_err: Option<CoreError> = None;

    loop {
        if Instant::now() >= deadline {
            return Err(last_err.unwrap_or(CoreError::Timeout(config.request_timeout)));
        }

        let conn = match pools.acquire(&host, port).await {
            Ok(c) => c,
            Err(e) => {
                last_err = Some(e);
                sleep_capped(config.retry.delay_for_attempt(transport_attempt), deadline).await;
                transport_attempt += 1;
                continue;
            }
        };

        if asking {
            let asking_frame = crate::codec::encode_command(b"ASKING", std::iter::empty());
            if conn.send(asking_frame).await.is_err() {
                asking = false;
                continue;
            }
        }

        let frame = build_frame(verb, args);
        let response = conn.send(frame).await;

        match response {
            Ok(Value::Error(e)) => {
                let action = classify_response_error(&e);
                debug!(code = %e.code, ?action, "classified response error");
                match action {
                RetryAction::Moved {
                    slot: _,
                    host: new_host,
                    port: new_port,
                } => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        warn!(redirects, "giving up after too many redirects");
                        return Err(CoreError::TooManyRedirects(redirects));
                    }
                    refresh.notify();
                    host = new_host;
                    port = new_port;
                    asking = false;
                }
                RetryAction::Ask {
                    slot: _,
                    host: new_host,
                    port: new_port,
                } => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        warn!(redirects, "giving up after too many redirects");
                        return Err(CoreError::TooManyRedirects(redirects));
                    }
                    host = new_host;
                    port = new_port;
                    asking = true;
                }
                RetryAction::TryAgainOrClusterDown => {
                    last_err = Some(CoreError::response(e.code.clone(), e.message.clone()));
                    sleep_capped(config.retry.delay_for_attempt(transport_attempt), deadline).await;
                    transport_attempt += 1;
                }
                RetryAction::Loading => {
                    last_err = Some(CoreError::response(e.code.clone(), e.message.clone()));
                    sleep_capped(config.retry.delay_for_attempt(transport_attempt), deadline).await;
                    transport_attempt += 1;
                }
                RetryAction::ReadOnly => {
                    refresh.notify();
                    last_err = Some(CoreError::response(e.code.clone(), e.message.clone()));
                    sleep_capped(config.retry.delay_for_attempt(transport_attempt), deadline).await;
                    transport_attempt += 1;
                }
                RetryAction::TransportFailure | RetryAction::Fatal => {
                    return Err(CoreError::response(e.code, e.message));
                }
                }
            }
            Ok(v) => return Ok(v),
            Err(transport_err) => {
                debug!(error = %transport_err, idempotent, "transport failure during request");
                match classify_transport_error(&transport_err) {
                    RetryAction::TransportFailure if idempotent => {
                        last_err = Some(transport_err);
                        sleep_capped(config.retry.delay_for_attempt(transport_attempt), deadline).await;
                        transport_attempt += 1;
                    }
                    _ => return Err(transport_err),
                }
            }
        }
    }
}

fn build_frame(verb: &[u8], args: &[Vec<u8>]) -> BytesMut {
    crate::codec::encode_command(verb, args.iter().map(|a| a.as_slice()))
}

async fn sleep_capped(delay: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    tokio::time::sleep(delay.min(remaining)).await;
}
