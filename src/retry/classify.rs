//! Maps a response error (or transport failure) to the retry action
//! the engine should take, per the retry table.

use crate::codec::ErrorValue;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum RetryAction {
    Moved { slot: u16, host: String, port: u16 },
    Ask { slot: u16, host: String, port: u16 },
    TryAgainOrClusterDown,
    Loading,
    ReadOnly,
    /// Transport-level failure (timeout, closed socket, refused connect).
    TransportFailure,
    /// Surface to the caller unchanged.
    Fatal,
}

/// Classifies a server response error per the MOVED/ASK/TRYAGAIN/
/// CLUSTERDOWN/LOADING/READONLY table.
pub fn classify_response_error(err: &ErrorValue) -> RetryAction {
    match err.code.as_str() {
        "MOVED" => parse_redirect(&err.message)
            .map(|(slot, host, port)| RetryAction::Moved { slot, host, port })
            .unwrap_or(RetryAction::Fatal),
        "ASK" => parse_redirect(&err.message)
            .map(|(slot, host, port)| RetryAction::Ask { slot, host, port })
            .unwrap_or(RetryAction::Fatal),
        "TRYAGAIN" | "CLUSTERDOWN" => RetryAction::TryAgainOrClusterDown,
        "LOADING" => RetryAction::Loading,
        "READONLY" => RetryAction::ReadOnly,
        _ => RetryAction::Fatal,
    }
}

/// Classifies a transport-level `CoreError` raised instead of a
/// response (connection closed mid-flight, request timeout, ...).
pub fn classify_transport_error(err: &CoreError) -> RetryAction {
    if err.is_retryable_transport() {
        RetryAction::TransportFailure
    } else {
        RetryAction::Fatal
    }
}

/// Parses `"<slot> <host>:<port>"` as found in MOVED/ASK error text.
fn parse_redirect(message: &str) -> Option<(u16, String, u16)> {
    let mut parts = message.split_whitespace();
    let slot: u16 = parts.next()?.parse().ok()?;
    let addr = parts.next()?;
    let (host, port) = addr.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some((slot, host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moved_redirect() {
        let err = ErrorValue {
            code: "MOVED".into(),
            message: "7000 10.0.0.2:6379".into(),
        };
        assert_eq!(
            classify_response_error(&err),
            RetryAction::Moved {
                slot: 7000,
                host: "10.0.0.2".into(),
                port: 6379
            }
        );
    }

    #[test]
    fn parses_ask_redirect() {
        let err = ErrorValue {
            code: "ASK".into(),
            message: "7000 10.0.0.3:6379".into(),
        };
        assert_eq!(
            classify_response_error(&err),
            RetryAction::Ask {
                slot: 7000,
                host: "10.0.0.3".into(),
                port: 6379
            }
        );
    }

    #[test]
    fn unknown_error_code_is_fatal() {
        let err = ErrorValue {
            code: "WRONGTYPE".into(),
            message: "Operation against a key holding the wrong kind of value".into(),
        };
        assert_eq!(classify_response_error(&err), RetryAction::Fatal);
    }

    #[test]
    fn transport_timeout_is_retryable() {
        let err = CoreError::Timeout(std::time::Duration::from_millis(100));
        assert_eq!(classify_transport_error(&err), RetryAction::TransportFailure);
    }
}
