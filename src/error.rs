//! Centralized error type for the core client runtime.
//!
//! Every fallible operation in this crate returns [`CoreError`] (via
//! [`Result`]); the FFI boundary maps it down to the closed
//! `RequestErrorType` C enum and a copyable message string.

use thiserror::Error;

/// All error kinds the core can surface, per the error taxonomy.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("server error {code}: {message}")]
    ResponseError { code: String, message: String },

    #[error("cluster is down: {0}")]
    ClusterDown(String),

    #[error("command keys span multiple slots: {0}")]
    CrossSlot(String),

    #[error("too many redirects ({0}) without convergence")]
    TooManyRedirects(u32),

    #[error("cluster scan lost coverage of slot range: {0}")]
    CoverageLost(String),

    #[error("client is closed")]
    ClientClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),
}

/// Coarse classification surfaced across the FFI boundary, independent
/// of the message text (which the caller must treat as transient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unspecified,
    ExecAbort,
    Timeout,
    Disconnect,
}

impl CoreError {
    /// Coarse kind used to populate `RequestErrorType` at the FFI boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Timeout(_) => ErrorKind::Timeout,
            CoreError::ConnectionClosed(_) | CoreError::ClientClosed | CoreError::Io(_) => {
                ErrorKind::Disconnect
            }
            CoreError::ResponseError { .. }
            | CoreError::CrossSlot(_)
            | CoreError::TooManyRedirects(_)
            | CoreError::CoverageLost(_) => ErrorKind::ExecAbort,
            CoreError::Config(_)
            | CoreError::Handshake(_)
            | CoreError::Protocol(_)
            | CoreError::ClusterDown(_)
            | CoreError::Tls(_) => ErrorKind::Unspecified,
        }
    }

    /// True for errors the retry engine may retry without caller
    /// involvement (transport-level failures, not response errors).
    pub fn is_retryable_transport(&self) -> bool {
        matches!(
            self,
            CoreError::ConnectionClosed(_) | CoreError::Timeout(_) | CoreError::Io(_)
        )
    }

    pub(crate) fn response(code: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::ResponseError {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Clone for CoreError {
    fn clone(&self) -> Self {
        match self {
            CoreError::Config(s) => CoreError::Config(s.clone()),
            CoreError::Handshake(s) => CoreError::Handshake(s.clone()),
            CoreError::ConnectionClosed(s) => CoreError::ConnectionClosed(s.clone()),
            CoreError::Protocol(s) => CoreError::Protocol(s.clone()),
            CoreError::Timeout(d) => CoreError::Timeout(*d),
            CoreError::ResponseError { code, message } => CoreError::ResponseError {
                code: code.clone(),
                message: message.clone(),
            },
            CoreError::ClusterDown(s) => CoreError::ClusterDown(s.clone()),
            CoreError::CrossSlot(s) => CoreError::CrossSlot(s.clone()),
            CoreError::TooManyRedirects(n) => CoreError::TooManyRedirects(*n),
            CoreError::CoverageLost(s) => CoreError::CoverageLost(s.clone()),
            CoreError::ClientClosed => CoreError::ClientClosed,
            CoreError::Io(e) => CoreError::ConnectionClosed(e.to_string()),
            CoreError::Tls(s) => CoreError::Tls(s.clone()),
        }
    }
}

impl From<bincode::error::EncodeError> for CoreError {
    fn from(e: bincode::error::EncodeError) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for CoreError {
    fn from(e: bincode::error::DecodeError) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
