//! C-compatible type definitions for the FFI boundary.
//!
//! Handles are opaque to callers: the real state lives in a boxed Rust
//! struct, exposed only as a raw pointer. `CommandResponse` is the
//! tagged union the design notes call for, with short bulk strings
//! stored inline to avoid a heap allocation per response.

use std::os::raw::c_char;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::client::Client;
use crate::codec::Value;
use crate::error::{CoreError, ErrorKind};

/// Opaque handle to a created client, returned by `create_client`.
#[repr(C)]
pub struct ConnectionResponse {
    _private: [u8; 0],
}

/// Opaque handle to one command's result tree, returned via the
/// `on_success` callback and released with `free_command_response`.
#[repr(C)]
pub struct CommandResponse {
    _private: [u8; 0],
}

/// Real connection state boxed behind `ConnectionResponse`. Owns a
/// dedicated runtime: the embedder calls into us from arbitrary
/// threads with no ambient tokio context of their own.
pub struct ClientHandle {
    pub client: Arc<Client>,
    pub runtime: Runtime,
}

impl ClientHandle {
    pub fn new(client: Arc<Client>, runtime: Runtime) -> Self {
        Self { client, runtime }
    }
}

/// Inline capacity for the small-string optimization: bulk strings up
/// to this length are copied into the response tree itself instead of
/// a separate heap allocation.
pub const INLINE_CAP: usize = 23;

/// One node of the response tree handed back across the FFI boundary.
/// Mirrors [`Value`] but owns C-friendly storage and inlines short
/// bulk strings.
#[derive(Debug, Clone)]
pub enum FfiValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    /// Bulk/simple string of at most `INLINE_CAP` bytes, stored inline.
    Inline { len: u8, buf: [u8; INLINE_CAP] },
    /// Bulk/simple string too long to inline.
    Heap(Box<[u8]>),
    Array(Vec<FfiValue>),
    Map(Vec<(FfiValue, FfiValue)>),
    Error { code: Box<str>, message: Box<str> },
}

impl FfiValue {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::string(bytes)
    }

    fn string(bytes: &[u8]) -> Self {
        if bytes.len() <= INLINE_CAP {
            let mut buf = [0u8; INLINE_CAP];
            buf[..bytes.len()].copy_from_slice(bytes);
            FfiValue::Inline {
                len: bytes.len() as u8,
                buf,
            }
        } else {
            FfiValue::Heap(bytes.to_vec().into_boxed_slice())
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Nil => FfiValue::Nil,
            Value::Boolean(b) => FfiValue::Boolean(*b),
            Value::Integer(i) => FfiValue::Integer(*i),
            Value::Double(d) => FfiValue::Double(*d),
            Value::SimpleString(b) | Value::BulkString(b) | Value::BigNumber(b) => {
                FfiValue::string(b)
            }
            Value::VerbatimString(_, b) => FfiValue::string(b),
            Value::Array(items) | Value::Set(items) => {
                FfiValue::Array(items.iter().map(FfiValue::from_value).collect())
            }
            Value::Map(pairs) => FfiValue::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (FfiValue::from_value(k), FfiValue::from_value(v)))
                    .collect(),
            ),
            Value::Error(e) => FfiValue::Error {
                code: e.code.clone().into_boxed_str(),
                message: e.message.clone().into_boxed_str(),
            },
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            FfiValue::Inline { len, buf } => Some(&buf[..*len as usize]),
            FfiValue::Heap(b) => Some(b),
            _ => None,
        }
    }
}

/// Discriminant returned by `command_response_tag`, mirroring
/// [`FfiValue`]'s variants in a C-friendly closed enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResponseTag {
    Nil = 0,
    Boolean = 1,
    Integer = 2,
    Double = 3,
    String = 4,
    Array = 5,
    Map = 6,
    Error = 7,
}

pub fn tag_of(value: &FfiValue) -> CommandResponseTag {
    match value {
        FfiValue::Nil => CommandResponseTag::Nil,
        FfiValue::Boolean(_) => CommandResponseTag::Boolean,
        FfiValue::Integer(_) => CommandResponseTag::Integer,
        FfiValue::Double(_) => CommandResponseTag::Double,
        FfiValue::Inline { .. } | FfiValue::Heap(_) => CommandResponseTag::String,
        FfiValue::Array(_) => CommandResponseTag::Array,
        FfiValue::Map(_) => CommandResponseTag::Map,
        FfiValue::Error { .. } => CommandResponseTag::Error,
    }
}

/// `RequestErrorType` per the external interface: a closed, coarse
/// classification independent of the message text.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorType {
    Unspecified = 0,
    ExecAbort = 1,
    Timeout = 2,
    Disconnect = 3,
}

impl From<ErrorKind> for RequestErrorType {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Unspecified => RequestErrorType::Unspecified,
            ErrorKind::ExecAbort => RequestErrorType::ExecAbort,
            ErrorKind::Timeout => RequestErrorType::Timeout,
            ErrorKind::Disconnect => RequestErrorType::Disconnect,
        }
    }
}

impl From<&CoreError> for RequestErrorType {
    fn from(e: &CoreError) -> Self {
        e.kind().into()
    }
}

/// Converts a Rust string into an owned, null-terminated C string.
/// Returns a null pointer if `s` contains an interior NUL.
pub fn string_to_c_char(s: &str) -> *mut c_char {
    match std::ffi::CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ptr` must have been returned by `string_to_c_char` (or equivalent
/// `CString::into_raw`) and not freed already.
pub unsafe fn free_c_char(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(std::ffi::CString::from_raw(ptr));
    }
}
