//! Error-string helpers for the FFI boundary. Command and connection
//! failures are reported entirely through the `on_failure` callback
//! protocol (see `c_api`); this module just owns the C-string
//! plumbing shared by every call site that needs to hand one back.

use std::os::raw::c_char;

use super::types::string_to_c_char;

/// Human-readable name for a `RequestErrorType`, for logging; the
/// returned string is static and must not be freed.
///
/// # Safety
/// Safe to call from C with any valid `RequestErrorType` value.
#[no_mangle]
pub unsafe extern "C" fn request_error_type_description(
    kind: super::types::RequestErrorType,
) -> *const c_char {
    use super::types::RequestErrorType::*;
    let description = match kind {
        Unspecified => "unspecified error\0",
        ExecAbort => "command execution aborted\0",
        Timeout => "request timed out\0",
        Disconnect => "connection disconnected\0",
    };
    description.as_ptr() as *const c_char
}

/// Builds an owned C string for `message`, used by `c_api` when
/// invoking `on_failure`. Per the external interface contract, the
/// pointer is valid only for the callback's duration — `c_api` frees
/// it immediately after the callback returns.
pub(super) fn owned_error_string(message: &str) -> *mut c_char {
    string_to_c_char(message)
}
