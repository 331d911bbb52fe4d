//! The C ABI surface: `create_client`, `command`, `close_client`, and
//! the paired free functions. Every call here is synchronous at the
//! FFI boundary — `command` itself dispatches asynchronously and
//! returns immediately, invoking the caller's callback from a worker
//! thread owned by the client's runtime.

use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::Arc;

use tokio::runtime::Builder;

use super::error::owned_error_string;
use super::route_wire::decode_routing_directive;
use super::types::{
    free_c_char, string_to_c_char, ClientHandle, CommandResponse, CommandResponseTag,
    ConnectionResponse, FfiValue, RequestErrorType,
};
use crate::client::Client;
use crate::pubsub::PushMessage;
use crate::router::request_type_from_code;

/// Invoked once a command's result (or failure) is ready. `channel_ptr`
/// is the opaque token the caller supplied to `command`; the core
/// never dereferences it.
pub type OnSuccess = extern "C" fn(channel_ptr: usize, response: *mut CommandResponse);
pub type OnFailure =
    extern "C" fn(channel_ptr: usize, message: *const c_char, kind: RequestErrorType);
/// Invoked for every pub/sub message delivered to this client, in
/// receipt order, for as long as the client is open.
pub type OnPush = extern "C" fn(response: *mut CommandResponse);

/// Creates a client from a `bincode`-encoded `ClientConfigWire` and
/// blocks until at least one node is reachable (or the configured
/// connection timeout elapses). On success, invokes `on_success` and
/// returns a live handle; on failure, invokes `on_failure` with the
/// reason and returns null. `on_push` fires for every subsequent
/// pub/sub message this client receives, for as long as it stays open.
///
/// # Safety
/// `conf_bytes_ptr` must point to `conf_bytes_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn create_client(
    conf_bytes_ptr: *const u8,
    conf_bytes_len: usize,
    on_push: OnPush,
    on_success: OnSuccess,
    on_failure: OnFailure,
) -> *mut ConnectionResponse {
    if conf_bytes_ptr.is_null() {
        let msg = owned_error_string("null configuration buffer");
        on_failure(0, msg, RequestErrorType::Unspecified);
        free_c_char(msg);
        return ptr::null_mut();
    }
    let bytes = std::slice::from_raw_parts(conf_bytes_ptr, conf_bytes_len);

    let runtime = match Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            let msg = owned_error_string(&e.to_string());
            on_failure(0, msg, RequestErrorType::Unspecified);
            free_c_char(msg);
            return ptr::null_mut();
        }
    };

    let on_push_cb: Arc<dyn Fn(PushMessage) + Send + Sync> = Arc::new(move |msg| {
        let ffi = ffi_push_tree(&msg);
        let boxed = Box::into_raw(Box::new(ffi)) as *mut CommandResponse;
        on_push(boxed);
    });

    let created = runtime.block_on(Client::create(bytes, on_push_cb));

    match created {
        Ok(client) => {
            let handle = Box::new(ClientHandle::new(client, runtime));
            on_success(0, ptr::null_mut());
            Box::into_raw(handle) as *mut ConnectionResponse
        }
        Err(e) => {
            let msg = owned_error_string(&e.to_string());
            on_failure(0, msg, (&e).into());
            free_c_char(msg);
            ptr::null_mut()
        }
    }
}

/// Dispatches one command asynchronously. `request_type` is an index
/// into the core's request-type table (see `request_type_from_code`);
/// argument bytes are copied out of `arg_ptrs`/`arg_lens` before this
/// function returns, so the caller may free them immediately after.
/// `route_bytes`, if non-empty, is a `bincode`-encoded routing
/// directive overriding the command's default.
///
/// # Safety
/// `conn` must be a live pointer from `create_client`. `arg_ptrs` must
/// point to `argc` pointers, each valid for its paired `arg_lens`
/// entry. `route_bytes_ptr` must be valid for `route_bytes_len` bytes
/// (or null when `route_bytes_len` is 0).
#[no_mangle]
pub unsafe extern "C" fn command(
    conn: *mut ConnectionResponse,
    channel_ptr: usize,
    request_type: u32,
    argc: usize,
    arg_ptrs: *const *const u8,
    arg_lens: *const usize,
    route_bytes_ptr: *const u8,
    route_bytes_len: usize,
    on_success: OnSuccess,
    on_failure: OnFailure,
) {
    if conn.is_null() {
        let msg = owned_error_string("null connection handle");
        on_failure(channel_ptr, msg, RequestErrorType::Disconnect);
        free_c_char(msg);
        return;
    }
    let handle = &*(conn as *const ClientHandle);

    let Some(request_type) = request_type_from_code(request_type) else {
        let msg = owned_error_string("unknown request_type code");
        on_failure(channel_ptr, msg, RequestErrorType::Unspecified);
        free_c_char(msg);
        return;
    };

    let mut args = Vec::with_capacity(argc);
    let ptrs = std::slice::from_raw_parts(arg_ptrs, argc);
    let lens = std::slice::from_raw_parts(arg_lens, argc);
    for (&p, &len) in ptrs.iter().zip(lens.iter()) {
        args.push(std::slice::from_raw_parts(p, len).to_vec());
    }

    let directive = if route_bytes_len == 0 {
        None
    } else {
        let route_bytes = std::slice::from_raw_parts(route_bytes_ptr, route_bytes_len);
        match decode_routing_directive(route_bytes) {
            Ok(d) => Some(d),
            Err(e) => {
                let msg = owned_error_string(&e.to_string());
                on_failure(channel_ptr, msg, RequestErrorType::Unspecified);
                free_c_char(msg);
                return;
            }
        }
    };

    let client = handle.client.clone();
    handle.runtime.spawn(async move {
        match client.command(request_type, args, directive).await {
            Ok(value) => {
                let ffi = FfiValue::from_value(&value);
                let boxed = Box::into_raw(Box::new(ffi)) as *mut CommandResponse;
                on_success(channel_ptr, boxed);
            }
            Err(e) => {
                let msg = owned_error_string(&e.to_string());
                on_failure(channel_ptr, msg, (&e).into());
                free_c_char(msg);
            }
        }
    });
}

/// Cancels every in-flight command (completing them with
/// `ClientClosed`, never invoking `on_success`/`on_failure` for them)
/// and tears down all pooled connections. `conn` remains valid until
/// `free_connection_response`.
///
/// # Safety
/// `conn` must be a live pointer from `create_client`, or null.
#[no_mangle]
pub unsafe extern "C" fn close_client(conn: *mut ConnectionResponse) {
    if conn.is_null() {
        return;
    }
    let handle = &*(conn as *const ClientHandle);
    handle.client.close();
}

/// Frees a handle returned by `create_client`. Calling this on an
/// already-closed handle is fine; it does not itself close the
/// client's connections (call `close_client` first if that matters).
///
/// # Safety
/// `conn` must have been returned by `create_client` and not freed
/// already.
#[no_mangle]
pub unsafe extern "C" fn free_connection_response(conn: *mut ConnectionResponse) {
    if conn.is_null() {
        return;
    }
    drop(Box::from_raw(conn as *mut ClientHandle));
}

/// Recursively frees a response tree returned via `on_success` or
/// `on_push`.
///
/// # Safety
/// `response` must have been produced by this crate and not freed
/// already.
#[no_mangle]
pub unsafe extern "C" fn free_command_response(response: *mut CommandResponse) {
    if response.is_null() {
        return;
    }
    drop(Box::from_raw(response as *mut FfiValue));
}

// ---------------------------------------------------------------------
// CommandResponse accessors
// ---------------------------------------------------------------------

unsafe fn value_of<'a>(response: *const CommandResponse) -> &'a FfiValue {
    &*(response as *const FfiValue)
}

/// # Safety
/// `response` must be a live, non-null pointer from this crate.
#[no_mangle]
pub unsafe extern "C" fn command_response_tag(response: *const CommandResponse) -> CommandResponseTag {
    super::types::tag_of(value_of(response))
}

/// # Safety
/// `response` must be a live pointer whose tag is `Integer`.
#[no_mangle]
pub unsafe extern "C" fn command_response_as_int(response: *const CommandResponse) -> i64 {
    match value_of(response) {
        FfiValue::Integer(i) => *i,
        _ => 0,
    }
}

/// # Safety
/// `response` must be a live pointer whose tag is `Double`.
#[no_mangle]
pub unsafe extern "C" fn command_response_as_double(response: *const CommandResponse) -> f64 {
    match value_of(response) {
        FfiValue::Double(d) => *d,
        _ => 0.0,
    }
}

/// # Safety
/// `response` must be a live pointer whose tag is `Boolean`.
#[no_mangle]
pub unsafe extern "C" fn command_response_as_bool(response: *const CommandResponse) -> c_int {
    match value_of(response) {
        FfiValue::Boolean(b) => *b as c_int,
        _ => 0,
    }
}

/// Writes the string's address into `*out_ptr` and its length into
/// `*out_len`. The pointer is borrowed from the response tree and
/// valid only until `free_command_response` runs on the root.
///
/// # Safety
/// `response` must be a live pointer whose tag is `String`; `out_ptr`
/// and `out_len` must be valid for a single write.
#[no_mangle]
pub unsafe extern "C" fn command_response_as_string(
    response: *const CommandResponse,
    out_ptr: *mut *const u8,
    out_len: *mut usize,
) {
    match value_of(response).bytes() {
        Some(bytes) => {
            *out_ptr = bytes.as_ptr();
            *out_len = bytes.len();
        }
        None => {
            *out_ptr = ptr::null();
            *out_len = 0;
        }
    }
}

/// # Safety
/// `response` must be a live pointer whose tag is `Array`.
#[no_mangle]
pub unsafe extern "C" fn command_response_array_len(response: *const CommandResponse) -> usize {
    match value_of(response) {
        FfiValue::Array(items) => items.len(),
        _ => 0,
    }
}

/// Borrows the `index`-th element of an array response. Returns null
/// if out of range or the tag isn't `Array`.
///
/// # Safety
/// `response` must be a live pointer; the returned pointer is valid
/// only until the root is freed.
#[no_mangle]
pub unsafe extern "C" fn command_response_array_get(
    response: *const CommandResponse,
    index: usize,
) -> *const CommandResponse {
    match value_of(response) {
        FfiValue::Array(items) => items
            .get(index)
            .map(|v| v as *const FfiValue as *const CommandResponse)
            .unwrap_or(ptr::null()),
        _ => ptr::null(),
    }
}

/// # Safety
/// `response` must be a live pointer whose tag is `Map`.
#[no_mangle]
pub unsafe extern "C" fn command_response_map_len(response: *const CommandResponse) -> usize {
    match value_of(response) {
        FfiValue::Map(pairs) => pairs.len(),
        _ => 0,
    }
}

/// # Safety
/// Same contract as `command_response_array_get`, indexing the
/// `index`-th pair's key.
#[no_mangle]
pub unsafe extern "C" fn command_response_map_key(
    response: *const CommandResponse,
    index: usize,
) -> *const CommandResponse {
    match value_of(response) {
        FfiValue::Map(pairs) => pairs
            .get(index)
            .map(|(k, _)| k as *const FfiValue as *const CommandResponse)
            .unwrap_or(ptr::null()),
        _ => ptr::null(),
    }
}

/// # Safety
/// Same contract as `command_response_array_get`, indexing the
/// `index`-th pair's value.
#[no_mangle]
pub unsafe extern "C" fn command_response_map_value(
    response: *const CommandResponse,
    index: usize,
) -> *const CommandResponse {
    match value_of(response) {
        FfiValue::Map(pairs) => pairs
            .get(index)
            .map(|(_, v)| v as *const FfiValue as *const CommandResponse)
            .unwrap_or(ptr::null()),
        _ => ptr::null(),
    }
}

/// Writes the server error code (e.g. `WRONGTYPE`, `MOVED`) to a
/// caller-owned C string via `out_code`, and the message via
/// `out_message`. Both must be freed with `free_ffi_string`.
///
/// # Safety
/// `response` must be a live pointer whose tag is `Error`.
#[no_mangle]
pub unsafe extern "C" fn command_response_error(
    response: *const CommandResponse,
    out_code: *mut *mut c_char,
    out_message: *mut *mut c_char,
) {
    match value_of(response) {
        FfiValue::Error { code, message } => {
            *out_code = string_to_c_char(code);
            *out_message = string_to_c_char(message);
        }
        _ => {
            *out_code = ptr::null_mut();
            *out_message = ptr::null_mut();
        }
    }
}

/// Frees a string returned by `command_response_error` or a failure
/// callback's message.
///
/// # Safety
/// `s` must have been returned by this crate's `string_to_c_char`, or
/// null.
#[no_mangle]
pub unsafe extern "C" fn free_ffi_string(s: *mut c_char) {
    free_c_char(s);
}

fn ffi_push_tree(msg: &PushMessage) -> FfiValue {
    let mut fields = vec![
        (FfiValue::Heap(b"kind".to_vec().into_boxed_slice()), push_kind_value(msg)),
        (
            FfiValue::Heap(b"channel".to_vec().into_boxed_slice()),
            FfiValue::from_bytes(&msg.channel),
        ),
        (
            FfiValue::Heap(b"payload".to_vec().into_boxed_slice()),
            FfiValue::from_bytes(&msg.payload),
        ),
    ];
    if let Some(pattern) = &msg.pattern {
        fields.push((
            FfiValue::Heap(b"pattern".to_vec().into_boxed_slice()),
            FfiValue::from_bytes(pattern),
        ));
    }
    FfiValue::Map(fields)
}

fn push_kind_value(msg: &PushMessage) -> FfiValue {
    use crate::pubsub::PushKind::*;
    let name: &[u8] = match msg.kind {
        Message => b"message",
        PMessage => b"pmessage",
        SMessage => b"smessage",
        Other => b"other",
    };
    FfiValue::Heap(name.to_vec().into_boxed_slice())
}
