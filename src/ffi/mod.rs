//! C ABI surface: `create_client`, `command`, `close_client`, and the
//! paired free/accessor functions language wrappers build their
//! idiomatic APIs on top of. See `c_api` for the entry points and
//! `types` for the opaque handle and response-tree layout.
//!
//! # Memory management
//!
//! - `ConnectionResponse` is allocated by `create_client`, freed by
//!   `free_connection_response`.
//! - `CommandResponse` trees are allocated by the core (one per
//!   `on_success`/`on_push` invocation) and freed, root only, by
//!   `free_command_response`; child pointers returned by the
//!   `_array_get`/`_map_key`/`_map_value` accessors are borrowed and
//!   must not be freed separately.
//! - Strings returned by `command_response_error` must be freed with
//!   `free_ffi_string`; strings passed to `on_failure` are valid only
//!   for the callback's duration and must be copied if kept.
//!
//! # Thread safety
//!
//! A `ConnectionResponse` may be driven from any thread; `command` is
//! safe to call concurrently from multiple threads against the same
//! handle. Callbacks run on a worker thread owned by the handle's own
//! tokio runtime, never the caller's thread.

pub mod c_api;
pub mod error;
pub mod route_wire;
pub mod types;

pub use c_api::{
    close_client, command, command_response_array_get, command_response_array_len,
    command_response_as_bool, command_response_as_double, command_response_as_int,
    command_response_as_string, command_response_error, command_response_map_key,
    command_response_map_len, command_response_map_value, command_response_tag, create_client,
    free_command_response, free_connection_response, free_ffi_string, OnFailure, OnPush,
    OnSuccess,
};
pub use error::request_error_type_description;
pub use types::{CommandResponseTag, ConnectionResponse, CommandResponse, RequestErrorType};
