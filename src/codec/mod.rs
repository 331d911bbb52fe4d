//! Wire codec: encodes command frames and decodes RESP2/RESP3 values
//! from a byte stream, without buffering a full message unnecessarily.

pub mod decode;
pub mod encode;
pub mod value;

pub use decode::{decode, Decoded, Frame, MAX_NESTING_DEPTH};
pub use encode::{encode_command, encode_command_multi_verb};
pub use value::{ErrorValue, PushFrame, Value, VerbatimFormat};
