//! Streaming RESP2/RESP3 decoder.
//!
//! The decoder never buffers more than one logical value ahead and never
//! advances the caller's cursor on an incomplete frame — callers keep
//! accumulating bytes and re-invoke [`decode`] against the same buffer.

use super::value::{ErrorValue, PushFrame, Value, VerbatimFormat};
use crate::error::{CoreError, Result};
use tracing::trace;

/// Defends against a malicious or buggy server sending unbounded nesting.
pub const MAX_NESTING_DEPTH: usize = 32;

/// One decoded unit: either an ordinary reply value, or an out-of-band
/// push frame that must be demultiplexed before in-flight correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Reply(Value),
    Push(PushFrame),
}

/// Outcome of attempting to decode one frame from `buf`.
pub enum Decoded {
    /// Not enough bytes yet; caller must read more and retry with a
    /// buffer that still starts at the same offset.
    Incomplete,
    /// A full frame was decoded, consuming `consumed` bytes from the
    /// front of `buf`.
    Complete { frame: Frame, consumed: usize },
}

/// Attempt to decode exactly one top-level frame from the front of `buf`.
pub fn decode(buf: &[u8]) -> Result<Decoded> {
    match parse_value(buf, 0)? {
        None => Ok(Decoded::Incomplete),
        Some((value, consumed)) => {
            let frame = match value {
                ParsedValue::Push(items) => Frame::Push(PushFrame(items)),
                ParsedValue::Value(v) => Frame::Reply(v),
            };
            trace!(consumed, kind = frame_kind(&frame), "decoded frame");
            Ok(Decoded::Complete { frame, consumed })
        }
    }
}

fn frame_kind(frame: &Frame) -> &'static str {
    match frame {
        Frame::Push(_) => "push",
        Frame::Reply(Value::SimpleString(_)) => "simple_string",
        Frame::Reply(Value::Error(_)) => "error",
        Frame::Reply(Value::Integer(_)) => "integer",
        Frame::Reply(Value::BulkString(_)) => "bulk_string",
        Frame::Reply(Value::Nil) => "nil",
        Frame::Reply(Value::Array(_)) => "array",
        Frame::Reply(Value::Boolean(_)) => "boolean",
        Frame::Reply(Value::Double(_)) => "double",
        Frame::Reply(Value::BigNumber(_)) => "big_number",
        Frame::Reply(Value::Map(_)) => "map",
        Frame::Reply(Value::Set(_)) => "set",
        Frame::Reply(Value::VerbatimString(_, _)) => "verbatim",
    }
}

enum ParsedValue {
    Value(Value),
    Push(Vec<Value>),
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse one RESP value starting at the front of `buf`. Returns `None`
/// when more bytes are needed. `depth` bounds recursive nesting.
fn parse_value(buf: &[u8], depth: usize) -> Result<Option<(ParsedValue, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    if depth > MAX_NESTING_DEPTH {
        return Err(CoreError::Protocol(format!(
            "nesting depth exceeded {MAX_NESTING_DEPTH}"
        )));
    }

    let tag = buf[0];
    let Some(line_end) = find_crlf(&buf[1..]).map(|p| p + 1) else {
        return Ok(None);
    };
    let header = &buf[1..line_end];

    match tag {
        b'+' => Ok(Some((
            ParsedValue::Value(Value::SimpleString(header.to_vec())),
            line_end + 2,
        ))),
        b'-' => Ok(Some((
            ParsedValue::Value(Value::Error(ErrorValue::parse(header))),
            line_end + 2,
        ))),
        b':' => {
            let n = parse_i64(header)?;
            Ok(Some((ParsedValue::Value(Value::Integer(n)), line_end + 2)))
        }
        b'_' => Ok(Some((ParsedValue::Value(Value::Nil), line_end + 2))),
        b',' => {
            let s = std::str::from_utf8(header)
                .map_err(|_| CoreError::Protocol("non-utf8 double".into()))?;
            let d: f64 = s
                .parse()
                .map_err(|_| CoreError::Protocol(format!("invalid double: {s}")))?;
            Ok(Some((ParsedValue::Value(Value::Double(d)), line_end + 2)))
        }
        b'#' => {
            let b = match header {
                b"t" => true,
                b"f" => false,
                _ => return Err(CoreError::Protocol("invalid boolean".into())),
            };
            Ok(Some((ParsedValue::Value(Value::Boolean(b)), line_end + 2)))
        }
        b'(' => Ok(Some((
            ParsedValue::Value(Value::BigNumber(header.to_vec())),
            line_end + 2,
        ))),
        b'$' => parse_bulk(buf, line_end, header).map(|o| {
            o.map(|(v, consumed)| (ParsedValue::Value(v), consumed))
        }),
        b'=' => parse_verbatim(buf, line_end, header),
        b'*' => parse_aggregate(buf, line_end, header, depth, AggregateKind::Array),
        b'~' => parse_aggregate(buf, line_end, header, depth, AggregateKind::Set),
        b'%' => parse_aggregate(buf, line_end, header, depth, AggregateKind::Map),
        b'>' => parse_aggregate(buf, line_end, header, depth, AggregateKind::Push),
        other => Err(CoreError::Protocol(format!(
            "unrecognized type tag: {:?}",
            other as char
        ))),
    }
}

fn parse_i64(header: &[u8]) -> Result<i64> {
    std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CoreError::Protocol(format!("invalid integer: {:?}", header)))
}

fn parse_bulk(buf: &[u8], line_end: usize, header: &[u8]) -> Result<Option<(Value, usize)>> {
    let len = parse_i64(header)?;
    if len == -1 {
        return Ok(Some((Value::Nil, line_end + 2)));
    }
    let len = len
        .try_into()
        .map_err(|_| CoreError::Protocol("negative bulk length".into()))?;
    read_fixed_body(buf, line_end, len).map(|o| o.map(|(body, consumed)| (Value::BulkString(body.to_vec()), consumed)))
}

fn parse_verbatim(buf: &[u8], line_end: usize, header: &[u8]) -> Result<Option<(ParsedValue, usize)>> {
    let len = parse_i64(header)?;
    let len: usize = len
        .try_into()
        .map_err(|_| CoreError::Protocol("negative verbatim length".into()))?;
    let Some((body, consumed)) = read_fixed_body(buf, line_end, len)? else {
        return Ok(None);
    };
    if body.len() < 4 || body[3] != b':' {
        return Err(CoreError::Protocol("malformed verbatim string".into()));
    }
    let format = match &body[..3] {
        b"txt" => VerbatimFormat::Text,
        b"mkd" => VerbatimFormat::Markdown,
        _ => return Err(CoreError::Protocol("unknown verbatim format".into())),
    };
    Ok(Some((
        ParsedValue::Value(Value::VerbatimString(format, body[4..].to_vec())),
        consumed,
    )))
}

/// Reads a `len`-byte body followed by a mandatory trailing `\r\n`,
/// starting right after the header's own `\r\n` at `line_end`.
fn read_fixed_body(buf: &[u8], line_end: usize, len: usize) -> Result<Option<(&[u8], usize)>> {
    let body_start = line_end + 2;
    let body_end = body_start + len;
    let total = body_end + 2;
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[body_end..total] != b"\r\n" {
        return Err(CoreError::Protocol("missing trailing CRLF on bulk body".into()));
    }
    Ok(Some((&buf[body_start..body_end], total)))
}

enum AggregateKind {
    Array,
    Set,
    Map,
    Push,
}

fn parse_aggregate(
    buf: &[u8],
    line_end: usize,
    header: &[u8],
    depth: usize,
    kind: AggregateKind,
) -> Result<Option<(ParsedValue, usize)>> {
    let count = parse_i64(header)?;
    if count == -1 {
        let value = match kind {
            AggregateKind::Array => Value::Nil,
            AggregateKind::Set => Value::Nil,
            AggregateKind::Map => Value::Nil,
            AggregateKind::Push => return Ok(Some((ParsedValue::Push(Vec::new()), line_end + 2))),
        };
        return Ok(Some((ParsedValue::Value(value), line_end + 2)));
    }
    let count: usize = count
        .try_into()
        .map_err(|_| CoreError::Protocol("negative aggregate length".into()))?;

    let is_map = matches!(kind, AggregateKind::Map);
    let elements_needed = if is_map { count * 2 } else { count };

    let mut cursor = line_end + 2;
    let mut items = Vec::with_capacity(elements_needed.min(4096));
    for _ in 0..elements_needed {
        let Some((value, consumed)) = parse_value(&buf[cursor..], depth + 1)? else {
            return Ok(None);
        };
        let value = match value {
            ParsedValue::Value(v) => v,
            ParsedValue::Push(_) => {
                return Err(CoreError::Protocol(
                    "push frame nested inside aggregate".into(),
                ))
            }
        };
        items.push(value);
        cursor += consumed;
    }

    let parsed = match kind {
        AggregateKind::Array => ParsedValue::Value(Value::Array(items)),
        AggregateKind::Set => ParsedValue::Value(Value::Set(items)),
        AggregateKind::Map => {
            let mut pairs = Vec::with_capacity(count);
            let mut it = items.into_iter();
            while let (Some(k), Some(v)) = (it.next(), it.next()) {
                pairs.push((k, v));
            }
            ParsedValue::Value(Value::Map(pairs))
        }
        AggregateKind::Push => ParsedValue::Push(items),
    };

    Ok(Some((parsed, cursor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buf: &[u8]) -> (Frame, usize) {
        match decode(buf).unwrap() {
            Decoded::Complete { frame, consumed } => (frame, consumed),
            Decoded::Incomplete => panic!("expected complete frame"),
        }
    }

    #[test]
    fn decodes_simple_string() {
        let (frame, consumed) = complete(b"+OK\r\n");
        assert_eq!(frame, Frame::Reply(Value::SimpleString(b"OK".to_vec())));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn decodes_nil_bulk_and_nil_array_distinctly_from_empty() {
        let (bulk_nil, _) = complete(b"$-1\r\n");
        assert_eq!(bulk_nil, Frame::Reply(Value::Nil));
        let (array_nil, _) = complete(b"*-1\r\n");
        assert_eq!(array_nil, Frame::Reply(Value::Nil));
        let (empty_bulk, _) = complete(b"$0\r\n\r\n");
        assert_eq!(empty_bulk, Frame::Reply(Value::BulkString(vec![])));
        let (empty_array, _) = complete(b"*0\r\n");
        assert_eq!(empty_array, Frame::Reply(Value::Array(vec![])));
    }

    #[test]
    fn incomplete_mid_value_does_not_error() {
        match decode(b"$5\r\nhel").unwrap() {
            Decoded::Incomplete => {}
            Decoded::Complete { .. } => panic!("should be incomplete"),
        }
    }

    #[test]
    fn decodes_binary_bulk_with_embedded_nul_and_crlf() {
        let payload = [0u8, b'\r', b'\n', 1, 2];
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("${}\r\n", payload.len()).as_bytes());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(b"\r\n");
        let (frame, consumed) = complete(&buf);
        assert_eq!(frame, Frame::Reply(Value::BulkString(payload.to_vec())));
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn decodes_nested_array_depth_eight() {
        let mut buf = Vec::new();
        for _ in 0..8 {
            buf.extend_from_slice(b"*1\r\n");
        }
        buf.extend_from_slice(b":1\r\n");
        let (frame, consumed) = complete(&buf);
        assert_eq!(consumed, buf.len());
        match frame {
            Frame::Reply(Value::Array(_)) => {}
            other => panic!("expected nested array, got {other:?}"),
        }
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut buf = Vec::new();
        for _ in 0..(MAX_NESTING_DEPTH + 5) {
            buf.extend_from_slice(b"*1\r\n");
        }
        buf.extend_from_slice(b":1\r\n");
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn decodes_resp3_map_and_set_and_push() {
        let (map, _) = complete(b"%1\r\n+k\r\n:1\r\n");
        assert_eq!(
            map,
            Frame::Reply(Value::Map(vec![(
                Value::SimpleString(b"k".to_vec()),
                Value::Integer(1)
            )]))
        );
        let (set, _) = complete(b"~1\r\n:1\r\n");
        assert_eq!(set, Frame::Reply(Value::Set(vec![Value::Integer(1)])));
        let (push, _) = complete(b">2\r\n+message\r\n+hi\r\n");
        match push {
            Frame::Push(PushFrame(items)) => assert_eq!(items.len(), 2),
            other => panic!("expected push frame, got {other:?}"),
        }
    }

    #[test]
    fn decodes_double_boolean_bignumber_verbatim() {
        let (d, _) = complete(b",3.14\r\n");
        assert_eq!(d, Frame::Reply(Value::Double(3.14)));
        let (b, _) = complete(b"#t\r\n");
        assert_eq!(b, Frame::Reply(Value::Boolean(true)));
        let (n, _) = complete(b"(12345678901234567890\r\n");
        assert_eq!(n, Frame::Reply(Value::BigNumber(b"12345678901234567890".to_vec())));
        let (v, _) = complete(b"=15\r\ntxt:Some string\r\n");
        assert_eq!(
            v,
            Frame::Reply(Value::VerbatimString(VerbatimFormat::Text, b"Some string".to_vec()))
        );
    }

    #[test]
    fn decodes_error_with_code() {
        let (e, _) = complete(b"-WRONGTYPE Operation against a wrong kind\r\n");
        match e {
            Frame::Reply(Value::Error(err)) => {
                assert_eq!(err.code, "WRONGTYPE");
                assert_eq!(err.message, "Operation against a wrong kind");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn roundtrip_encode_then_decode_preserves_value() {
        use super::super::encode::encode_command;
        let encoded = encode_command(b"SET", [b"foo".as_slice(), b"bar"]);
        let (frame, consumed) = complete(&encoded);
        assert_eq!(consumed, encoded.len());
        match frame {
            Frame::Reply(Value::Array(items)) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], Value::BulkString(b"SET".to_vec()));
                assert_eq!(items[1], Value::BulkString(b"foo".to_vec()));
                assert_eq!(items[2], Value::BulkString(b"bar".to_vec()));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
