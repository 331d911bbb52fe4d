// Wire codec boundary behaviors: RESP3 tag coverage, nil disambiguation,
// binary-safe arguments, and deeply nested arrays.

use valkey_core::codec::{decode, encode_command, Decoded, Frame, Value};

fn decode_one(bytes: &[u8]) -> Frame {
    match decode(bytes).expect("well-formed frame should decode") {
        Decoded::Complete { frame, consumed } => {
            assert_eq!(consumed, bytes.len(), "decoder should consume the whole frame");
            frame
        }
        Decoded::Incomplete => panic!("frame should be complete: {bytes:?}"),
    }
}

#[test]
fn null_bulk_and_null_array_both_decode_to_nil_distinct_from_empty() {
    assert_eq!(decode_one(b"$-1\r\n"), Frame::Reply(Value::Nil));
    assert_eq!(decode_one(b"*-1\r\n"), Frame::Reply(Value::Nil));
    assert_eq!(decode_one(b"$0\r\n\r\n"), Frame::Reply(Value::BulkString(Vec::new())));
    assert_eq!(decode_one(b"*0\r\n"), Frame::Reply(Value::Array(Vec::new())));
}

#[test]
fn resp3_scalar_tags_decode() {
    assert_eq!(decode_one(b"#t\r\n"), Frame::Reply(Value::Boolean(true)));
    assert_eq!(decode_one(b"#f\r\n"), Frame::Reply(Value::Boolean(false)));
    assert_eq!(decode_one(b",3.14\r\n"), Frame::Reply(Value::Double(3.14)));
    assert_eq!(decode_one(b"_\r\n"), Frame::Reply(Value::Nil));
    assert_eq!(
        decode_one(b"(3492890328409238509324850943850943825024385\r\n"),
        Frame::Reply(Value::BigNumber(b"3492890328409238509324850943850943825024385".to_vec()))
    );
}

#[test]
fn resp3_map_decodes_as_key_value_pairs() {
    let frame = decode_one(b"%2\r\n+a\r\n:1\r\n+b\r\n:2\r\n");
    match frame {
        Frame::Reply(Value::Map(pairs)) => {
            assert_eq!(pairs.len(), 2);
            assert_eq!(pairs[0], (Value::SimpleString(b"a".to_vec()), Value::Integer(1)));
            assert_eq!(pairs[1], (Value::SimpleString(b"b".to_vec()), Value::Integer(2)));
        }
        other => panic!("expected a map, got {other:?}"),
    }
}

#[test]
fn array_at_max_nesting_depth_parses() {
    // Eight levels deep, innermost holding one bulk string.
    let mut wire = Vec::new();
    for _ in 0..8 {
        wire.extend_from_slice(b"*1\r\n");
    }
    wire.extend_from_slice(b"$3\r\nfoo\r\n");

    let mut frame = decode_one(&wire);
    for _ in 0..8 {
        match frame {
            Frame::Reply(Value::Array(mut items)) => {
                assert_eq!(items.len(), 1);
                frame = Frame::Reply(items.remove(0));
            }
            other => panic!("expected nested array, got {other:?}"),
        }
    }
    assert_eq!(frame, Frame::Reply(Value::BulkString(b"foo".to_vec())));
}

#[test]
fn encode_command_round_trips_through_decode() {
    let encoded = encode_command(b"SET", [b"foo".as_slice(), b"bar".as_slice()]);
    let frame = decode_one(&encoded);
    match frame {
        Frame::Reply(Value::Array(items)) => {
            assert_eq!(
                items,
                vec![
                    Value::BulkString(b"SET".to_vec()),
                    Value::BulkString(b"foo".to_vec()),
                    Value::BulkString(b"bar".to_vec()),
                ]
            );
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn binary_argument_with_embedded_nul_round_trips() {
    let binary_arg: &[u8] = b"foo\x00bar\xff\x01";
    let encoded = encode_command(b"SET", [b"key".as_slice(), binary_arg]);
    let frame = decode_one(&encoded);
    match frame {
        Frame::Reply(Value::Array(items)) => {
            assert_eq!(items[2], Value::BulkString(binary_arg.to_vec()));
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn incomplete_frame_reports_incomplete_without_consuming() {
    let partial = b"$5\r\nhel";
    match decode(partial).unwrap() {
        Decoded::Incomplete => {}
        Decoded::Complete { .. } => panic!("5-byte bulk string with only 3 body bytes is incomplete"),
    }
}
