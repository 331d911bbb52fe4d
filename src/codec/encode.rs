//! Command encoding: every command frames as a RESP array of bulk strings.

use bytes::{BufMut, BytesMut};

/// Encode a command verb plus its arguments as a RESP array of bulk
/// strings. Arguments are opaque byte strings; no escaping, no charset
/// assumption, per the codec's encoding contract.
pub fn encode_command<'a, I>(verb: &[u8], args: I) -> BytesMut
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let args_iter = args.into_iter();
    let (lower, _) = args_iter.size_hint();
    let mut buf = BytesMut::with_capacity(32 + lower * 16);

    // Reserve the array header once we know the element count; since
    // args may be a one-shot iterator we buffer elements first.
    let mut elements: Vec<&[u8]> = Vec::with_capacity(lower + 1);
    elements.push(verb);
    elements.extend(args_iter);

    buf.put_u8(b'*');
    buf.put_slice(elements.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");

    for element in elements {
        encode_bulk_string(&mut buf, element);
    }

    buf
}

fn encode_bulk_string(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u8(b'$');
    buf.put_slice(bytes.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(bytes);
    buf.put_slice(b"\r\n");
}

/// Encode a pre-split verb (e.g. `CLUSTER SLOTS`, `CLIENT SETNAME`) by
/// treating each verb token as its own bulk string ahead of the
/// caller-supplied arguments.
pub fn encode_command_multi_verb<'a, I>(verb_tokens: &[&[u8]], args: I) -> BytesMut
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut elements: Vec<&[u8]> = Vec::new();
    elements.extend_from_slice(verb_tokens);
    elements.extend(args);

    let mut buf = BytesMut::with_capacity(32 + elements.len() * 16);
    buf.put_u8(b'*');
    buf.put_slice(elements.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");
    for element in elements {
        encode_bulk_string(&mut buf, element);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_get() {
        let out = encode_command(b"GET", [b"foo".as_slice()]);
        assert_eq!(out.as_ref(), b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    }

    #[test]
    fn encodes_empty_args() {
        let out = encode_command(b"DBSIZE", std::iter::empty());
        assert_eq!(out.as_ref(), b"*1\r\n$6\r\nDBSIZE\r\n");
    }

    #[test]
    fn encodes_binary_argument_with_nul() {
        let arg = [0u8, 1, 2, b'\r', b'\n', 0xff];
        let out = encode_command(b"SET", [b"k".as_slice(), &arg]);
        assert!(out.as_ref().ends_with(&arg[..]) || out.as_ref().windows(arg.len()).any(|w| w == arg));
    }

    #[test]
    fn encodes_multi_verb() {
        let out = encode_command_multi_verb(&[b"CLUSTER", b"SLOTS"], std::iter::empty());
        assert_eq!(out.as_ref(), b"*2\r\n$7\r\nCLUSTER\r\n$5\r\nSLOTS\r\n");
    }
}
