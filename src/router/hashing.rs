//! Slot hashing: CRC16/XMODEM over the hash-tagged portion of a key.
//!
//! No published crate in this crate's dependency set implements the
//! specific XMODEM variant the wire protocol mandates, so the table is
//! generated and applied directly — the same way the codec hand-rolls
//! RESP framing instead of importing a generic serializer.

const TOTAL_SLOTS: u16 = 16384;

const fn build_table() -> [u16; 256] {
    let poly: u16 = 0x1021;
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static TABLE: [u16; 256] = build_table();

fn crc16_xmodem(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &b in bytes {
        let idx = ((crc >> 8) ^ b as u16) & 0xff;
        crc = (crc << 8) ^ TABLE[idx as usize];
    }
    crc
}

/// Extracts the hash-tag interior (`{...}`) of a key if present and
/// non-empty; otherwise returns the whole key.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(close_rel) = key[open + 1..].iter().position(|&b| b == b'}') {
            if close_rel > 0 {
                return &key[open + 1..open + 1 + close_rel];
            }
        }
    }
    key
}

/// Computes the cluster slot (0..16383) a key maps to, applying
/// hash-tag extraction first.
pub fn key_slot(key: &[u8]) -> u16 {
    crc16_xmodem(hash_tag(key)) % TOTAL_SLOTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_crc16_vectors() {
        // Reference vectors from the XMODEM CRC16 used by Redis Cluster.
        assert_eq!(crc16_xmodem(b""), 0);
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
    }

    #[test]
    fn hash_tag_extracts_interior() {
        assert_eq!(hash_tag(b"foo{bar}baz"), b"bar");
        assert_eq!(hash_tag(b"{bar}"), b"bar");
    }

    #[test]
    fn hash_tag_falls_back_on_empty_interior() {
        assert_eq!(hash_tag(b"foo{}bar"), b"foo{}bar");
    }

    #[test]
    fn hash_tag_falls_back_without_closing_brace() {
        assert_eq!(hash_tag(b"foo{bar"), b"foo{bar");
    }

    #[test]
    fn hash_tag_keys_share_a_slot() {
        assert_eq!(key_slot(b"{user1000}.following"), key_slot(b"{user1000}.followers"));
        assert_eq!(key_slot(b"foo{bar}"), key_slot(b"bar"));
    }

    #[test]
    fn slot_is_in_range() {
        for key in [b"a".as_slice(), b"somekey", b"{}another", b"12345"] {
            assert!(key_slot(key) < TOTAL_SLOTS);
        }
    }
}
