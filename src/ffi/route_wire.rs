//! Wire encoding for a caller-supplied routing directive, passed over
//! the FFI boundary as `route_bytes_ptr`/`route_bytes_len` alongside
//! `command`. Mirrors `router::RoutingDirective` field-for-field; kept
//! separate from it so the core's internal routing types don't need to
//! carry `bincode` derives for an FFI-only concern.

use crate::error::{CoreError, Result};
use crate::router::{RoutingDirective, SlotTarget};

#[derive(bincode::Encode, bincode::Decode)]
enum SlotTargetWire {
    Primary,
    Replica,
}

impl From<SlotTargetWire> for SlotTarget {
    fn from(w: SlotTargetWire) -> Self {
        match w {
            SlotTargetWire::Primary => SlotTarget::Primary,
            SlotTargetWire::Replica => SlotTarget::Replica,
        }
    }
}

#[derive(bincode::Encode, bincode::Decode)]
enum RoutingDirectiveWire {
    Random,
    RandomPrimary,
    ByAddress(String, u16),
    SpecificSlot(u16, SlotTargetWire),
    SpecificKeyedSlot(Vec<u8>, SlotTargetWire),
    AllNodes,
    AllPrimaries,
}

impl From<RoutingDirectiveWire> for RoutingDirective {
    fn from(w: RoutingDirectiveWire) -> Self {
        match w {
            RoutingDirectiveWire::Random => RoutingDirective::Random,
            RoutingDirectiveWire::RandomPrimary => RoutingDirective::RandomPrimary,
            RoutingDirectiveWire::ByAddress(host, port) => RoutingDirective::ByAddress(host, port),
            RoutingDirectiveWire::SpecificSlot(slot, t) => {
                RoutingDirective::SpecificSlot(slot, t.into())
            }
            RoutingDirectiveWire::SpecificKeyedSlot(key, t) => {
                RoutingDirective::SpecificKeyedSlot(key, t.into())
            }
            RoutingDirectiveWire::AllNodes => RoutingDirective::AllNodes,
            RoutingDirectiveWire::AllPrimaries => RoutingDirective::AllPrimaries,
        }
    }
}

/// Decodes a `bincode`-encoded routing directive sent across the FFI
/// boundary.
pub fn decode_routing_directive(bytes: &[u8]) -> Result<RoutingDirective> {
    let (wire, _): (RoutingDirectiveWire, usize) =
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CoreError::Protocol(format!("malformed routing directive: {e}")))?;
    Ok(wire.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_by_address() {
        let wire = RoutingDirectiveWire::ByAddress("10.0.0.1".into(), 6379);
        let bytes = bincode::encode_to_vec(&wire, bincode::config::standard()).unwrap();
        let directive = decode_routing_directive(&bytes).unwrap();
        assert_eq!(directive, RoutingDirective::ByAddress("10.0.0.1".into(), 6379));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_routing_directive(&[0xff, 0xff, 0xff]).is_err());
    }
}
