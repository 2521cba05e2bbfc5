//! AV1 -> RTP packetizer (AV1 RTP payload format, aggregation header + OBU
//! elements).
//!
//! Every element carries a LEB128 length (W=0). OBUs that do not fit are
//! fragmented across packets with the Z/Y continuation bits.

use super::{
    av1_obu::{OBU_TYPE_SEQUENCE_HEADER, leb128_len, obu_type, split_temporal_unit, write_leb128},
    rtp_payload_chunk::RtpPayloadChunk,
};
use crate::rtp::rtp_error::RtpError;

pub const AV1_Z_BIT: u8 = 0b1000_0000;
pub const AV1_Y_BIT: u8 = 0b0100_0000;
pub const AV1_W_MASK: u8 = 0b0011_0000;
pub const AV1_N_BIT: u8 = 0b0000_1000;

/// Smallest useful remainder of a packet; below this a new packet is opened.
const MIN_FRAGMENT: usize = 2;

#[derive(Debug, Clone)]
pub struct Av1Packetizer {
    mtu: usize,
    rtp_overhead: usize,
}

struct OpenPacket {
    header: u8,
    body: Vec<u8>,
}

impl Av1Packetizer {
    pub fn new(mtu: usize) -> Self {
        Self {
            mtu,
            rtp_overhead: 12,
        }
    }

    pub fn with_overhead(mut self, overhead: usize) -> Self {
        self.rtp_overhead = overhead;
        self
    }

    /// Packetizes one temporal unit (low-overhead bitstream format).
    ///
    /// # Errors
    /// `InvalidPayload` if the temporal unit cannot be parsed, or if the MTU
    /// leaves no room for an element.
    pub fn packetize(&self, temporal_unit: &[u8]) -> Result<Vec<RtpPayloadChunk>, RtpError> {
        // aggregation header byte comes out of the budget
        let budget = self.mtu.saturating_sub(self.rtp_overhead + 1);
        if budget <= MIN_FRAGMENT {
            return Err(RtpError::InvalidPayload("MTU too small for AV1 payload"));
        }
        let elements = split_temporal_unit(temporal_unit)?;
        let new_sequence = elements
            .iter()
            .any(|e| e.first().is_some_and(|&h| obu_type(h) == OBU_TYPE_SEQUENCE_HEADER));

        let mut packets: Vec<OpenPacket> = Vec::new();
        let mut cur = OpenPacket {
            header: 0,
            body: Vec::new(),
        };

        for el in &elements {
            let mut rest: &[u8] = el;
            while !rest.is_empty() {
                let space = budget - cur.body.len();
                let need = leb128_len(rest.len() as u64) + rest.len();
                if need <= space {
                    write_leb128(&mut cur.body, rest.len() as u64);
                    cur.body.extend_from_slice(rest);
                    rest = &[];
                    continue;
                }
                let take = fragment_len(space).min(rest.len());
                if take < MIN_FRAGMENT {
                    packets.push(std::mem::replace(
                        &mut cur,
                        OpenPacket {
                            header: 0,
                            body: Vec::new(),
                        },
                    ));
                    continue;
                }
                write_leb128(&mut cur.body, take as u64);
                cur.body.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
                cur.header |= AV1_Y_BIT;
                packets.push(std::mem::replace(
                    &mut cur,
                    OpenPacket {
                        header: AV1_Z_BIT,
                        body: Vec::new(),
                    },
                ));
            }
        }
        if !cur.body.is_empty() {
            packets.push(cur);
        }

        if new_sequence {
            if let Some(first) = packets.first_mut() {
                first.header |= AV1_N_BIT;
            }
        }
        let count = packets.len();
        Ok(packets
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let mut bytes = Vec::with_capacity(1 + p.body.len());
                bytes.push(p.header);
                bytes.extend_from_slice(&p.body);
                RtpPayloadChunk::new(bytes, i + 1 == count)
            })
            .collect())
    }
}

/// Largest fragment whose LEB128 length prefix plus bytes fit in `space`.
fn fragment_len(space: usize) -> usize {
    let mut take = space.saturating_sub(1);
    while take > 0 && leb128_len(take as u64) + take > space {
        take -= 1;
    }
    take
}
