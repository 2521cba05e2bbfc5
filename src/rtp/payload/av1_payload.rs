//! AV1 RTP payload classification and element reassembly for the receive path.

use bytes::BytesMut;

use super::{
    av1_obu::{append_sized_obu, read_leb128},
    av1_packetizer::{AV1_N_BIT, AV1_W_MASK, AV1_Y_BIT, AV1_Z_BIT},
};
use crate::rtp::rtp_error::RtpError;

/// One AV1 RTP payload: aggregation header fields plus its OBU elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Av1Payload {
    /// First element continues an OBU from the previous packet.
    pub z: bool,
    /// Last element continues into the next packet.
    pub y: bool,
    /// Declared element count (0 = every element is length-prefixed).
    pub w: u8,
    /// First packet of a coded video sequence.
    pub n: bool,
    pub elements: Vec<Vec<u8>>,
}

impl Av1Payload {
    /// # Errors
    /// `InvalidPayload` when the aggregation header is missing or an element
    /// length overruns the packet.
    pub fn parse(payload: &[u8]) -> Result<Self, RtpError> {
        if payload.len() < 2 {
            return Err(RtpError::InvalidPayload("AV1 payload shorter than 2 bytes"));
        }
        let agg = payload[0];
        let w = (agg & AV1_W_MASK) >> 4;
        let mut elements = Vec::new();
        let mut idx = 1;
        while idx < payload.len() {
            let last_by_count = w != 0 && elements.len() + 1 == usize::from(w);
            let len = if last_by_count {
                payload.len() - idx
            } else {
                let (len, used) = read_leb128(&payload[idx..])
                    .ok_or(RtpError::InvalidPayload("AV1 element length truncated"))?;
                idx += used;
                usize::try_from(len)
                    .map_err(|_| RtpError::InvalidPayload("AV1 element length overflow"))?
            };
            let end = idx
                .checked_add(len)
                .filter(|&e| e <= payload.len())
                .ok_or(RtpError::InvalidPayload("AV1 element overruns packet"))?;
            elements.push(payload[idx..end].to_vec());
            idx = end;
        }
        if w != 0 && elements.len() != usize::from(w) {
            return Err(RtpError::InvalidPayload("AV1 element count mismatch"));
        }
        Ok(Self {
            z: agg & AV1_Z_BIT != 0,
            y: agg & AV1_Y_BIT != 0,
            w,
            n: agg & AV1_N_BIT != 0,
            elements,
        })
    }

    /// A unit starts on a packet whose first element is not a continuation.
    pub fn is_start(&self) -> bool {
        !self.z
    }

    /// A unit ends on a packet whose last element does not continue.
    pub fn is_end(&self) -> bool {
        !self.y
    }
}

/// Joins an in-order packet run (start..=end) back into low-overhead OBUs
/// with `obu_has_size_field` set.
///
/// # Errors
/// `InvalidPayload` if the run starts with a continuation or ends mid-OBU.
pub fn join_av1<'a, I>(packets: I) -> Result<Vec<u8>, RtpError>
where
    I: IntoIterator<Item = &'a Av1Payload>,
{
    let mut out = BytesMut::new();
    let mut pending: Option<Vec<u8>> = None;
    let mut first = true;
    let mut ended = false;

    for pkt in packets {
        if first && pkt.z {
            return Err(RtpError::InvalidPayload("AV1 run starts with a continuation"));
        }
        first = false;
        let count = pkt.elements.len();
        for (i, el) in pkt.elements.iter().enumerate() {
            let mut obu = if i == 0 && pkt.z {
                let mut buf = pending
                    .take()
                    .ok_or(RtpError::InvalidPayload("AV1 continuation without head"))?;
                buf.extend_from_slice(el);
                buf
            } else {
                el.clone()
            };
            if i + 1 == count && pkt.y {
                pending = Some(std::mem::take(&mut obu));
            } else if !obu.is_empty() {
                append_sized_obu(&mut out, &obu);
            }
        }
        ended = !pkt.y;
    }
    if !ended || pending.is_some() {
        return Err(RtpError::InvalidPayload("AV1 run ends mid-OBU"));
    }
    Ok(out.to_vec())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::rtp::payload::av1_obu::write_leb128;
    use crate::rtp::payload::av1_packetizer::Av1Packetizer;

    fn sized_obu(kind: u8, body: &[u8]) -> Vec<u8> {
        let mut v = vec![(kind << 3) | 0x02];
        write_leb128(&mut v, body.len() as u64);
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn fragmented_temporal_unit_is_rebuilt() {
        let mut tu = sized_obu(1, &[7; 5]);
        tu.extend(sized_obu(6, &(0..120u8).collect::<Vec<_>>()));
        let chunks = Av1Packetizer::new(60).packetize(&tu).unwrap();
        assert!(chunks.len() > 2);
        let parsed: Vec<Av1Payload> = chunks
            .iter()
            .map(|c| Av1Payload::parse(&c.bytes).unwrap())
            .collect();
        assert!(parsed[0].is_start() && parsed[0].n);
        assert!(parsed.last().unwrap().is_end());
        assert_eq!(join_av1(&parsed).unwrap(), tu);
    }

    #[test]
    fn w_field_means_last_element_has_no_length() {
        // W=2: first element length-prefixed, second runs to the end
        let p = Av1Payload::parse(&[0x20, 2, 0x30, 1, 0x30, 5, 6]).unwrap();
        assert_eq!(p.elements, vec![vec![0x30, 1], vec![0x30, 5, 6]]);
    }

    #[test]
    fn malformed_lengths_are_rejected() {
        assert!(Av1Payload::parse(&[0x00]).is_err());
        assert!(Av1Payload::parse(&[0x00, 9, 1]).is_err());
        assert!(Av1Payload::parse(&[0x30, 1, 0x30]).is_err());
    }

    #[test]
    fn run_starting_mid_obu_is_rejected() {
        let p = Av1Payload::parse(&[AV1_Z_BIT, 1, 0x30]).unwrap();
        assert!(join_av1([&p]).is_err());
    }
}
