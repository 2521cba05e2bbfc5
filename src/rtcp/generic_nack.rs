use byteorder::{BigEndian, ByteOrder};

use super::{
    common_header::CommonHeader,
    packet_type::{FMT_GENERIC_NACK, PT_RTPFB, RtcpPacketType},
    rtcp::RtcpPacket,
    rtcp_error::RtcpError,
};

// Feedback: Generic NACK (RTPFB, FMT=1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericNack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    /// Each entry is (PID, BLP) as in RFC4585 §6.2.1
    pub entries: Vec<(u16, u16)>,
}

impl RtcpPacketType for GenericNack {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtcpError> {
        let start = out.len();
        CommonHeader::new(FMT_GENERIC_NACK, PT_RTPFB, false).encode_into(out);
        out.extend_from_slice(&self.sender_ssrc.to_be_bytes());
        out.extend_from_slice(&self.media_ssrc.to_be_bytes());
        for (pid, blp) in &self.entries {
            out.extend_from_slice(&pid.to_be_bytes());
            out.extend_from_slice(&blp.to_be_bytes());
        }
        CommonHeader::finish(out, start);
        Ok(())
    }

    fn decode(_hdr: &CommonHeader, payload: &[u8]) -> Result<RtcpPacket, RtcpError> {
        if payload.len() < 8 {
            return Err(RtcpError::TooShort);
        }
        let sender_ssrc = BigEndian::read_u32(&payload[0..4]);
        let media_ssrc = BigEndian::read_u32(&payload[4..8]);
        let fci = &payload[8..];
        if fci.len() % 4 != 0 {
            return Err(RtcpError::Truncated);
        }
        let entries = fci
            .chunks_exact(4)
            .map(|c| (BigEndian::read_u16(&c[0..2]), BigEndian::read_u16(&c[2..4])))
            .collect();
        Ok(RtcpPacket::Nack(GenericNack {
            sender_ssrc,
            media_ssrc,
            entries,
        }))
    }
}

impl GenericNack {
    pub fn new(sender_ssrc: u32, media_ssrc: u32, entries: Vec<(u16, u16)>) -> Self {
        Self {
            sender_ssrc,
            media_ssrc,
            entries,
        }
    }

    /// Packs lost sequence numbers (in send order) into PID/BLP pairs.
    pub fn from_lost(sender_ssrc: u32, media_ssrc: u32, lost: &[u16]) -> Self {
        let mut entries: Vec<(u16, u16)> = Vec::new();
        for &seq in lost {
            if let Some((pid, blp)) = entries.last_mut() {
                let diff = seq.wrapping_sub(*pid);
                if (1..=16).contains(&diff) {
                    *blp |= 1 << (diff - 1);
                    continue;
                }
                if diff == 0 {
                    continue;
                }
            }
            entries.push((seq, 0));
        }
        Self::new(sender_ssrc, media_ssrc, entries)
    }

    /// Expands the PID/BLP pairs back to the list of lost sequence numbers.
    pub fn lost_sequence_numbers(&self) -> Vec<u16> {
        let mut out = Vec::new();
        for &(pid, blp) in &self.entries {
            out.push(pid);
            for bit in 0..16u16 {
                if blp & (1 << bit) != 0 {
                    out.push(pid.wrapping_add(bit + 1));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_list_packs_into_bitmask() {
        let lost = [65_534, 65_535, 3, 40];
        let nack = GenericNack::from_lost(1, 2, &lost);
        assert_eq!(nack.entries, vec![(65_534, 0b1 | 0b1_0000), (40, 0)]);
        assert_eq!(nack.lost_sequence_numbers(), lost.to_vec());
    }
}
