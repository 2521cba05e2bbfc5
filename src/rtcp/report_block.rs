use byteorder::{BigEndian, ByteOrder};

use super::{
    common_header::CommonHeader,
    config::MAX_REPORT_BLOCKS,
    rtcp_error::RtcpError,
    sender_info::{SENDER_INFO_LEN, SenderInfo},
};

pub const REPORT_BLOCK_LEN: usize = 24;

/// ReportBlock per RFC3550 §6.4.2 (24 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// 24-bit signed cumulative number of packets lost.
    /// Stored here as i32 (range: -8_388_608..=8_388_607).
    pub cumulative_lost: i32,
    pub highest_seq_no_received: u32, // extended highest seq no. received
    pub interarrival_jitter: u32,
    pub lsr: u32,
    pub dlsr: u32,
}

impl ReportBlock {
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), RtcpError> {
        if buf.len() < REPORT_BLOCK_LEN {
            return Err(RtcpError::TooShort);
        }
        // 24-bit signed, sign-extended
        let cl_raw = BigEndian::read_u24(&buf[5..8]);
        let cumulative_lost = ((cl_raw << 8) as i32) >> 8;

        Ok((
            Self {
                ssrc: BigEndian::read_u32(&buf[0..4]),
                fraction_lost: buf[4],
                cumulative_lost,
                highest_seq_no_received: BigEndian::read_u32(&buf[8..12]),
                interarrival_jitter: BigEndian::read_u32(&buf[12..16]),
                lsr: BigEndian::read_u32(&buf[16..20]),
                dlsr: BigEndian::read_u32(&buf[20..24]),
            },
            REPORT_BLOCK_LEN,
        ))
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        out.push(self.fraction_lost);
        let cl = self.cumulative_lost.clamp(-8_388_608, 8_388_607);
        let cl_u = cl as u32 & 0x00FF_FFFF;
        out.extend_from_slice(&cl_u.to_be_bytes()[1..]);
        out.extend_from_slice(&self.highest_seq_no_received.to_be_bytes());
        out.extend_from_slice(&self.interarrival_jitter.to_be_bytes());
        out.extend_from_slice(&self.lsr.to_be_bytes());
        out.extend_from_slice(&self.dlsr.to_be_bytes());
    }
}

/// Body shared by SR and RR: reporter SSRC, the sender block (SR only),
/// report blocks and any profile extension left after them.
pub(super) struct ReportBody {
    pub ssrc: u32,
    pub info: Option<SenderInfo>,
    pub blocks: Vec<ReportBlock>,
    pub profile_ext: Vec<u8>,
}

impl ReportBody {
    pub fn encode_into(&self, pt: u8, out: &mut Vec<u8>) -> Result<(), RtcpError> {
        let count = u8::try_from(self.blocks.len())
            .ok()
            .filter(|&n| usize::from(n) <= MAX_REPORT_BLOCKS)
            .ok_or(RtcpError::TooManyReportBlocks(self.blocks.len()))?;
        let start = out.len();
        CommonHeader::new(count, pt, false).encode_into(out);
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        if let Some(info) = &self.info {
            info.encode_into(out);
        }
        for block in &self.blocks {
            block.encode_into(out);
        }
        out.extend_from_slice(&self.profile_ext);
        CommonHeader::finish(out, start);
        Ok(())
    }

    pub fn decode(hdr: &CommonHeader, payload: &[u8], with_info: bool) -> Result<Self, RtcpError> {
        if payload.len() < 4 {
            return Err(RtcpError::TooShort);
        }
        let ssrc = BigEndian::read_u32(&payload[..4]);
        let mut idx = 4;
        let info = if with_info {
            let info = SenderInfo::decode(&payload[idx..])?;
            idx += SENDER_INFO_LEN;
            Some(info)
        } else {
            None
        };
        let count = usize::from(hdr.rc_or_fmt());
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(raw) = payload.get(idx..idx + REPORT_BLOCK_LEN) else {
                return Err(RtcpError::Truncated);
            };
            blocks.push(ReportBlock::decode(raw)?.0);
            idx += REPORT_BLOCK_LEN;
        }
        Ok(Self {
            ssrc,
            info,
            blocks,
            profile_ext: payload[idx..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn negative_cumulative_loss_is_sign_extended() {
        let rb = ReportBlock {
            ssrc: 9,
            cumulative_lost: -3,
            ..Default::default()
        };
        let mut out = Vec::new();
        rb.encode_into(&mut out);
        assert_eq!(&out[5..8], &[0xFF, 0xFF, 0xFD]);
        assert_eq!(ReportBlock::decode(&out).unwrap().0, rb);
    }
}
