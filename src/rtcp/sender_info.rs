use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::rtcp_error::RtcpError;
use crate::rtp::time::NtpTime;

pub const SENDER_INFO_LEN: usize = 20;

/// The 20-byte sender block of an SR: wall clock, the RTP time it maps to,
/// and what this SSRC has sent so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SenderInfo {
    pub ntp: NtpTime,
    pub rtp_ts: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

impl SenderInfo {
    pub fn decode(buf: &[u8]) -> Result<Self, RtcpError> {
        let Some(block) = buf.get(..SENDER_INFO_LEN) else {
            return Err(RtcpError::TooShort);
        };
        let mut rd = Cursor::new(block);
        let mut next = || rd.read_u32::<BigEndian>().map_err(|_| RtcpError::TooShort);
        let ntp = NtpTime::from_parts(next()?, next()?);
        Ok(Self {
            ntp,
            rtp_ts: next()?,
            packet_count: next()?,
            octet_count: next()?,
        })
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for word in [self.ntp.0 >> 32, self.ntp.0 & 0xFFFF_FFFF] {
            let _ = out.write_u32::<BigEndian>(word as u32);
        }
        for word in [self.rtp_ts, self.packet_count, self.octet_count] {
            let _ = out.write_u32::<BigEndian>(word);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn short_block_is_rejected() {
        assert!(matches!(SenderInfo::decode(&[0u8; 19]), Err(RtcpError::TooShort)));
    }

    #[test]
    fn words_are_laid_out_in_order() {
        let info = SenderInfo {
            ntp: NtpTime::from_parts(1, 2),
            rtp_ts: 3,
            packet_count: 4,
            octet_count: 5,
        };
        let mut out = Vec::new();
        info.encode_into(&mut out);
        assert_eq!(out.len(), SENDER_INFO_LEN);
        assert_eq!(&out[4..8], &[0, 0, 0, 2]);
        assert_eq!(&out[16..20], &[0, 0, 0, 5]);
        assert_eq!(SenderInfo::decode(&out).unwrap(), info);
    }
}
