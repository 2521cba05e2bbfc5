//! RTP Control Protocol Feedback for Congestion Control (RFC 8888).
//!
//! Layout after the common header (FMT=11, PT=205):
//! sender SSRC, then per media SSRC `ssrc | begin_seq | num_reports` followed
//! by one 16-bit metric block per packet (`R|ECN|ATO`), padded to 32 bits,
//! and finally a 32-bit report timestamp (compact NTP).

use byteorder::{BigEndian, ByteOrder};

use super::{
    common_header::CommonHeader,
    packet_type::{FMT_CCFB, PT_RTPFB, RtcpPacketType},
    rtcp::RtcpPacket,
    rtcp_error::RtcpError,
};

/// Arrival time offset value meaning "received, offset unavailable".
pub const ATO_UNAVAILABLE: u16 = 0x1FFF;

/// Largest number of packets one RFC 8888 block may describe.
pub const MAX_REPORTS_PER_BLOCK: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ecn {
    #[default]
    NotEct = 0b00,
    Ect1 = 0b01,
    Ect0 = 0b10,
    Ce = 0b11,
}

impl Ecn {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b01 => Ecn::Ect1,
            0b10 => Ecn::Ect0,
            0b11 => Ecn::Ce,
            _ => Ecn::NotEct,
        }
    }
}

/// Per-packet metric. A packet that did not arrive has `received == false`
/// and carries neither ECN nor arrival offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketReport {
    pub sequence_number: u16,
    pub received: bool,
    pub ecn: Ecn,
    /// Arrival time before the report timestamp, in 1/1024 s.
    /// `None` on a received packet encodes as 0x1FFF.
    pub arrival_time_offset: Option<u16>,
}

impl PacketReport {
    pub fn received(sequence_number: u16, arrival_time_offset: Option<u16>, ecn: Ecn) -> Self {
        Self {
            sequence_number,
            received: true,
            ecn,
            arrival_time_offset: arrival_time_offset.filter(|&a| a < ATO_UNAVAILABLE),
        }
    }

    pub fn lost(sequence_number: u16) -> Self {
        Self {
            sequence_number,
            received: false,
            ecn: Ecn::NotEct,
            arrival_time_offset: None,
        }
    }

    fn metric(&self) -> u16 {
        if !self.received {
            return 0;
        }
        let ato = self.arrival_time_offset.unwrap_or(ATO_UNAVAILABLE) & 0x1FFF;
        0x8000 | ((self.ecn as u16) << 13) | ato
    }

    fn from_metric(sequence_number: u16, m: u16) -> Self {
        if m & 0x8000 == 0 {
            return Self::lost(sequence_number);
        }
        let ato = m & 0x1FFF;
        Self {
            sequence_number,
            received: true,
            ecn: Ecn::from_bits(m >> 13),
            arrival_time_offset: (ato != ATO_UNAVAILABLE).then_some(ato),
        }
    }
}

/// Reports for one media SSRC; sequence numbers are consecutive from the
/// first report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFeedback {
    pub media_ssrc: u32,
    pub reports: Vec<PacketReport>,
}

impl StreamFeedback {
    pub fn new(media_ssrc: u32, reports: Vec<PacketReport>) -> Self {
        Self {
            media_ssrc,
            reports,
        }
    }

    pub fn begin_seq(&self) -> u16 {
        self.reports.first().map_or(0, |r| r.sequence_number)
    }

    fn validate(&self) -> Result<(), RtcpError> {
        if self.reports.len() > MAX_REPORTS_PER_BLOCK {
            return Err(RtcpError::TooManyFeedbackReports(self.reports.len()));
        }
        let begin = self.begin_seq();
        for (i, r) in self.reports.iter().enumerate() {
            let expected = begin.wrapping_add(i as u16);
            if r.sequence_number != expected {
                return Err(RtcpError::NonContiguousFeedback {
                    ssrc: self.media_ssrc,
                    expected,
                    got: r.sequence_number,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongestionControlFeedback {
    pub sender_ssrc: u32,
    pub blocks: Vec<StreamFeedback>,
    /// Compact NTP time (middle 32 bits) at which the report was generated.
    pub report_timestamp: u32,
}

impl RtcpPacketType for CongestionControlFeedback {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtcpError> {
        for b in &self.blocks {
            b.validate()?;
        }
        let start = out.len();
        CommonHeader::new(FMT_CCFB, PT_RTPFB, false).encode_into(out);
        out.extend_from_slice(&self.sender_ssrc.to_be_bytes());
        for b in &self.blocks {
            out.extend_from_slice(&b.media_ssrc.to_be_bytes());
            out.extend_from_slice(&b.begin_seq().to_be_bytes());
            out.extend_from_slice(&(b.reports.len() as u16).to_be_bytes());
            for r in &b.reports {
                out.extend_from_slice(&r.metric().to_be_bytes());
            }
            if b.reports.len() % 2 == 1 {
                out.extend_from_slice(&[0, 0]);
            }
        }
        out.extend_from_slice(&self.report_timestamp.to_be_bytes());
        CommonHeader::finish(out, start);
        Ok(())
    }

    fn decode(_hdr: &CommonHeader, payload: &[u8]) -> Result<RtcpPacket, RtcpError> {
        if payload.len() < 8 {
            return Err(RtcpError::TooShort);
        }
        let sender_ssrc = BigEndian::read_u32(&payload[0..4]);
        let ts_at = payload.len() - 4;
        let report_timestamp = BigEndian::read_u32(&payload[ts_at..]);

        let mut blocks = Vec::new();
        let mut idx = 4;
        while idx < ts_at {
            if ts_at - idx < 8 {
                return Err(RtcpError::Truncated);
            }
            let media_ssrc = BigEndian::read_u32(&payload[idx..idx + 4]);
            let begin = BigEndian::read_u16(&payload[idx + 4..idx + 6]);
            let count = usize::from(BigEndian::read_u16(&payload[idx + 6..idx + 8]));
            idx += 8;
            let padded = (count + count % 2) * 2;
            if ts_at - idx < padded {
                return Err(RtcpError::Truncated);
            }
            let reports = payload[idx..idx + count * 2]
                .chunks_exact(2)
                .enumerate()
                .map(|(i, m)| {
                    PacketReport::from_metric(
                        begin.wrapping_add(i as u16),
                        BigEndian::read_u16(m),
                    )
                })
                .collect();
            idx += padded;
            blocks.push(StreamFeedback {
                media_ssrc,
                reports,
            });
        }

        Ok(RtcpPacket::Ccfb(CongestionControlFeedback {
            sender_ssrc,
            blocks,
            report_timestamp,
        }))
    }
}

impl CongestionControlFeedback {
    pub fn new(sender_ssrc: u32, blocks: Vec<StreamFeedback>, report_timestamp: u32) -> Self {
        Self {
            sender_ssrc,
            blocks,
            report_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn sample() -> CongestionControlFeedback {
        CongestionControlFeedback::new(
            7,
            vec![
                StreamFeedback::new(
                    0xAAAA_0001,
                    vec![
                        PacketReport::received(65_535, Some(12), Ecn::Ect0),
                        PacketReport::lost(0),
                        PacketReport::received(1, None, Ecn::Ce),
                    ],
                ),
                StreamFeedback::new(0xBBBB_0002, vec![PacketReport::received(9, Some(0), Ecn::NotEct)]),
            ],
            0x1234_5678,
        )
    }

    #[test]
    fn odd_report_counts_are_padded() {
        let mut out = Vec::new();
        sample().encode_into(&mut out).unwrap();
        // 4 hdr + 4 sender + (8 + 8) + (8 + 4) + 4 ts
        assert_eq!(out.len(), 40);
        assert_eq!(out[0] & 0x1F, FMT_CCFB);
        let (hdr, body, _) = CommonHeader::decode(&out).unwrap();
        let RtcpPacket::Ccfb(back) = CongestionControlFeedback::decode(&hdr, body).unwrap() else {
            panic!("expected CCFB");
        };
        assert_eq!(back, sample());
    }

    #[test]
    fn unavailable_offset_uses_reserved_value() {
        let r = PacketReport::received(1, None, Ecn::NotEct);
        assert_eq!(r.metric(), 0x8000 | ATO_UNAVAILABLE);
        assert_eq!(PacketReport::lost(3).metric(), 0);
    }

    #[test]
    fn gaps_inside_a_block_are_rejected() {
        let fb = CongestionControlFeedback::new(
            1,
            vec![StreamFeedback::new(
                2,
                vec![
                    PacketReport::received(10, Some(1), Ecn::NotEct),
                    PacketReport::received(12, Some(1), Ecn::NotEct),
                ],
            )],
            0,
        );
        let err = fb.encode_into(&mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            RtcpError::NonContiguousFeedback { expected: 11, got: 12, .. }
        ));
        assert!(!err.is_malformed());
    }

    #[test]
    fn truncated_block_is_rejected() {
        let mut out = Vec::new();
        sample().encode_into(&mut out).unwrap();
        // claim 200 reports in the first block
        out[14] = 0;
        out[15] = 200;
        let (hdr, body, _) = CommonHeader::decode(&out).unwrap();
        assert_eq!(
            CongestionControlFeedback::decode(&hdr, body),
            Err(RtcpError::Truncated)
        );
    }
}
