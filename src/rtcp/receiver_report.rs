use super::{
    common_header::CommonHeader,
    packet_type::{PT_RR, RtcpPacketType},
    report_block::{ReportBlock, ReportBody},
    rtcp::RtcpPacket,
    rtcp_error::RtcpError,
};

/// RR: one block per remote SSRC this endpoint receives from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReportBlock>,
    pub profile_ext: Vec<u8>,
}

impl ReceiverReport {
    pub fn new(ssrc: u32, reports: Vec<ReportBlock>) -> Self {
        Self {
            ssrc,
            reports,
            profile_ext: Vec::new(),
        }
    }
}

impl RtcpPacketType for ReceiverReport {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtcpError> {
        ReportBody {
            ssrc: self.ssrc,
            info: None,
            blocks: self.reports.clone(),
            profile_ext: self.profile_ext.clone(),
        }
        .encode_into(PT_RR, out)
    }

    fn decode(hdr: &CommonHeader, payload: &[u8]) -> Result<RtcpPacket, RtcpError> {
        let body = ReportBody::decode(hdr, payload, false)?;
        Ok(RtcpPacket::Rr(ReceiverReport {
            ssrc: body.ssrc,
            reports: body.blocks,
            profile_ext: body.profile_ext,
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn too_many_blocks_is_an_encode_error() {
        let rr = ReceiverReport::new(1, vec![ReportBlock::default(); 32]);
        let mut out = Vec::new();
        assert!(matches!(
            rr.encode_into(&mut out),
            Err(RtcpError::TooManyReportBlocks(32))
        ));
    }

    #[test]
    fn declared_count_beyond_body_is_truncated() {
        let rr = ReceiverReport::new(7, vec![ReportBlock::default()]);
        let mut out = Vec::new();
        rr.encode_into(&mut out).unwrap();
        let (hdr, body, _) = CommonHeader::decode(&out).unwrap();
        assert!(matches!(
            ReceiverReport::decode(&hdr, &body[..body.len() - 4]),
            Err(RtcpError::Truncated)
        ));
    }
}
