use super::{
    common_header::CommonHeader,
    packet_type::{PT_SR, RtcpPacketType},
    report_block::{ReportBlock, ReportBody},
    rtcp::RtcpPacket,
    rtcp_error::RtcpError,
    sender_info::SenderInfo,
};

/// SR: what a media sender has sent, anchored to wall-clock time. Our
/// senders attach no report blocks; receivers answer with RRs instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SenderReport {
    pub ssrc: u32,
    pub info: SenderInfo,
    pub reports: Vec<ReportBlock>,
    pub profile_ext: Vec<u8>,
}

impl SenderReport {
    pub fn new(ssrc: u32, info: SenderInfo, reports: Vec<ReportBlock>) -> Self {
        Self {
            ssrc,
            info,
            reports,
            profile_ext: Vec::new(),
        }
    }
}

impl RtcpPacketType for SenderReport {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtcpError> {
        ReportBody {
            ssrc: self.ssrc,
            info: Some(self.info.clone()),
            blocks: self.reports.clone(),
            profile_ext: self.profile_ext.clone(),
        }
        .encode_into(PT_SR, out)
    }

    fn decode(hdr: &CommonHeader, payload: &[u8]) -> Result<RtcpPacket, RtcpError> {
        let body = ReportBody::decode(hdr, payload, true)?;
        Ok(RtcpPacket::Sr(SenderReport {
            ssrc: body.ssrc,
            info: body.info.unwrap_or_default(),
            reports: body.blocks,
            profile_ext: body.profile_ext,
        }))
    }
}
