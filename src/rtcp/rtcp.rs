use super::{
    common_header::CommonHeader,
    congestion_feedback::CongestionControlFeedback,
    generic_nack::GenericNack,
    packet_type::{FMT_CCFB, FMT_GENERIC_NACK, PT_RR, PT_RTPFB, PT_SR, RtcpPacketType},
    receiver_report::ReceiverReport,
    rtcp_error::RtcpError,
    sender_report::SenderReport,
};

/// The union of supported RTCP packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    Sr(SenderReport),
    Rr(ReceiverReport),
    Ccfb(CongestionControlFeedback), // Transport FB (205/FMT=11)
    Nack(GenericNack),               // Transport FB (205/FMT=1)
}

impl RtcpPacket {
    /// Decode a *compound* RTCP buffer into individual packets.
    pub fn decode_compound(buf: &[u8]) -> Result<Vec<RtcpPacket>, RtcpError> {
        let mut out = Vec::new();
        let mut idx = 0usize;
        while idx < buf.len() {
            let (hdr, payload, total) = CommonHeader::decode(&buf[idx..])?;
            let pkt = match (hdr.pt(), hdr.rc_or_fmt()) {
                (PT_SR, _) => SenderReport::decode(&hdr, payload)?,
                (PT_RR, _) => ReceiverReport::decode(&hdr, payload)?,
                (PT_RTPFB, FMT_GENERIC_NACK) => GenericNack::decode(&hdr, payload)?,
                (PT_RTPFB, FMT_CCFB) => CongestionControlFeedback::decode(&hdr, payload)?,
                (PT_RTPFB, fmt) => {
                    return Err(RtcpError::UnsupportedFormat { pt: PT_RTPFB, fmt });
                }
                (other, _) => return Err(RtcpError::UnknownPacketType(other)),
            };
            out.push(pkt);
            idx += total;
        }
        Ok(out)
    }

    /// Like `decode_compound`, but skips packet types this stack does not
    /// interpret (SDES, BYE, APP, PSFB) instead of failing the whole buffer.
    pub fn decode_compound_lenient(buf: &[u8]) -> Result<Vec<RtcpPacket>, RtcpError> {
        let mut out = Vec::new();
        let mut idx = 0usize;
        while idx < buf.len() {
            let (_, _, total) = CommonHeader::decode(&buf[idx..])?;
            match Self::decode_compound(&buf[idx..idx + total]) {
                Ok(mut pkts) => out.append(&mut pkts),
                Err(RtcpError::UnknownPacketType(_) | RtcpError::UnsupportedFormat { .. }) => {}
                Err(e) => return Err(e),
            }
            idx += total;
        }
        Ok(out)
    }

    /// Encode a compound RTCP packet (concatenation of packets).
    pub fn encode_compound(pkts: &[RtcpPacket]) -> Result<Vec<u8>, RtcpError> {
        let mut out = Vec::new();
        for pkt in pkts {
            pkt.encode_into(&mut out)?;
        }
        Ok(out)
    }

    pub fn encode(&self) -> Result<Vec<u8>, RtcpError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtcpError> {
        match self {
            RtcpPacket::Sr(sr) => sr.encode_into(out),
            RtcpPacket::Rr(rr) => rr.encode_into(out),
            RtcpPacket::Ccfb(fb) => fb.encode_into(out),
            RtcpPacket::Nack(nack) => nack.encode_into(out),
        }
    }
}
