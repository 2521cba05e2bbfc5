use super::{common_header::CommonHeader, rtcp::RtcpPacket, rtcp_error::RtcpError};

// RTCP packet types (per RFC3550; feedback per RFC4585)
pub const PT_SR: u8 = 200;
pub const PT_RR: u8 = 201;
pub const PT_RTPFB: u8 = 205; // Transport layer FB

// RTPFB formats
pub const FMT_GENERIC_NACK: u8 = 1;
pub const FMT_CCFB: u8 = 11; // RFC 8888

pub trait RtcpPacketType {
    /// Encodes the complete packet (including the CommonHeader).
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtcpError>;

    /// Decodes the packet from its CommonHeader and body.
    fn decode(hdr: &CommonHeader, payload: &[u8]) -> Result<RtcpPacket, RtcpError>;
}
