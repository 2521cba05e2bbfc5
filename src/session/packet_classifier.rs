//! Demultiplexes datagrams arriving on the single rtcp-mux path.

/// RTCP packet types occupy the whole second byte (RFC 5761).
const RTCP_TYPES: std::ops::RangeInclusive<u8> = 192..=223;
/// Dynamic RTP payload types, marker bit masked off.
const RTP_DYNAMIC_TYPES: std::ops::RangeInclusive<u8> = 96..=127;
const RTP_MIN_LEN: usize = 12;
const RTCP_MIN_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketClass {
    Rtp { payload_type: u8, ssrc: u32 },
    Rtcp,
    Unknown,
}

/// Classifies by version and second byte only; nothing is decoded.
pub fn classify(buf: &[u8]) -> PacketClass {
    if buf.len() < RTCP_MIN_LEN || buf[0] >> 6 != 2 {
        return PacketClass::Unknown;
    }
    let b1 = buf[1];
    if RTCP_TYPES.contains(&b1) {
        return PacketClass::Rtcp;
    }
    let payload_type = b1 & 0x7F;
    if buf.len() >= RTP_MIN_LEN && RTP_DYNAMIC_TYPES.contains(&payload_type) {
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        return PacketClass::Rtp { payload_type, ssrc };
    }
    PacketClass::Unknown
}
