use crate::rtp::payload::PayloadCodec;

/// A whole encoded frame (all units of one RTP timestamp), ready for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub ssrc: u32,
    pub timestamp: u32,
    pub codec: PayloadCodec,
    pub first_seq: u16,
    pub last_seq: u16,
    pub data: Vec<u8>,
}
