use crate::rtp::payload::PayloadCodec;

/// One complete NAL unit, OBU group or generic payload rebuilt from a
/// start..=end fragment run.
///
/// `data` is ready to concatenate: Annex-B with 4-byte start codes for
/// H.264, low-overhead OBUs with `obu_size` for AV1, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledUnit {
    pub ssrc: u32,
    pub timestamp: u32,
    pub codec: PayloadCodec,
    pub first_seq: u16,
    pub last_seq: u16,
    /// RTP marker of the last fragment (end of access unit).
    pub marker: bool,
    /// Frame block offset of the first fragment, when the sender tagged it.
    pub block_offset: Option<u32>,
    pub data: Vec<u8>,
}
