/// One packet's worth of payload produced by a packetizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPayloadChunk {
    pub bytes: Vec<u8>,
    /// Set on the final chunk of a frame; becomes the RTP marker bit.
    pub marker: bool,
}

impl RtpPayloadChunk {
    pub fn new(bytes: Vec<u8>, marker: bool) -> Self {
        Self { bytes, marker }
    }
}
