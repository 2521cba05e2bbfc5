/// Output of an [`Encoder`](super::Encoder): the bitstream of one frame
/// plus the frame-type tag video encoders attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub keyframe: bool,
}

impl EncodedFrame {
    pub fn new(data: Vec<u8>, keyframe: bool) -> Self {
        Self { data, keyframe }
    }
}
