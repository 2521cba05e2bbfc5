pub mod av1_obu;
pub mod av1_packetizer;
pub mod av1_payload;
pub mod h264_packetizer;
pub mod h264_payload;
pub mod payload_framing;
pub mod rtp_payload_chunk;

pub use payload_framing::{PayloadCodec, PayloadFraming};
pub use rtp_payload_chunk::RtpPayloadChunk;
