use super::{av1_payload::Av1Payload, h264_payload::H264Payload};
use crate::rtp::rtp_error::RtpError;

/// Codec bound to a negotiated payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadCodec {
    H264,
    Av1,
    /// Audio and data: every packet is a self-contained unit.
    Generic,
}

impl PayloadCodec {
    /// Maps an SDP `rtpmap` encoding name to a framing codec.
    pub fn from_encoding_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "H264" => PayloadCodec::H264,
            "AV1" | "AV1X" => PayloadCodec::Av1,
            _ => PayloadCodec::Generic,
        }
    }
}

/// A received payload, classified once by codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadFraming {
    H264(H264Payload),
    Av1(Av1Payload),
    Generic(Vec<u8>),
}

impl PayloadFraming {
    /// # Errors
    /// Propagates the codec-specific `InvalidPayload` error.
    pub fn parse(codec: PayloadCodec, payload: &[u8]) -> Result<Self, RtpError> {
        Ok(match codec {
            PayloadCodec::H264 => PayloadFraming::H264(H264Payload::parse(payload)?),
            PayloadCodec::Av1 => PayloadFraming::Av1(Av1Payload::parse(payload)?),
            PayloadCodec::Generic => PayloadFraming::Generic(payload.to_vec()),
        })
    }

    pub fn is_start(&self) -> bool {
        match self {
            PayloadFraming::H264(p) => p.is_start(),
            PayloadFraming::Av1(p) => p.is_start(),
            PayloadFraming::Generic(_) => true,
        }
    }

    pub fn is_end(&self) -> bool {
        match self {
            PayloadFraming::H264(p) => p.is_end(),
            PayloadFraming::Av1(p) => p.is_end(),
            PayloadFraming::Generic(_) => true,
        }
    }

    /// Self-contained packets need no reassembly.
    pub fn is_complete(&self) -> bool {
        self.is_start() && self.is_end()
    }

    pub fn codec(&self) -> PayloadCodec {
        match self {
            PayloadFraming::H264(_) => PayloadCodec::H264,
            PayloadFraming::Av1(_) => PayloadCodec::Av1,
            PayloadFraming::Generic(_) => PayloadCodec::Generic,
        }
    }
}
