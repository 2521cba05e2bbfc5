//! Codec capabilities the transport drives but does not implement.

use super::{encoded_frame::EncodedFrame, encoder_settings::EncoderSettings, media_error::MediaError};

pub trait Encoder: Send {
    /// Raw frame type (video picture, audio samples, ...).
    type Input;

    fn encode(&mut self, input: &Self::Input, force_keyframe: bool) -> Result<EncodedFrame, MediaError>;

    fn configure(&mut self, settings: EncoderSettings);
}

pub trait Decoder: Send {
    type Output;

    fn decode(&mut self, data: &[u8]) -> Result<Self::Output, MediaError>;
}
