//! Codec seams and the encoder-side glue that feeds the transport.

pub mod codec;
pub mod encoded_frame;
pub mod encoder_settings;
pub mod encoding_sender;
pub mod media_error;
pub mod test_pattern;
pub mod video_frame;

pub use codec::{Decoder, Encoder};
pub use encoded_frame::EncodedFrame;
pub use encoder_settings::EncoderSettings;
pub use encoding_sender::{EncodingSender, FrameSink};
pub use media_error::MediaError;
pub use test_pattern::{DecodedPattern, TestPatternDecoder, TestPatternEncoder};
pub use video_frame::VideoFrame;
