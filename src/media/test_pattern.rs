//! Stand-in H.264 codec pair for demos and tests.
//!
//! The encoder emits well-formed Annex-B access units (SPS, PPS and IDR on
//! keyframes, one non-IDR slice otherwise) sized for the configured
//! bitrate. The payload is filler derived from the picture, not a real
//! bitstream.

use super::{
    codec::{Decoder, Encoder},
    encoded_frame::EncodedFrame,
    encoder_settings::EncoderSettings,
    media_error::MediaError,
    video_frame::VideoFrame,
};
use crate::rtp::payload::h264_packetizer::{build_annexb, split_annexb_nalus};

const NAL_SLICE: u8 = 0x41;
const NAL_IDR: u8 = 0x65;
const NAL_SPS: u8 = 0x67;
const NAL_PPS: u8 = 0x68;
const MIN_SLICE_LEN: usize = 16;

pub struct TestPatternEncoder {
    settings: EncoderSettings,
    frames_since_key: u32,
}

impl TestPatternEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self {
            settings,
            frames_since_key: 0,
        }
    }

    pub fn settings(&self) -> EncoderSettings {
        self.settings
    }

    fn slice_len(&self, keyframe: bool) -> usize {
        let per_frame = self.settings.bitrate_bps as usize / 8 / self.settings.fps.max(1) as usize;
        let len = if keyframe { per_frame * 3 } else { per_frame };
        len.max(MIN_SLICE_LEN)
    }
}

impl Encoder for TestPatternEncoder {
    type Input = VideoFrame;

    fn encode(&mut self, input: &VideoFrame, force_keyframe: bool) -> Result<EncodedFrame, MediaError> {
        if input.bytes.is_empty() {
            return Err(MediaError::Codec("empty picture".into()));
        }
        let keyframe = force_keyframe || self.frames_since_key + 1 >= self.settings.keyint.max(1);
        self.frames_since_key = if keyframe { 0 } else { self.frames_since_key + 1 };

        let len = self.slice_len(keyframe);
        let mut slice = Vec::with_capacity(len);
        slice.push(if keyframe { NAL_IDR } else { NAL_SLICE });
        slice.extend(input.bytes.iter().cycle().take(len - 1).map(|b| b | 0x01));

        let nalus: Vec<Vec<u8>> = if keyframe {
            let (w, h) = (input.width.to_be_bytes(), input.height.to_be_bytes());
            vec![
                vec![NAL_SPS, 0x42, 0x00, 0x1F, w[2], w[3], h[2], h[3]],
                vec![NAL_PPS, 0xCE, 0x3C, 0x80],
                slice,
            ]
        } else {
            vec![slice]
        };
        Ok(EncodedFrame::new(build_annexb(&nalus), keyframe))
    }

    fn configure(&mut self, settings: EncoderSettings) {
        self.settings = settings;
    }
}

/// What the test-pattern decoder recovers from one access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPattern {
    pub nal_types: Vec<u8>,
    pub keyframe: bool,
    /// From the SPS, when present.
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Default)]
pub struct TestPatternDecoder;

impl Decoder for TestPatternDecoder {
    type Output = DecodedPattern;

    fn decode(&mut self, data: &[u8]) -> Result<DecodedPattern, MediaError> {
        let nalus = split_annexb_nalus(data);
        if nalus.is_empty() {
            return Err(MediaError::Codec("no NAL units".into()));
        }
        let nal_types: Vec<u8> = nalus.iter().filter_map(|n| n.first()).map(|h| h & 0x1F).collect();
        let dimensions = nalus
            .iter()
            .find(|n| n.len() >= 8 && n[0] & 0x1F == NAL_SPS & 0x1F)
            .map(|n| {
                (
                    u32::from(u16::from_be_bytes([n[4], n[5]])),
                    u32::from(u16::from_be_bytes([n[6], n[7]])),
                )
            });
        Ok(DecodedPattern {
            keyframe: nal_types.contains(&(NAL_IDR & 0x1F)),
            nal_types,
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn keyframes_carry_parameter_sets_and_decode_back() {
        let mut enc = TestPatternEncoder::new(EncoderSettings::for_bitrate(1_000_000));
        let frame = VideoFrame::synthetic(64, 48, 3);
        let key = enc.encode(&frame, true).unwrap();
        assert!(key.keyframe);
        assert_eq!(&key.data[..4], &[0, 0, 0, 1]);

        let decoded = TestPatternDecoder.decode(&key.data).unwrap();
        assert_eq!(decoded.nal_types, vec![7, 8, 5]);
        assert!(decoded.keyframe);
        assert_eq!(decoded.dimensions, Some((64, 48)));

        let delta = enc.encode(&frame, false).unwrap();
        assert!(!delta.keyframe);
        assert!(delta.data.len() < key.data.len());
        assert_eq!(TestPatternDecoder.decode(&delta.data).unwrap().nal_types, vec![1]);
    }

    #[test]
    fn keyint_forces_periodic_keyframes_and_bitrate_sets_size() {
        let mut enc = TestPatternEncoder::new(EncoderSettings {
            bitrate_bps: 240_000,
            fps: 20,
            keyint: 3,
        });
        let frame = VideoFrame::synthetic(8, 8, 0);
        let kinds: Vec<bool> = (0..6).map(|_| enc.encode(&frame, false).unwrap().keyframe).collect();
        assert_eq!(kinds, vec![false, false, true, false, false, true]);

        let small = enc.encode(&frame, false).unwrap().data.len();
        enc.configure(EncoderSettings {
            bitrate_bps: 2_400_000,
            fps: 20,
            keyint: 100,
        });
        let big = enc.encode(&frame, false).unwrap().data.len();
        assert!(big > small * 5);
    }
}
