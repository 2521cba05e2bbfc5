//! Glue between an [`Encoder`] and the transport: applies bandwidth
//! estimates to the encoder and stamps frames with RTP timestamps.

use std::{sync::Arc, time::Instant};

use super::{
    codec::Encoder, encoder_settings::EncoderSettings, media_error::MediaError,
};
use crate::{
    channel::MediaKind,
    congestion_controller::BandwidthEstimate,
    log::log_sink::LogSink,
    session::{TransportError, TransportNegotiator},
    sink_debug, sink_info,
};

/// Anything that accepts encoded frames for one media line.
pub trait FrameSink {
    fn send_frame(&self, media: MediaKind, frame: &[u8], timestamp: u32) -> Result<usize, TransportError>;
}

impl FrameSink for TransportNegotiator {
    fn send_frame(&self, media: MediaKind, frame: &[u8], timestamp: u32) -> Result<usize, TransportError> {
        TransportNegotiator::send_frame(self, media, frame, timestamp)
    }
}

pub struct EncodingSender<E: Encoder> {
    encoder: E,
    media: MediaKind,
    clock_rate: u32,
    epoch: Instant,
    settings: Option<EncoderSettings>,
    keyframe_pending: bool,
    logger: Arc<dyn LogSink>,
}

impl<E: Encoder> EncodingSender<E> {
    pub fn new(encoder: E, media: MediaKind, logger: Arc<dyn LogSink>) -> Self {
        Self {
            encoder,
            media,
            clock_rate: media.clock_rate(),
            epoch: Instant::now(),
            settings: None,
            keyframe_pending: true,
            logger,
        }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn settings(&self) -> Option<EncoderSettings> {
        self.settings
    }

    /// Next frame is encoded as a keyframe.
    pub fn request_keyframe(&mut self) {
        self.keyframe_pending = true;
    }

    /// Reconfigures the encoder when the estimate moves it to new settings.
    /// Returns whether the encoder was touched.
    pub fn on_estimate(&mut self, estimate: &BandwidthEstimate) -> bool {
        let next = EncoderSettings::for_bitrate(estimate.target_bitrate_bps);
        if self.settings == Some(next) {
            return false;
        }
        sink_info!(
            self.logger,
            "[Encoder] {} -> {} bps, {} fps, keyint {}",
            self.media,
            next.bitrate_bps,
            next.fps,
            next.keyint
        );
        self.encoder.configure(next);
        self.settings = Some(next);
        true
    }

    /// Media-clock timestamp for a frame captured at `at`.
    pub fn rtp_timestamp(&self, at: Instant) -> u32 {
        let secs = at.saturating_duration_since(self.epoch).as_secs_f64();
        (secs * f64::from(self.clock_rate)) as u64 as u32
    }

    /// Encodes `input` and hands it to `sink`. A frame rejected by the
    /// transport keeps the keyframe request alive for the next one.
    pub fn send(&mut self, input: &E::Input, sink: &dyn FrameSink) -> Result<usize, MediaError> {
        let ts = self.rtp_timestamp(Instant::now());
        let frame = self.encoder.encode(input, self.keyframe_pending)?;
        let was_pending = self.keyframe_pending;
        self.keyframe_pending = false;
        match sink.send_frame(self.media, &frame.data, ts) {
            Ok(n) => {
                sink_debug!(
                    self.logger,
                    "[Encoder] {} frame ts={} key={} {} bytes in {} packets",
                    self.media,
                    ts,
                    frame.keyframe,
                    frame.data.len(),
                    n
                );
                Ok(n)
            }
            Err(e) => {
                self.keyframe_pending = was_pending || frame.keyframe;
                Err(e.into())
            }
        }
    }
}
