use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    block_codec::BlockCodec,
    fec_decoder::{FecBlockDecoder, RecoveredPacket},
    fec_error::FecError,
    fec_header::FecHeader,
};

/// How long a block stays useful for recovery.
pub const DEFAULT_FEC_WINDOW: Duration = Duration::from_millis(500);

/// Receive side of one protected stream: an independent decoder per RTP
/// timestamp (one per frame).
pub struct FecReceiver {
    codec: Arc<dyn BlockCodec>,
    sessions: HashMap<u32, FecBlockDecoder>,
    window: Duration,
}

impl FecReceiver {
    pub fn new(codec: Arc<dyn BlockCodec>) -> Self {
        Self {
            codec,
            sessions: HashMap::new(),
            window: DEFAULT_FEC_WINDOW,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn on_media(&mut self, timestamp: u32, block_offset: u32, payload: &[u8], now: Instant) {
        self.sessions
            .entry(timestamp)
            .or_insert_with(|| FecBlockDecoder::new(now))
            .add_source(block_offset, payload);
    }

    /// Feeds one repair packet payload. A rejected symbol never opens a
    /// session of its own.
    ///
    /// # Errors
    /// Malformed FEC header, `BlockTooLarge` for a block the codec could
    /// never decode, or a symbol inconsistent with its block.
    pub fn on_repair(&mut self, timestamp: u32, payload: &[u8], now: Instant) -> Result<(), FecError> {
        let (hdr, data) = FecHeader::decode(payload)?;
        let max = self.codec.max_symbols();
        let total = usize::from(hdr.total_count);
        if total > max {
            return Err(FecError::BlockTooLarge {
                symbols: total,
                max,
            });
        }
        let session = self
            .sessions
            .entry(timestamp)
            .or_insert_with(|| FecBlockDecoder::new(now));
        let added = session.add_repair(&hdr, data);
        if added.is_err() && session.is_empty() {
            self.sessions.remove(&timestamp);
        }
        added
    }

    pub fn has_repairs(&self, timestamp: u32) -> bool {
        self.sessions
            .get(&timestamp)
            .is_some_and(|s| s.repair_count() > 0)
    }

    /// Attempts recovery of the frame at `timestamp`. The session is closed
    /// unless the attempt failed for lack of symbols.
    ///
    /// # Errors
    /// `Unrecoverable` while too few symbols have arrived; the session is
    /// kept so later symbols can still complete it. Any other error is
    /// final.
    pub fn recover(&mut self, timestamp: u32) -> Result<Vec<RecoveredPacket>, FecError> {
        let Some(session) = self.sessions.get(&timestamp) else {
            return Err(FecError::Unrecoverable {
                received: 0,
                needed: 0,
            });
        };
        match session.try_recover(self.codec.as_ref()) {
            Err(e @ FecError::Unrecoverable { .. }) => Err(e),
            other => {
                self.sessions.remove(&timestamp);
                other
            }
        }
    }

    /// Forgets a frame that completed without help.
    pub fn complete(&mut self, timestamp: u32) {
        self.sessions.remove(&timestamp);
    }

    /// Drops blocks older than the window; returns their timestamps.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<u32> {
        let window = self.window;
        let expired: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.created()) > window)
            .map(|(&ts, _)| ts)
            .collect();
        for ts in &expired {
            self.sessions.remove(ts);
        }
        expired
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::fec::{
        cauchy_codec::CauchyBlockCodec, fec_config::FecConfig, fec_encoder::FecEncoder,
        source_block::SourceBlockBuilder,
    };

    #[test]
    fn sessions_are_independent_per_timestamp() {
        let codec: Arc<dyn BlockCodec> = Arc::new(CauchyBlockCodec::new());
        let enc = FecEncoder::new(FecConfig::new(0.5, 64).unwrap(), codec.clone());
        let mut rx = FecReceiver::new(codec);
        let now = Instant::now();

        let mut b = SourceBlockBuilder::new();
        let off0 = b.push(&[7; 50]);
        let _off1 = b.push(&[8; 50]);
        let repairs = enc.encode(&b.finish(), 100).unwrap();

        rx.on_media(3000, off0, &[7; 50], now);
        // a different frame's repair must not help frame 3000
        rx.on_repair(6000, &repairs[0].to_payload(), now).unwrap();
        assert!(rx.recover(3000).is_err());

        for r in &repairs {
            rx.on_repair(3000, &r.to_payload(), now).unwrap();
        }
        let rec = rx.recover(3000).unwrap();
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].payload, vec![8; 50]);
        assert_eq!(rec[0].sequence_number, 101);
        assert!(rec[0].last);
        assert_eq!(rx.session_count(), 1);
    }

    #[test]
    fn stale_blocks_are_dropped() {
        let mut rx = FecReceiver::new(Arc::new(CauchyBlockCodec::new()))
            .with_window(Duration::from_millis(500));
        let t0 = Instant::now();
        rx.on_media(1, 0, &[1], t0);
        assert!(rx.evict_expired(t0 + Duration::from_millis(400)).is_empty());
        assert_eq!(rx.evict_expired(t0 + Duration::from_millis(600)), vec![1]);
        assert_eq!(rx.session_count(), 0);
    }

    #[test]
    fn blocks_beyond_the_codec_never_open_a_session() {
        let codec = Arc::new(CauchyBlockCodec::new());
        let mut rx = FecReceiver::new(codec.clone());
        let now = Instant::now();
        let mut payload = Vec::new();
        FecHeader {
            symbol_id: 0,
            source_count: 60_000,
            total_count: 60_000,
            block_len: 84_000_000,
            base_seq: 0,
        }
        .encode_into(&mut payload);
        payload.extend_from_slice(&[0; 1400]);
        assert_eq!(
            rx.on_repair(1, &payload, now),
            Err(FecError::BlockTooLarge {
                symbols: 60_000,
                max: codec.max_symbols(),
            })
        );
        assert_eq!(rx.session_count(), 0);
        assert!(!rx.has_repairs(1));
    }

    #[test]
    fn a_mismatched_symbol_does_not_keep_an_empty_session() {
        let mut rx = FecReceiver::new(Arc::new(CauchyBlockCodec::new()));
        let mut payload = Vec::new();
        FecHeader {
            symbol_id: 1,
            source_count: 1,
            total_count: 2,
            block_len: 84_000_000,
            base_seq: 0,
        }
        .encode_into(&mut payload);
        payload.extend_from_slice(&[0; 100]);
        assert!(rx.on_repair(1, &payload, Instant::now()).is_err());
        assert_eq!(rx.session_count(), 0);
    }

    #[test]
    fn a_corrupt_block_is_dropped_after_one_attempt() {
        let codec: Arc<dyn BlockCodec> = Arc::new(CauchyBlockCodec::new());
        let enc = FecEncoder::new(FecConfig::new(0.5, 64).unwrap(), codec.clone());
        // not a sequence of length-prefixed entries
        let repairs = enc.encode(&[0xFF; 64], 0).unwrap();
        let mut rx = FecReceiver::new(codec);
        for r in &repairs {
            rx.on_repair(7, &r.to_payload(), Instant::now()).unwrap();
        }
        assert_eq!(rx.recover(7), Err(FecError::MalformedSourceBlock));
        assert_eq!(rx.session_count(), 0);
    }
}
