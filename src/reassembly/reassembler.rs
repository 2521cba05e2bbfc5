//! Per-SSRC frame reassembly from possibly reordered and lossy fragments.
//!
//! Fragments are held by sequence number. Whenever the end of a unit is
//! known, the reassembler scans backward from it: a missing sequence number
//! is a gap, a start fragment closes the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    fragmentation_state::{FragmentationState, HeldFragment},
    reassembled_unit::ReassembledUnit,
    reassembly_outcome::{DropReason, ReassemblyOutcome},
};
use crate::{
    log::log_sink::LogSink,
    rtp::{
        RtpPacket,
        payload::{
            PayloadCodec, PayloadFraming,
            av1_payload::{Av1Payload, join_av1},
            h264_packetizer::build_annexb,
            h264_payload::{H264Payload, join_fu_a},
        },
        rtp_error::RtpError,
    },
    sink_debug, sink_warn,
};

pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(1000);

/// One received fragment, classified.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub ssrc: u32,
    pub seq: u16,
    pub timestamp: u32,
    pub marker: bool,
    pub block_offset: Option<u32>,
    pub framing: PayloadFraming,
}

impl Fragment {
    /// # Errors
    /// The codec's `InvalidPayload` error for an unparsable payload.
    pub fn from_packet(pkt: &RtpPacket, codec: PayloadCodec) -> Result<Self, RtpError> {
        Ok(Self {
            ssrc: pkt.ssrc(),
            seq: pkt.sequence_number(),
            timestamp: pkt.timestamp(),
            marker: pkt.marker(),
            block_offset: pkt.block_offset(),
            framing: PayloadFraming::parse(codec, &pkt.payload)?,
        })
    }
}

pub struct Reassembler {
    streams: HashMap<u32, FragmentationState>,
    timeout: Duration,
    logger: Arc<dyn LogSink>,
}

impl Reassembler {
    pub fn new(timeout: Duration, logger: Arc<dyn LogSink>) -> Self {
        Self {
            streams: HashMap::new(),
            timeout,
            logger,
        }
    }

    pub fn insert(&mut self, frag: Fragment, now: Instant) -> ReassemblyOutcome {
        let state = self.streams.entry(frag.ssrc).or_default();
        state.touch(now);
        let seq = frag.seq;

        if state.is_consumed(seq) {
            sink_warn!(
                self.logger,
                "[Reassembler] duplicate of emitted fragment ssrc={} seq={}, dropped",
                frag.ssrc,
                seq
            );
            return ReassemblyOutcome::Dropped(DropReason::AlreadyConsumed);
        }

        if frag.framing.is_complete() {
            state.discard_run(seq, seq);
            state.mark_consumed(seq);
            let unit = build_unit(
                frag.ssrc,
                seq,
                seq,
                vec![HeldFragment {
                    framing: frag.framing,
                    timestamp: frag.timestamp,
                    marker: frag.marker,
                    block_offset: frag.block_offset,
                    arrival: now,
                }],
            );
            return self.finish(unit);
        }

        let is_end = frag.framing.is_end();
        let ssrc = frag.ssrc;
        let replaced = state.insert(
            seq,
            HeldFragment {
                framing: frag.framing,
                timestamp: frag.timestamp,
                marker: frag.marker,
                block_offset: frag.block_offset,
                arrival: now,
            },
        );
        if replaced {
            sink_warn!(
                self.logger,
                "[Reassembler] duplicate fragment ssrc={} seq={}, keeping the latest",
                ssrc,
                seq
            );
        }

        let end_seq = if is_end {
            seq
        } else {
            match find_end_after(state, seq) {
                Some(e) => e,
                None => return ReassemblyOutcome::Pending,
            }
        };
        self.scan_back(ssrc, end_seq, is_end)
    }

    fn scan_back(&mut self, ssrc: u32, end_seq: u16, report_gap: bool) -> ReassemblyOutcome {
        let Some(state) = self.streams.get_mut(&ssrc) else {
            return ReassemblyOutcome::Pending;
        };
        let Some(timestamp) = state.get(end_seq).map(|f| f.timestamp) else {
            return ReassemblyOutcome::Pending;
        };

        let mut cur = end_seq;
        for _ in 0..=state.len() {
            let Some(f) = state.get(cur) else {
                return if report_gap {
                    ReassemblyOutcome::Gap {
                        ssrc,
                        timestamp,
                        missing_seq: cur,
                    }
                } else {
                    ReassemblyOutcome::Pending
                };
            };
            let crossed_end = cur != end_seq && f.framing.is_end();
            if f.timestamp != timestamp || crossed_end {
                let dropped = state.discard_run(cur.wrapping_add(1), end_seq);
                sink_warn!(
                    self.logger,
                    "[Reassembler] run ssrc={} seq {}..={} has no start fragment, dropped {}",
                    ssrc,
                    cur.wrapping_add(1),
                    end_seq,
                    dropped
                );
                return ReassemblyOutcome::Dropped(DropReason::InvalidRun);
            }
            if f.framing.is_start() {
                let run = state.take_run(cur, end_seq);
                let unit = build_unit(ssrc, cur, end_seq, run);
                return self.finish(unit);
            }
            cur = cur.wrapping_sub(1);
        }
        ReassemblyOutcome::Pending
    }

    fn finish(&self, unit: Result<ReassembledUnit, RtpError>) -> ReassemblyOutcome {
        match unit {
            Ok(u) => ReassemblyOutcome::Complete(u),
            Err(e) => {
                sink_warn!(self.logger, "[Reassembler] dropping unit: {}", e);
                ReassemblyOutcome::Dropped(DropReason::InvalidRun)
            }
        }
    }

    /// Evicts fragments held longer than the timeout; returns how many.
    /// Streams left empty and silent for a whole timeout are forgotten.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(self.timeout) else {
            return 0;
        };
        let evicted: usize = self
            .streams
            .values_mut()
            .map(|s| s.evict_older_than(cutoff))
            .sum();
        if evicted > 0 {
            sink_debug!(self.logger, "[Reassembler] evicted {} stale fragments", evicted);
        }
        let before = self.streams.len();
        self.streams.retain(|_, s| !s.is_idle_since(cutoff));
        if self.streams.len() < before {
            sink_debug!(
                self.logger,
                "[Reassembler] forgot {} idle streams",
                before - self.streams.len()
            );
        }
        evicted
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Timestamps of `ssrc` whose fragments have waited at least `age`.
    pub fn stale_timestamps(&self, ssrc: u32, now: Instant, age: Duration) -> Vec<u32> {
        let Some(state) = self.streams.get(&ssrc) else {
            return Vec::new();
        };
        state
            .pending_timestamps()
            .into_iter()
            .filter(|&ts| {
                state
                    .oldest_arrival(ts)
                    .is_some_and(|t| now.saturating_duration_since(t) >= age)
            })
            .collect()
    }

    pub fn held(&self, ssrc: u32) -> usize {
        self.streams.get(&ssrc).map_or(0, FragmentationState::len)
    }

    pub fn is_held(&self, ssrc: u32, seq: u16) -> bool {
        self.streams
            .get(&ssrc)
            .is_some_and(|s| s.get(seq).is_some())
    }

    pub fn is_consumed(&self, ssrc: u32, seq: u16) -> bool {
        self.streams
            .get(&ssrc)
            .is_some_and(|s| s.is_consumed(seq))
    }
}

/// Walks forward over held fragments looking for the run's end.
fn find_end_after(state: &FragmentationState, seq: u16) -> Option<u16> {
    let mut cur = seq;
    for _ in 0..state.len() {
        cur = cur.wrapping_add(1);
        let f = state.get(cur)?;
        if f.framing.is_start() {
            return None;
        }
        if f.framing.is_end() {
            return Some(cur);
        }
    }
    None
}

fn build_unit(
    ssrc: u32,
    first_seq: u16,
    last_seq: u16,
    run: Vec<HeldFragment>,
) -> Result<ReassembledUnit, RtpError> {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return Err(RtpError::InvalidPayload("empty fragment run"));
    };
    let codec = first.framing.codec();
    let (timestamp, block_offset, marker) = (first.timestamp, first.block_offset, last.marker);

    let data = match codec {
        PayloadCodec::H264 => {
            let parts: Vec<&H264Payload> = run
                .iter()
                .filter_map(|f| match &f.framing {
                    PayloadFraming::H264(p) => Some(p),
                    _ => None,
                })
                .collect();
            if parts.len() != run.len() {
                return Err(RtpError::InvalidPayload("mixed codecs in one run"));
            }
            match parts.as_slice() {
                [H264Payload::Single(nal)] => build_annexb(&[nal]),
                [H264Payload::StapA(nalus)] => build_annexb(nalus),
                _ => build_annexb(&[join_fu_a(parts.iter().copied())?]),
            }
        }
        PayloadCodec::Av1 => {
            let parts: Vec<&Av1Payload> = run
                .iter()
                .filter_map(|f| match &f.framing {
                    PayloadFraming::Av1(p) => Some(p),
                    _ => None,
                })
                .collect();
            if parts.len() != run.len() {
                return Err(RtpError::InvalidPayload("mixed codecs in one run"));
            }
            join_av1(parts.iter().copied())?
        }
        PayloadCodec::Generic => run
            .iter()
            .filter_map(|f| match &f.framing {
                PayloadFraming::Generic(p) => Some(p.as_slice()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .concat(),
    };

    Ok(ReassembledUnit {
        ssrc,
        timestamp,
        codec,
        first_seq,
        last_seq,
        marker,
        block_offset,
        data,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::log::{MemoryLogSink, NoopLogSink, log_level::LogLevel};
    use crate::rtp::payload::h264_packetizer::H264Packetizer;

    fn h264_frags(seq0: u16, ts: u32, nal: &[u8], mtu: usize) -> Vec<Fragment> {
        let chunks = H264Packetizer::new(mtu).packetize(&build_annexb(&[nal]));
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| Fragment {
                ssrc: 1,
                seq: seq0.wrapping_add(i as u16),
                timestamp: ts,
                marker: c.marker,
                block_offset: None,
                framing: PayloadFraming::parse(PayloadCodec::H264, &c.bytes).unwrap(),
            })
            .collect()
    }

    fn nal(len: usize) -> Vec<u8> {
        let mut v = vec![0x65];
        v.extend((0..len).map(|i| (i % 251) as u8 + 1));
        v
    }

    fn reassembler() -> Reassembler {
        Reassembler::new(DEFAULT_REASSEMBLY_TIMEOUT, Arc::new(NoopLogSink))
    }

    #[test]
    fn out_of_order_fragments_complete_once() {
        let n = nal(100);
        let frags = h264_frags(65_534, 9000, &n, 40);
        assert!(frags.len() >= 4);
        let mut r = reassembler();
        let now = Instant::now();
        let mut order: Vec<usize> = (0..frags.len()).rev().collect();
        order.swap(0, 1);
        let mut completed = Vec::new();
        for i in order {
            if let ReassemblyOutcome::Complete(u) = r.insert(frags[i].clone(), now) {
                completed.push(u);
            }
        }
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].data, build_annexb(&[&n]));
        assert_eq!(completed[0].first_seq, 65_534);
        assert_eq!(r.held(1), 0);
    }

    #[test]
    fn missing_fragment_reports_gap_and_never_completes() {
        let frags = h264_frags(10, 1, &nal(100), 40);
        let mut r = reassembler();
        let now = Instant::now();
        let last = frags.len() - 1;
        let mut outcomes = Vec::new();
        for (i, f) in frags.iter().enumerate() {
            if i != 1 {
                outcomes.push(r.insert(f.clone(), now));
            }
        }
        assert!(!outcomes
            .iter()
            .any(|o| matches!(o, ReassemblyOutcome::Complete(_))));
        assert_eq!(
            outcomes[last - 1],
            ReassemblyOutcome::Gap {
                ssrc: 1,
                timestamp: 1,
                missing_seq: 11
            }
        );
    }

    #[test]
    fn duplicate_fragment_warns_and_emits_once() {
        let sink = Arc::new(MemoryLogSink::new());
        let mut r = Reassembler::new(DEFAULT_REASSEMBLY_TIMEOUT, sink.clone());
        let frags = h264_frags(0, 1, &nal(60), 40);
        let now = Instant::now();
        let mut completed = 0;
        for f in frags.iter().chain(frags.iter()) {
            if matches!(r.insert(f.clone(), now), ReassemblyOutcome::Complete(_)) {
                completed += 1;
            }
        }
        let before_end = frags.len() - 1;
        let mut r2 = reassembler();
        for f in &frags[..before_end] {
            r2.insert(f.clone(), now);
        }
        // same seq twice before completion: last write wins
        r2.insert(frags[0].clone(), now);
        assert!(matches!(
            r2.insert(frags[before_end].clone(), now),
            ReassemblyOutcome::Complete(_)
        ));
        assert_eq!(completed, 1);
        if cfg!(feature = "log-warn") {
            assert!(sink.count(LogLevel::Warn, "duplicate") >= frags.len());
        }
    }

    #[test]
    fn single_nal_is_emitted_immediately_and_duplicate_dropped() {
        let frags = h264_frags(5, 1, &[0x41, 1, 2, 3], 1200);
        assert_eq!(frags.len(), 1);
        let mut r = reassembler();
        let now = Instant::now();
        assert!(matches!(
            r.insert(frags[0].clone(), now),
            ReassemblyOutcome::Complete(_)
        ));
        assert_eq!(
            r.insert(frags[0].clone(), now),
            ReassemblyOutcome::Dropped(DropReason::AlreadyConsumed)
        );
    }

    #[test]
    fn crossing_another_end_drops_the_run() {
        let a = h264_frags(0, 1, &nal(100), 40);
        let tail = a.len() as u16 - 1;
        // second unit overlaps the first unit's end seq, so its own start is never seen
        let b = h264_frags(tail, 1, &nal(100), 40);
        let mut r = reassembler();
        let now = Instant::now();
        r.insert(a[a.len() - 1].clone(), now);
        for f in &b[1..b.len() - 1] {
            assert_eq!(r.insert(f.clone(), now), ReassemblyOutcome::Pending);
        }
        assert_eq!(
            r.insert(b[b.len() - 1].clone(), now),
            ReassemblyOutcome::Dropped(DropReason::InvalidRun)
        );
        assert_eq!(r.held(1), 1);
    }

    #[test]
    fn stale_fragments_are_evicted() {
        let frags = h264_frags(0, 1, &nal(100), 40);
        let mut r = reassembler();
        let t0 = Instant::now();
        r.insert(frags[0].clone(), t0);
        r.insert(frags[1].clone(), t0 + Duration::from_millis(600));
        assert_eq!(r.stale_timestamps(1, t0 + Duration::from_millis(700), Duration::from_millis(500)), vec![1]);
        assert_eq!(r.evict_expired(t0 + Duration::from_millis(1100)), 1);
        assert_eq!(r.held(1), 1);
    }

    #[test]
    fn idle_streams_are_forgotten() {
        let mut r = reassembler();
        let t0 = Instant::now();
        for ssrc in 0..10_000u32 {
            let mut f = h264_frags(0, 1, &nal(100), 40).remove(0);
            f.ssrc = ssrc;
            r.insert(f, t0);
        }
        assert_eq!(r.stream_count(), 10_000);
        r.evict_expired(t0 + Duration::from_millis(500));
        assert_eq!(r.stream_count(), 10_000);
        r.evict_expired(t0 + Duration::from_secs(3600));
        assert_eq!(r.stream_count(), 0);
    }

    #[test]
    fn a_recently_completed_stream_is_kept() {
        let mut r = reassembler();
        let t0 = Instant::now();
        let late = t0 + Duration::from_millis(900);
        for f in h264_frags(0, 1, &nal(60), 40) {
            r.insert(f, late);
        }
        assert_eq!(r.held(1), 0);
        r.evict_expired(t0 + DEFAULT_REASSEMBLY_TIMEOUT + Duration::from_millis(100));
        assert_eq!(r.stream_count(), 1);
        assert!(r.is_consumed(1, 0));
    }
}
