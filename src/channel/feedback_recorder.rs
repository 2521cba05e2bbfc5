//! Receive-side arrival log that builds RFC 8888 congestion control
//! feedback for every incoming SSRC.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::rtcp::congestion_feedback::{
    ATO_UNAVAILABLE, CongestionControlFeedback, Ecn, PacketReport, StreamFeedback,
};
use crate::rtp::seq_ext::SeqUnwrapper;

/// Packets described per SSRC in one report at most; older ones are skipped.
pub const MAX_REPORTED_PER_STREAM: i64 = 1024;

/// A stream with nothing to report that has been silent this long is dropped.
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct StreamArrivals {
    unwrapper: SeqUnwrapper,
    next_to_report: Option<i64>,
    arrivals: BTreeMap<i64, Instant>,
    last_arrival: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct FeedbackRecorder {
    streams: HashMap<u32, StreamArrivals>,
}

fn arrival_offset(report_time: Instant, arrival: Instant) -> Option<u16> {
    let d: Duration = report_time.saturating_duration_since(arrival);
    let ticks = d.as_micros() * 1024 / 1_000_000;
    u16::try_from(ticks).ok().filter(|&t| t < ATO_UNAVAILABLE)
}

impl FeedbackRecorder {
    pub fn record(&mut self, ssrc: u32, seq: u16, arrival: Instant) {
        let stream = self.streams.entry(ssrc).or_default();
        stream.last_arrival = Some(arrival);
        let n = stream.unwrapper.unwrap(seq);
        if stream.next_to_report.is_some_and(|next| n < next) {
            // already reported as lost
            return;
        }
        stream.arrivals.entry(n).or_insert(arrival);
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn has_pending(&self) -> bool {
        self.streams.values().any(|s| !s.arrivals.is_empty())
    }

    /// Describes every packet since the previous report, lost ones included,
    /// relative to `now`. `None` when nothing arrived.
    pub fn build(
        &mut self,
        sender_ssrc: u32,
        now: Instant,
        report_timestamp: u32,
    ) -> Option<CongestionControlFeedback> {
        self.streams.retain(|_, s| {
            !s.arrivals.is_empty()
                || s.last_arrival
                    .is_some_and(|t| now.saturating_duration_since(t) < STREAM_IDLE_TIMEOUT)
        });

        let mut blocks = Vec::new();
        let mut ssrcs: Vec<u32> = self.streams.keys().copied().collect();
        ssrcs.sort_unstable();

        for ssrc in ssrcs {
            let Some(stream) = self.streams.get_mut(&ssrc) else {
                continue;
            };
            let (Some((&first, _)), Some((&last, _))) =
                (stream.arrivals.first_key_value(), stream.arrivals.last_key_value())
            else {
                continue;
            };
            let begin = stream
                .next_to_report
                .unwrap_or(first)
                .max(last - MAX_REPORTED_PER_STREAM + 1);
            let reports: Vec<PacketReport> = (begin..=last)
                .map(|n| {
                    let seq = (n & 0xFFFF) as u16;
                    match stream.arrivals.get(&n) {
                        Some(&t) => PacketReport::received(seq, arrival_offset(now, t), Ecn::NotEct),
                        None => PacketReport::lost(seq),
                    }
                })
                .collect();
            stream.arrivals.clear();
            stream.next_to_report = Some(last + 1);
            blocks.push(StreamFeedback::new(ssrc, reports));
        }

        if blocks.is_empty() {
            return None;
        }
        Some(CongestionControlFeedback::new(sender_ssrc, blocks, report_timestamp))
    }
}
