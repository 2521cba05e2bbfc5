//! Groups reassembled units of one RTP timestamp into access units.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{access_unit::AccessUnit, reassembled_unit::ReassembledUnit};
use crate::{
    log::log_sink::LogSink,
    rtp::seq_ext::{is_newer_ts, seq_delta},
    sink_debug,
};

struct PendingFrame {
    units: Vec<ReassembledUnit>,
    first_arrival: Instant,
}

pub struct FrameAssembler {
    pending: HashMap<u32, PendingFrame>,
    last_emitted: Option<u32>,
    logger: Arc<dyn LogSink>,
}

impl FrameAssembler {
    pub fn new(logger: Arc<dyn LogSink>) -> Self {
        Self {
            pending: HashMap::new(),
            last_emitted: None,
            logger,
        }
    }

    /// Adds a unit; returns the access unit once its timestamp is complete.
    ///
    /// Units older than the last emitted access unit are discarded.
    pub fn push(&mut self, unit: ReassembledUnit, now: Instant) -> Option<AccessUnit> {
        let ts = unit.timestamp;
        if let Some(last) = self.last_emitted {
            if ts == last || is_newer_ts(last, ts) {
                sink_debug!(
                    self.logger,
                    "[FrameAssembler] late unit ts={} seq={}..={}, dropped",
                    ts,
                    unit.first_seq,
                    unit.last_seq
                );
                return None;
            }
        }

        let entry = self.pending.entry(ts).or_insert_with(|| PendingFrame {
            units: Vec::new(),
            first_arrival: now,
        });
        entry.units.retain(|u| u.first_seq != unit.first_seq);
        entry.units.push(unit);

        if !is_complete(&mut entry.units) {
            return None;
        }
        let frame = self.pending.remove(&ts)?;
        self.last_emitted = Some(ts);
        self.drop_older_than(ts);
        join(frame.units)
    }

    /// Forgets everything buffered for `timestamp`.
    pub fn discard(&mut self, timestamp: u32) -> bool {
        self.pending.remove(&timestamp).is_some()
    }

    /// Drops frames whose first unit arrived more than `timeout` ago.
    pub fn evict_expired(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, f| now.saturating_duration_since(f.first_arrival) < timeout);
        before - self.pending.len()
    }

    /// Timestamps of incomplete frames waiting at least `age`.
    pub fn stale_timestamps(&self, now: Instant, age: Duration) -> Vec<u32> {
        self.pending
            .iter()
            .filter(|(_, f)| now.saturating_duration_since(f.first_arrival) >= age)
            .map(|(&ts, _)| ts)
            .collect()
    }

    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    fn drop_older_than(&mut self, ts: u32) {
        let before = self.pending.len();
        self.pending.retain(|&other, _| is_newer_ts(other, ts));
        let dropped = before - self.pending.len();
        if dropped > 0 {
            sink_debug!(
                self.logger,
                "[FrameAssembler] dropped {} incomplete frames older than ts={}",
                dropped,
                ts
            );
        }
    }
}

/// Sorts `units` by sequence and checks marker, contiguity and the block start.
fn is_complete(units: &mut [ReassembledUnit]) -> bool {
    let Some(anchor) = units.first().map(|u| u.first_seq) else {
        return false;
    };
    units.sort_by_key(|u| seq_delta(u.first_seq, anchor));

    let (Some(first), Some(last)) = (units.first(), units.last()) else {
        return false;
    };
    if !last.marker || !matches!(first.block_offset, None | Some(0)) {
        return false;
    }
    units
        .windows(2)
        .all(|w| w[1].first_seq == w[0].last_seq.wrapping_add(1))
}

fn join(units: Vec<ReassembledUnit>) -> Option<AccessUnit> {
    let first = units.first()?;
    let (ssrc, timestamp, codec, first_seq) = (first.ssrc, first.timestamp, first.codec, first.first_seq);
    let last_seq = units.last().map_or(first_seq, |u| u.last_seq);
    let mut data = Vec::with_capacity(units.iter().map(|u| u.data.len()).sum());
    for u in units {
        data.extend_from_slice(&u.data);
    }
    Some(AccessUnit {
        ssrc,
        timestamp,
        codec,
        first_seq,
        last_seq,
        data,
    })
}
