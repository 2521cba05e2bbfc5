use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use crate::rtp::payload::PayloadFraming;

/// How many emitted sequence numbers are remembered to reject late duplicates.
pub const CONSUMED_HISTORY: usize = 512;

#[derive(Debug, Clone)]
pub struct HeldFragment {
    pub framing: PayloadFraming,
    pub timestamp: u32,
    pub marker: bool,
    pub block_offset: Option<u32>,
    pub arrival: Instant,
}

/// Fragments held for one SSRC, keyed by sequence number.
#[derive(Debug, Default)]
pub struct FragmentationState {
    fragments: HashMap<u16, HeldFragment>,
    consumed: VecDeque<u16>,
    consumed_set: HashSet<u16>,
    last_arrival: Option<Instant>,
}

impl FragmentationState {
    pub fn touch(&mut self, now: Instant) {
        self.last_arrival = Some(now);
    }

    /// Nothing held and nothing received since `cutoff`.
    pub fn is_idle_since(&self, cutoff: Instant) -> bool {
        self.fragments.is_empty() && self.last_arrival.is_none_or(|t| t <= cutoff)
    }

    /// Stores `frag`; returns true when it replaced a held fragment.
    pub fn insert(&mut self, seq: u16, frag: HeldFragment) -> bool {
        self.fragments.insert(seq, frag).is_some()
    }

    pub fn get(&self, seq: u16) -> Option<&HeldFragment> {
        self.fragments.get(&seq)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn is_consumed(&self, seq: u16) -> bool {
        self.consumed_set.contains(&seq)
    }

    pub fn mark_consumed(&mut self, seq: u16) {
        if !self.consumed_set.insert(seq) {
            return;
        }
        self.consumed.push_back(seq);
        if self.consumed.len() > CONSUMED_HISTORY {
            if let Some(old) = self.consumed.pop_front() {
                self.consumed_set.remove(&old);
            }
        }
    }

    /// Removes `first..=last` (wrapping) and marks each as consumed.
    pub fn take_run(&mut self, first: u16, last: u16) -> Vec<HeldFragment> {
        let mut out = Vec::new();
        let mut seq = first;
        loop {
            if let Some(f) = self.fragments.remove(&seq) {
                out.push(f);
            }
            self.mark_consumed(seq);
            if seq == last {
                break;
            }
            seq = seq.wrapping_add(1);
        }
        out
    }

    /// Discards `first..=last` without marking them consumed.
    pub fn discard_run(&mut self, first: u16, last: u16) -> usize {
        let mut n = 0;
        let mut seq = first;
        loop {
            if self.fragments.remove(&seq).is_some() {
                n += 1;
            }
            if seq == last {
                break;
            }
            seq = seq.wrapping_add(1);
        }
        n
    }

    /// Drops fragments that arrived before `cutoff`.
    pub fn evict_older_than(&mut self, cutoff: Instant) -> usize {
        let before = self.fragments.len();
        self.fragments.retain(|_, f| f.arrival >= cutoff);
        before - self.fragments.len()
    }

    /// Timestamps that still have fragments held.
    pub fn pending_timestamps(&self) -> HashSet<u32> {
        self.fragments.values().map(|f| f.timestamp).collect()
    }

    /// Oldest arrival among held fragments of `timestamp`.
    pub fn oldest_arrival(&self, timestamp: u32) -> Option<Instant> {
        self.fragments
            .values()
            .filter(|f| f.timestamp == timestamp)
            .map(|f| f.arrival)
            .min()
    }
}
