use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::rtp::seq_ext::SeqUnwrapper;

/// Most sequence numbers kept on the missing list.
pub const MAX_MISSING: usize = 256;
/// NACKs sent per missing packet before giving up on it.
pub const MAX_NACK_RETRIES: u8 = 3;
const MIN_RESEND_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy)]
struct Missing {
    seq: u16,
    last_sent: Option<Instant>,
    retries: u8,
}

/// Tracks gaps in one incoming media stream for Generic NACK requests.
#[derive(Debug, Default)]
pub struct NackTracker {
    unwrapper: SeqUnwrapper,
    highest: Option<i64>,
    missing: BTreeMap<i64, Missing>,
}

impl NackTracker {
    /// Records an arrival. Returns true when it revealed new gaps.
    pub fn on_packet(&mut self, seq: u16) -> bool {
        let unwrapped = self.unwrapper.unwrap(seq);
        let Some(highest) = self.highest else {
            self.highest = Some(unwrapped);
            return false;
        };
        if unwrapped <= highest {
            self.missing.remove(&unwrapped);
            return false;
        }
        let first_missing = (highest + 1).max(unwrapped - MAX_MISSING as i64);
        for n in first_missing..unwrapped {
            self.missing.insert(
                n,
                Missing {
                    seq: (n & 0xFFFF) as u16,
                    last_sent: None,
                    retries: 0,
                },
            );
        }
        self.highest = Some(unwrapped);
        while self.missing.len() > MAX_MISSING {
            self.missing.pop_first();
        }
        first_missing < unwrapped
    }

    /// Sequence numbers to request now. Each one is re-requested at most
    /// once per `rtt` and dropped after [`MAX_NACK_RETRIES`].
    pub fn take_due(&mut self, now: Instant, rtt: Duration) -> Vec<u16> {
        let interval = rtt.max(MIN_RESEND_INTERVAL);
        let mut due = Vec::new();
        self.missing.retain(|_, m| {
            if m.retries >= MAX_NACK_RETRIES {
                return false;
            }
            if m.last_sent.is_none_or(|t| now.saturating_duration_since(t) >= interval) {
                m.last_sent = Some(now);
                m.retries += 1;
                due.push(m.seq);
            }
            true
        });
        due
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }
}
