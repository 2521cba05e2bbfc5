use std::time::{Duration, Instant};

use super::{
    bandwidth_usage::BandwidthUsage,
    constants::{AIMD_BETA, AIMD_INCREASE_PER_SECOND, DEFAULT_RTT},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateControlState {
    Hold,
    Increase,
}

/// Additive-increase/multiplicative-decrease rate control driven by the
/// trendline's usage signal.
#[derive(Debug)]
pub struct AimdRateControl {
    current_bps: u64,
    min_bps: u64,
    max_bps: u64,
    state: RateControlState,
    last_change: Option<Instant>,
    last_decrease: Option<Instant>,
    rtt: Duration,
}

impl AimdRateControl {
    pub fn new(start_bps: u64, min_bps: u64, max_bps: u64) -> Self {
        Self {
            current_bps: start_bps.clamp(min_bps, max_bps),
            min_bps,
            max_bps,
            state: RateControlState::Increase,
            last_change: None,
            last_decrease: None,
            rtt: DEFAULT_RTT,
        }
    }

    pub fn set_rtt(&mut self, rtt: Duration) {
        self.rtt = rtt;
    }

    pub fn current_bps(&self) -> u64 {
        self.current_bps
    }

    /// Jumps to `bps` (used for probe results).
    pub fn set_estimate(&mut self, bps: u64, now: Instant) {
        self.current_bps = bps.clamp(self.min_bps, self.max_bps);
        self.last_change = Some(now);
    }

    /// Applies one usage signal. Returns the new rate and whether it was cut.
    pub fn update(
        &mut self,
        usage: BandwidthUsage,
        acked_bps: Option<u64>,
        now: Instant,
    ) -> (u64, bool) {
        let mut decreased = false;
        match usage {
            BandwidthUsage::Overusing => {
                let may_decrease = self
                    .last_decrease
                    .is_none_or(|t| now.saturating_duration_since(t) >= self.rtt);
                if may_decrease {
                    let from_acked = acked_bps.map(|a| (a as f64 * AIMD_BETA).round() as u64);
                    let next = match from_acked {
                        Some(b) if b < self.current_bps => b,
                        _ => (self.current_bps as f64 * AIMD_BETA).round() as u64,
                    };
                    self.current_bps = next.max(self.min_bps);
                    self.last_decrease = Some(now);
                    decreased = true;
                }
                self.state = RateControlState::Hold;
                self.last_change = Some(now);
            }
            BandwidthUsage::Underusing => {
                self.state = RateControlState::Hold;
                self.last_change = Some(now);
            }
            BandwidthUsage::Normal => {
                if self.state == RateControlState::Hold {
                    self.state = RateControlState::Increase;
                    self.last_change = Some(now);
                } else {
                    self.increase(acked_bps, now);
                }
            }
        }
        (self.current_bps, decreased)
    }

    fn increase(&mut self, acked_bps: Option<u64>, now: Instant) {
        let elapsed = self
            .last_change
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t))
            .min(Duration::from_secs(1));
        self.last_change = Some(now);

        let grown = (self.current_bps as f64 * AIMD_INCREASE_PER_SECOND.powf(elapsed.as_secs_f64()))
            .ceil() as u64;
        // never run far ahead of what the receiver confirmed
        let bound = acked_bps.map_or(u64::MAX, |a| a.saturating_mul(3) / 2 + 10_000);
        let next = grown.min(bound).max(self.current_bps);
        self.current_bps = next.min(self.max_bps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overuse_cuts_to_share_of_acked_rate_once_per_rtt() {
        let t0 = Instant::now();
        let mut a = AimdRateControl::new(2_000_000, 100_000, 10_000_000);
        assert_eq!(
            a.update(BandwidthUsage::Overusing, Some(1_000_000), t0),
            (850_000, true)
        );
        let (bps, cut) = a.update(
            BandwidthUsage::Overusing,
            Some(1_000_000),
            t0 + Duration::from_millis(50),
        );
        assert_eq!((bps, cut), (850_000, false));
    }

    #[test]
    fn normal_usage_grows_without_exceeding_max() {
        let t0 = Instant::now();
        let mut a = AimdRateControl::new(1_000_000, 100_000, 1_050_000);
        let mut prev = a.current_bps();
        for i in 1..20u64 {
            let (bps, _) = a.update(BandwidthUsage::Normal, None, t0 + Duration::from_millis(i * 100));
            assert!(bps >= prev);
            prev = bps;
        }
        assert_eq!(prev, 1_050_000);
    }
}
