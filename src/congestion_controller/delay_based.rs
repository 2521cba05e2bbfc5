use std::time::{Duration, Instant};

use super::{
    aimd_rate_control::AimdRateControl,
    bandwidth_usage::{BandwidthUsage, EstimatorState},
    sent_packet::TransportFeedback,
    trendline::TrendlineEstimator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBasedResult {
    pub updated: bool,
    pub target_bps: u64,
    pub state: EstimatorState,
    /// Set on the report that leaves overuse.
    pub recovered_from_overuse: bool,
    pub probe_applied: bool,
}

#[derive(Debug)]
pub struct DelayBasedBwe {
    trendline: TrendlineEstimator,
    rate: AimdRateControl,
    state: EstimatorState,
}

impl DelayBasedBwe {
    pub fn new(start_bps: u64, min_bps: u64, max_bps: u64) -> Self {
        Self {
            trendline: TrendlineEstimator::new(),
            rate: AimdRateControl::new(start_bps, min_bps, max_bps),
            state: EstimatorState::Normal,
        }
    }

    pub fn set_rtt(&mut self, rtt: Duration) {
        self.rate.set_rtt(rtt);
    }

    pub fn estimate_bps(&self) -> u64 {
        self.rate.current_bps()
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    pub fn usage(&self) -> BandwidthUsage {
        self.trendline.usage()
    }

    /// Runs one feedback report through the detector and rate control.
    ///
    /// A probe result above the current estimate replaces it unless the
    /// link is overusing.
    pub fn incoming(
        &mut self,
        feedback: &TransportFeedback,
        acked_bps: Option<u64>,
        probe_bps: Option<u64>,
        now: Instant,
    ) -> DelayBasedResult {
        let mut any = false;
        for p in feedback.received() {
            if let Some(recv) = p.recv_time {
                self.trendline.update(p.sent.send_time, recv);
                any = true;
            }
        }
        let prev = self.state;
        if !any {
            return DelayBasedResult {
                updated: false,
                target_bps: self.rate.current_bps(),
                state: prev,
                recovered_from_overuse: false,
                probe_applied: false,
            };
        }

        let usage = self.trendline.usage();
        let mut probe_applied = false;
        let mut decreased = false;
        match probe_bps {
            Some(p) if usage != BandwidthUsage::Overusing && p > self.rate.current_bps() => {
                self.rate.set_estimate(p, now);
                probe_applied = true;
            }
            _ => {
                decreased = self.rate.update(usage, acked_bps, now).1;
            }
        }

        self.state = match usage {
            BandwidthUsage::Overusing if decreased => EstimatorState::Decreasing,
            BandwidthUsage::Overusing => EstimatorState::Overusing,
            _ => EstimatorState::Normal,
        };

        DelayBasedResult {
            updated: true,
            target_bps: self.rate.current_bps(),
            state: self.state,
            recovered_from_overuse: prev != EstimatorState::Normal
                && self.state == EstimatorState::Normal,
            probe_applied,
        }
    }
}
