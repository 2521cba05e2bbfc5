use std::time::Instant;

use super::constants::{
    LOSS_HIGH_THRESHOLD, LOSS_INCREASE_FACTOR, LOSS_LOW_THRESHOLD, LOSS_UPDATE_INTERVAL,
};

/// Loss-driven bitrate bound, updated at most once per interval.
#[derive(Debug)]
pub struct LossBasedEstimator {
    estimate_bps: u64,
    lost: usize,
    expected: usize,
    last_update: Option<Instant>,
    last_loss: Option<f64>,
}

impl LossBasedEstimator {
    pub fn new(start_bps: u64) -> Self {
        Self {
            estimate_bps: start_bps,
            lost: 0,
            expected: 0,
            last_update: None,
            last_loss: None,
        }
    }

    pub fn on_feedback(&mut self, lost: usize, expected: usize) {
        self.lost += lost;
        self.expected += expected;
    }

    /// Applies the accumulated loss ratio when the interval has elapsed.
    ///
    /// Returns the ratio used, or `None` when no update happened.
    pub fn update(&mut self, now: Instant) -> Option<f64> {
        if self
            .last_update
            .is_some_and(|t| now.saturating_duration_since(t) < LOSS_UPDATE_INTERVAL)
        {
            return None;
        }
        if self.expected == 0 {
            return None;
        }
        let loss = self.lost as f64 / self.expected as f64;
        self.lost = 0;
        self.expected = 0;
        self.last_update = Some(now);
        self.last_loss = Some(loss);

        if loss < LOSS_LOW_THRESHOLD {
            self.estimate_bps = (self.estimate_bps as f64 * LOSS_INCREASE_FACTOR).round() as u64;
        } else if loss > LOSS_HIGH_THRESHOLD {
            self.estimate_bps = (self.estimate_bps as f64 * (1.0 - 0.5 * loss)).round() as u64;
        }
        Some(loss)
    }

    pub fn estimate_bps(&self) -> u64 {
        self.estimate_bps
    }

    /// Keeps the bound within reach of the other estimators.
    pub fn clamp(&mut self, min_bps: u64, max_bps: u64) {
        self.estimate_bps = self.estimate_bps.clamp(min_bps, max_bps);
    }

    /// True once measured loss is high enough to bound the target.
    pub fn is_limiting(&self) -> bool {
        self.last_loss.is_some_and(|l| l >= LOSS_LOW_THRESHOLD)
    }

    /// Lets the bound start from `bps` when loss is not limiting.
    pub fn follow(&mut self, bps: u64) {
        if !self.is_limiting() {
            self.estimate_bps = self.estimate_bps.max(bps);
        }
    }

    pub fn last_loss(&self) -> Option<f64> {
        self.last_loss
    }
}
