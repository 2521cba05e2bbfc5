use std::time::Duration;

/// Pacing multiplier over the target bitrate, leaving room to drain bursts.
pub const PACING_FACTOR: f64 = 2.5;

/// Byte budget refilled every pacing tick from the current target bitrate.
///
/// A packet may leave while the budget is positive; the budget may go
/// negative by at most one packet, which the next refill repays.
#[derive(Debug, Clone)]
pub struct PacingGate {
    tick: Duration,
    budget: i64,
    max_budget: i64,
}

impl PacingGate {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            budget: 0,
            max_budget: 0,
        }
    }

    pub fn refill(&mut self, target_bps: u64) {
        let per_tick = (target_bps as f64 * PACING_FACTOR * self.tick.as_secs_f64() / 8.0).round() as i64;
        self.max_budget = per_tick.saturating_mul(2);
        self.budget = (self.budget + per_tick).min(self.max_budget);
    }

    pub fn can_send(&self) -> bool {
        self.budget > 0
    }

    pub fn consume(&mut self, bytes: usize) {
        self.budget -= i64::try_from(bytes).unwrap_or(i64::MAX);
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_follows_target_and_caps_bursts() {
        let mut g = PacingGate::new(Duration::from_millis(5));
        // 1 Mbps * 2.5 over 5 ms = 1562.5 bytes
        g.refill(1_000_000);
        assert_eq!(g.budget(), 1563);
        g.refill(1_000_000);
        g.refill(1_000_000);
        assert_eq!(g.budget(), 2 * 1563);
        g.consume(1200);
        g.consume(1200);
        assert!(g.can_send());
        g.consume(1200);
        assert!(!g.can_send());
    }
}
