use std::time::Duration;

use super::constants::{CWND_MIN_BYTES, CWND_QUEUE_ALLOWANCE};

/// Bytes allowed in flight: one target-rate worth of `rtt + allowance`.
pub fn congestion_window_bytes(target_bps: u64, rtt: Duration) -> u64 {
    let span = rtt + CWND_QUEUE_ALLOWANCE;
    let bytes = (target_bps as f64 / 8.0 * span.as_secs_f64()) as u64;
    bytes.max(CWND_MIN_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_scales_with_rate_and_has_floor() {
        assert_eq!(congestion_window_bytes(800_000, Duration::from_millis(150)), 50_000);
        assert_eq!(congestion_window_bytes(10_000, Duration::ZERO), CWND_MIN_BYTES);
    }
}
