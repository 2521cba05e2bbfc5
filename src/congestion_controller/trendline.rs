//! Delay-gradient trend detector.
//!
//! Packets are grouped into 5 ms send bursts. For consecutive groups the
//! difference between arrival spacing and send spacing is accumulated,
//! smoothed, and fitted with a least-squares line over a sliding window. A
//! positive slope means the bottleneck queue is growing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{bandwidth_usage::BandwidthUsage, constants::*};

#[derive(Debug, Clone, Copy)]
struct PacketGroup {
    first_send: Instant,
    last_send: Instant,
    last_recv: Duration,
}

#[derive(Debug)]
pub struct TrendlineEstimator {
    current: Option<PacketGroup>,
    previous: Option<PacketGroup>,
    first_arrival: Option<Duration>,

    accumulated_delay: f64,
    smoothed_delay: f64,
    history: VecDeque<(f64, f64)>,
    num_deltas: usize,

    trend: f64,
    prev_trend: f64,
    threshold: f64,
    last_threshold_update: Option<f64>,
    time_over_using: f64,
    overuse_counter: u32,
    usage: BandwidthUsage,
}

impl Default for TrendlineEstimator {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
            first_arrival: None,
            accumulated_delay: 0.0,
            smoothed_delay: 0.0,
            history: VecDeque::with_capacity(TRENDLINE_WINDOW),
            num_deltas: 0,
            trend: 0.0,
            prev_trend: 0.0,
            threshold: THRESHOLD_INITIAL_MS,
            last_threshold_update: None,
            time_over_using: -1.0,
            overuse_counter: 0,
            usage: BandwidthUsage::Normal,
        }
    }
}

impl TrendlineEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one received packet; packets must arrive in receive order.
    pub fn update(&mut self, send_time: Instant, recv_time: Duration) {
        let Some(cur) = self.current.as_mut() else {
            self.current = Some(PacketGroup {
                first_send: send_time,
                last_send: send_time,
                last_recv: recv_time,
            });
            return;
        };

        // reordered packet from an earlier group
        if send_time < cur.first_send {
            return;
        }
        if send_time.saturating_duration_since(cur.first_send) <= TRENDLINE_BURST {
            cur.last_send = cur.last_send.max(send_time);
            cur.last_recv = cur.last_recv.max(recv_time);
            return;
        }

        let finished = *cur;
        if let Some(prev) = self.previous {
            let send_delta = ms(finished.last_send.saturating_duration_since(prev.last_send));
            let recv_delta = ms(finished.last_recv) - ms(prev.last_recv);
            self.on_group_delta(recv_delta - send_delta, send_delta, finished.last_recv);
        }
        self.previous = Some(finished);
        self.current = Some(PacketGroup {
            first_send: send_time,
            last_send: send_time,
            last_recv: recv_time,
        });
    }

    fn on_group_delta(&mut self, delay_delta_ms: f64, send_delta_ms: f64, arrival: Duration) {
        self.num_deltas += 1;
        let first = *self.first_arrival.get_or_insert(arrival);
        let arrival_ms = ms(arrival) - ms(first);

        self.accumulated_delay += delay_delta_ms;
        self.smoothed_delay = TRENDLINE_SMOOTHING * self.smoothed_delay
            + (1.0 - TRENDLINE_SMOOTHING) * self.accumulated_delay;

        self.history.push_back((arrival_ms, self.smoothed_delay));
        if self.history.len() > TRENDLINE_WINDOW {
            self.history.pop_front();
        }
        if self.history.len() == TRENDLINE_WINDOW {
            if let Some(slope) = linear_fit_slope(&self.history) {
                self.trend = slope;
            }
        }
        self.detect(send_delta_ms, arrival_ms);
    }

    fn detect(&mut self, send_delta_ms: f64, now_ms: f64) {
        let modified = self.num_deltas.min(60) as f64 * self.trend * TRENDLINE_GAIN;

        if modified > self.threshold {
            if self.time_over_using < 0.0 {
                self.time_over_using = send_delta_ms / 2.0;
            } else {
                self.time_over_using += send_delta_ms;
            }
            self.overuse_counter += 1;
            if self.time_over_using > OVERUSE_TIME_THRESHOLD_MS
                && self.overuse_counter > 1
                && self.trend >= self.prev_trend
            {
                self.time_over_using = 0.0;
                self.overuse_counter = 0;
                self.usage = BandwidthUsage::Overusing;
            }
        } else if modified < -self.threshold {
            self.time_over_using = -1.0;
            self.overuse_counter = 0;
            self.usage = BandwidthUsage::Underusing;
        } else {
            self.time_over_using = -1.0;
            self.overuse_counter = 0;
            self.usage = BandwidthUsage::Normal;
        }
        self.prev_trend = self.trend;
        self.update_threshold(modified, now_ms);
    }

    fn update_threshold(&mut self, modified: f64, now_ms: f64) {
        let last = *self.last_threshold_update.get_or_insert(now_ms);
        // spikes are not allowed to drag the threshold
        if modified.abs() > self.threshold + 15.0 {
            self.last_threshold_update = Some(now_ms);
            return;
        }
        let k = if modified.abs() < self.threshold {
            THRESHOLD_K_DOWN
        } else {
            THRESHOLD_K_UP
        };
        let dt = (now_ms - last).clamp(0.0, 100.0);
        self.threshold += k * (modified.abs() - self.threshold) * dt;
        self.threshold = self.threshold.clamp(THRESHOLD_MIN_MS, THRESHOLD_MAX_MS);
        self.last_threshold_update = Some(now_ms);
    }

    pub fn usage(&self) -> BandwidthUsage {
        self.usage
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn linear_fit_slope(points: &VecDeque<(f64, f64)>) -> Option<f64> {
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (avg_x, avg_y) = (sum_x / n, sum_y / n);
    let (mut num, mut den) = (0.0, 0.0);
    for &(x, y) in points {
        num += (x - avg_x) * (y - avg_y);
        den += (x - avg_x) * (x - avg_x);
    }
    (den != 0.0).then(|| num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(t: &mut TrendlineEstimator, groups: u64, send_gap_ms: u64, recv_gap_ms: u64) {
        let t0 = Instant::now();
        for i in 0..groups {
            t.update(
                t0 + Duration::from_millis(i * send_gap_ms),
                Duration::from_millis(1000 + i * recv_gap_ms),
            );
        }
    }

    #[test]
    fn steady_delay_is_normal() {
        let mut t = TrendlineEstimator::new();
        feed(&mut t, 100, 20, 20);
        assert_eq!(t.usage(), BandwidthUsage::Normal);
        assert!(t.trend().abs() < 1e-9);
    }

    #[test]
    fn growing_delay_is_overuse() {
        let mut t = TrendlineEstimator::new();
        feed(&mut t, 60, 20, 26);
        assert_eq!(t.usage(), BandwidthUsage::Overusing);
    }

    #[test]
    fn draining_queue_is_underuse() {
        let mut t = TrendlineEstimator::new();
        feed(&mut t, 60, 20, 14);
        assert_eq!(t.usage(), BandwidthUsage::Underusing);
    }
}
