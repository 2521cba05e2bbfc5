use std::time::Duration;

/// How long send records are kept waiting for feedback.
pub const SEND_HISTORY_WINDOW: Duration = Duration::from_secs(60);
/// Minimum spacing between loss-based updates.
pub const LOSS_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);
/// Below this loss ratio the loss-based estimate grows.
pub const LOSS_LOW_THRESHOLD: f64 = 0.02;
/// Above this loss ratio the loss-based estimate shrinks.
pub const LOSS_HIGH_THRESHOLD: f64 = 0.10;
/// Growth factor of the loss-based estimate per update without loss.
pub const LOSS_INCREASE_FACTOR: f64 = 1.08;

/// Packets sent within this span form one trendline group.
pub const TRENDLINE_BURST: Duration = Duration::from_millis(5);
pub const TRENDLINE_WINDOW: usize = 20;
pub const TRENDLINE_SMOOTHING: f64 = 0.9;
pub const TRENDLINE_GAIN: f64 = 4.0;
pub const THRESHOLD_K_UP: f64 = 0.0087;
pub const THRESHOLD_K_DOWN: f64 = 0.039;
pub const THRESHOLD_INITIAL_MS: f64 = 12.5;
pub const THRESHOLD_MIN_MS: f64 = 6.0;
pub const THRESHOLD_MAX_MS: f64 = 600.0;
/// Overuse must persist this long before it is signalled.
pub const OVERUSE_TIME_THRESHOLD_MS: f64 = 10.0;

/// Multiplicative decrease relative to the acknowledged bitrate.
pub const AIMD_BETA: f64 = 0.85;
/// Multiplicative increase per second while the link is not congested.
pub const AIMD_INCREASE_PER_SECOND: f64 = 1.08;
pub const DEFAULT_RTT: Duration = Duration::from_millis(200);

/// Window over which acknowledged bytes are averaged.
pub const ACKED_RATE_WINDOW: Duration = Duration::from_millis(500);

/// Probe results below both the delay estimate and this share of the
/// acknowledged rate are raised to it.
pub const PROBE_FLOOR_FACTOR: f64 = 0.85;
pub const PROBE_MIN_PACKETS: usize = 5;
pub const PROBE_DURATION: Duration = Duration::from_millis(15);
/// Initial exponential probes, as multiples of the start bitrate.
pub const INITIAL_PROBE_SCALES: [f64; 2] = [3.0, 6.0];
/// Probe sent after leaving overuse, as a multiple of the current estimate.
pub const RECOVERY_PROBE_SCALE: f64 = 2.0;

/// Extra queueing allowance added to RTT when sizing the congestion window.
pub const CWND_QUEUE_ALLOWANCE: Duration = Duration::from_millis(350);
pub const CWND_MIN_BYTES: u64 = 3000;

/// How often the worker ticks loss updates without feedback.
pub const PROCESS_INTERVAL: Duration = Duration::from_millis(1000);
