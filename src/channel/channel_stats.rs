use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::media_kind::MediaKind;

/// Per-channel counters, written by the channel threads and sampled (and
/// reset) once per second by the statistics thread.
#[derive(Debug, Default)]
pub struct ChannelStats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    packets_lost: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    fec_recovered: AtomicU64,
    retransmitted: AtomicU64,
    queue_dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub media: MediaKind,
    pub packets_sent: u64,
    pub bitrate_sent_bps: u64,
    pub packets_received: u64,
    pub bitrate_received_bps: u64,
    pub packets_lost: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub fec_recovered: u64,
    pub retransmitted: u64,
    pub queue_dropped: u64,
}

impl ChannelStats {
    pub fn on_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn on_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn on_lost(&self, packets: u64) {
        self.packets_lost.fetch_add(packets, Ordering::Relaxed);
    }

    pub fn on_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_fec_recovered(&self, packets: u64) {
        self.fec_recovered.fetch_add(packets, Ordering::Relaxed);
    }

    pub fn on_retransmitted(&self) {
        self.retransmitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_queue_dropped(&self) {
        self.queue_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads and zeroes every counter. `interval_secs` turns byte counts
    /// into bitrates.
    pub fn sample(&self, media: MediaKind, interval_secs: f64) -> StatsSnapshot {
        let take = |c: &AtomicU64| c.swap(0, Ordering::Relaxed);
        let to_bps = |bytes: u64| {
            if interval_secs <= 0.0 {
                0
            } else {
                (bytes as f64 * 8.0 / interval_secs).round() as u64
            }
        };
        StatsSnapshot {
            media,
            packets_sent: take(&self.packets_sent),
            bitrate_sent_bps: to_bps(take(&self.bytes_sent)),
            packets_received: take(&self.packets_received),
            bitrate_received_bps: to_bps(take(&self.bytes_received)),
            packets_lost: take(&self.packets_lost),
            frames_sent: take(&self.frames_sent),
            frames_received: take(&self.frames_received),
            fec_recovered: take(&self.fec_recovered),
            retransmitted: take(&self.retransmitted),
            queue_dropped: take(&self.queue_dropped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_resets_counters() {
        let s = ChannelStats::default();
        s.on_sent(1000);
        s.on_sent(250);
        s.on_frame_sent();
        let snap = s.sample(MediaKind::Video, 1.0);
        assert_eq!(snap.packets_sent, 2);
        assert_eq!(snap.bitrate_sent_bps, 10_000);
        assert_eq!(snap.frames_sent, 1);
        let again = s.sample(MediaKind::Video, 1.0);
        assert_eq!(again.packets_sent, 0);
    }
}
