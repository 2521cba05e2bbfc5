use std::collections::VecDeque;
use std::time::Duration;

use super::{constants::ACKED_RATE_WINDOW, sent_packet::PacketResult};

/// Throughput the receiver actually confirmed, averaged over a sliding
/// window of arrival times.
#[derive(Debug)]
pub struct AcknowledgedBitrateEstimator {
    window: Duration,
    samples: VecDeque<(Duration, usize)>,
    bitrate_bps: Option<u64>,
}

impl Default for AcknowledgedBitrateEstimator {
    fn default() -> Self {
        Self::new(ACKED_RATE_WINDOW)
    }
}

impl AcknowledgedBitrateEstimator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            bitrate_bps: None,
        }
    }

    /// Feeds packets sorted by receive time.
    pub fn incoming<'a, I>(&mut self, packets: I)
    where
        I: IntoIterator<Item = &'a PacketResult>,
    {
        for p in packets {
            let Some(recv) = p.recv_time else { continue };
            // receiver clock jumped backwards: start over
            if self.samples.back().is_some_and(|&(last, _)| recv < last) {
                self.samples.clear();
            }
            self.samples.push_back((recv, p.sent.size));
        }
        let Some(&(newest, _)) = self.samples.back() else {
            return;
        };
        while let Some(&(t, _)) = self.samples.front() {
            if newest.saturating_sub(t) <= self.window {
                break;
            }
            self.samples.pop_front();
        }
        self.bitrate_bps = self.compute(newest);
    }

    fn compute(&self, newest: Duration) -> Option<u64> {
        let &(oldest, _) = self.samples.front()?;
        let span = newest.saturating_sub(oldest);
        // a lone burst says nothing about rate
        if self.samples.len() < 2 || span < Duration::from_millis(20) {
            return self.bitrate_bps;
        }
        // the first sample opens the interval; its bytes arrived before it
        let bytes: usize = self.samples.iter().skip(1).map(|&(_, s)| s).sum();
        Some((bytes as f64 * 8.0 / span.as_secs_f64()) as u64)
    }

    pub fn bitrate_bps(&self) -> Option<u64> {
        self.bitrate_bps
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::congestion_controller::sent_packet::SentPacket;
    use std::time::Instant;

    #[test]
    fn steady_stream_yields_its_rate() {
        let t0 = Instant::now();
        // 1250 bytes every 10 ms = 1 Mbps
        let packets: Vec<PacketResult> = (0..50u16)
            .map(|i| PacketResult {
                sent: SentPacket::new(1, i, 1250, t0),
                recv_time: Some(Duration::from_millis(u64::from(i) * 10)),
            })
            .collect();
        let mut est = AcknowledgedBitrateEstimator::default();
        est.incoming(&packets);
        let bps = est.bitrate_bps().unwrap();
        assert!((950_000..=1_050_000).contains(&bps), "{bps}");
    }
}
