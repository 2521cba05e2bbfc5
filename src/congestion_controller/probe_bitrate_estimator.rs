use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{constants::PROBE_MIN_PACKETS, sent_packet::PacketResult};

/// Arrival rate above this multiple of the send rate means the
/// measurement is bogus.
const MAX_VALID_RATIO: f64 = 2.0;
const MIN_INTERVAL: Duration = Duration::from_millis(1);
const MAX_CLUSTERS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct ClusterStats {
    first_send: Instant,
    last_send: Instant,
    last_send_size: usize,
    first_recv: Duration,
    first_recv_size: usize,
    last_recv: Duration,
    bytes: usize,
    count: usize,
}

/// Measures probe clusters from their feedback.
#[derive(Debug, Default)]
pub struct ProbeBitrateEstimator {
    clusters: HashMap<u32, ClusterStats>,
}

impl ProbeBitrateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one packet; returns `(cluster, bps)` once the cluster has
    /// enough received packets for a valid measurement.
    pub fn handle(&mut self, p: &PacketResult) -> Option<(u32, u64)> {
        let id = p.sent.probe_cluster?;
        let recv = p.recv_time?;
        let send = p.sent.send_time;
        let size = p.sent.size;

        if !self.clusters.contains_key(&id) && self.clusters.len() >= MAX_CLUSTERS {
            if let Some(&oldest) = self.clusters.keys().min() {
                self.clusters.remove(&oldest);
            }
        }
        let c = self.clusters.entry(id).or_insert(ClusterStats {
            first_send: send,
            last_send: send,
            last_send_size: size,
            first_recv: recv,
            first_recv_size: size,
            last_recv: recv,
            bytes: 0,
            count: 0,
        });
        if send < c.first_send {
            c.first_send = send;
        }
        if send >= c.last_send {
            c.last_send = send;
            c.last_send_size = size;
        }
        if recv < c.first_recv {
            c.first_recv = recv;
            c.first_recv_size = size;
        }
        c.last_recv = c.last_recv.max(recv);
        c.bytes += size;
        c.count += 1;

        if c.count < PROBE_MIN_PACKETS {
            return None;
        }
        let send_interval = c.last_send.saturating_duration_since(c.first_send);
        let recv_interval = c.last_recv.saturating_sub(c.first_recv);
        if send_interval < MIN_INTERVAL || recv_interval < MIN_INTERVAL {
            return None;
        }
        let send_bps = (c.bytes - c.last_send_size) as f64 * 8.0 / send_interval.as_secs_f64();
        let recv_bps = (c.bytes - c.first_recv_size) as f64 * 8.0 / recv_interval.as_secs_f64();
        if recv_bps > send_bps * MAX_VALID_RATIO {
            return None;
        }
        let mut bps = send_bps.min(recv_bps);
        // arrival clearly slower than sending: the link is the limit
        if recv_bps < 0.9 * send_bps {
            bps = 0.95 * recv_bps;
        }
        Some((id, bps as u64))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::congestion_controller::sent_packet::SentPacket;

    fn cluster(send_gap_us: u64, recv_gap_us: u64) -> Vec<PacketResult> {
        let t0 = Instant::now();
        (0..6u16)
            .map(|i| PacketResult {
                sent: SentPacket::new(1, i, 1000, t0 + Duration::from_micros(u64::from(i) * send_gap_us))
                    .with_probe_cluster(3),
                recv_time: Some(Duration::from_micros(u64::from(i) * recv_gap_us)),
            })
            .collect()
    }

    #[test]
    fn measures_the_bottleneck() {
        // sent at 4 Mbps, received at 2 Mbps
        let mut est = ProbeBitrateEstimator::new();
        let r = cluster(2000, 4000).iter().filter_map(|p| est.handle(p)).last().unwrap();
        assert_eq!(r.0, 3);
        assert!((1_850_000..=1_950_000).contains(&r.1), "{}", r.1);
    }

    #[test]
    fn non_probe_packets_are_ignored() {
        let mut est = ProbeBitrateEstimator::new();
        let mut p = cluster(2000, 2000)[0];
        p.sent.probe_cluster = None;
        assert!(est.handle(&p).is_none());
    }
}
