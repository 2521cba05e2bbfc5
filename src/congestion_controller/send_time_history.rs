use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::{constants::SEND_HISTORY_WINDOW, sent_packet::SentPacket};

type Key = (u32, u16);

/// Send records awaiting feedback, with per-route in-flight accounting.
///
/// A record stops counting as in flight at the first of: acknowledgment,
/// reported loss, or eviction from the window.
#[derive(Debug)]
pub struct SendTimeHistory {
    window: Duration,
    records: HashMap<Key, SentPacket>,
    order: VecDeque<(Key, Instant)>,
    in_flight: HashMap<u32, u64>,
}

impl Default for SendTimeHistory {
    fn default() -> Self {
        Self::new(SEND_HISTORY_WINDOW)
    }
}

impl SendTimeHistory {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: HashMap::new(),
            order: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    pub fn add(&mut self, packet: SentPacket) {
        self.evict(packet.send_time);
        let key = (packet.ssrc, packet.sequence_number);
        if let Some(old) = self.records.insert(key, packet) {
            self.release(&old);
        }
        self.order.push_back((key, packet.send_time));
        *self.in_flight.entry(packet.route_id).or_insert(0) += packet.size as u64;
    }

    /// Removes the record for `(ssrc, seq)`, releasing its in-flight bytes.
    pub fn take(&mut self, ssrc: u32, seq: u16) -> Option<SentPacket> {
        let packet = self.records.remove(&(ssrc, seq))?;
        self.release(&packet);
        Some(packet)
    }

    pub fn in_flight_bytes(&self, route_id: u32) -> u64 {
        self.in_flight.get(&route_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops records older than the window.
    pub fn evict(&mut self, now: Instant) {
        while let Some(&(key, sent)) = self.order.front() {
            if now.saturating_duration_since(sent) < self.window {
                break;
            }
            self.order.pop_front();
            // the key may have been reused by a newer packet
            if self
                .records
                .get(&key)
                .is_some_and(|p| p.send_time == sent)
            {
                if let Some(p) = self.records.remove(&key) {
                    self.release(&p);
                }
            }
        }
    }

    fn release(&mut self, packet: &SentPacket) {
        if let Some(bytes) = self.in_flight.get_mut(&packet.route_id) {
            *bytes = bytes.saturating_sub(packet.size as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn in_flight_tracks_ack_and_eviction_per_route() {
        let t0 = Instant::now();
        let mut h = SendTimeHistory::new(Duration::from_secs(60));
        h.add(SentPacket::new(1, 10, 1000, t0));
        h.add(SentPacket::new(1, 11, 500, t0).on_route(2));
        assert_eq!(h.in_flight_bytes(0), 1000);
        assert_eq!(h.in_flight_bytes(2), 500);

        assert_eq!(h.take(1, 10).unwrap().size, 1000);
        assert_eq!(h.in_flight_bytes(0), 0);
        assert!(h.take(1, 10).is_none());

        h.evict(t0 + Duration::from_secs(61));
        assert_eq!(h.in_flight_bytes(2), 0);
        assert!(h.is_empty());
    }

    #[test]
    fn reused_key_replaces_old_record() {
        let t0 = Instant::now();
        let mut h = SendTimeHistory::default();
        h.add(SentPacket::new(1, 10, 1000, t0));
        h.add(SentPacket::new(1, 10, 300, t0 + Duration::from_secs(1)));
        assert_eq!(h.len(), 1);
        assert_eq!(h.in_flight_bytes(0), 300);
    }
}
