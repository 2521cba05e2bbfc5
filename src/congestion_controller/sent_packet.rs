use std::time::{Duration, Instant};

/// Local record of one transmitted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentPacket {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub size: usize,
    pub send_time: Instant,
    /// Network route the packet left on (selected ICE pair).
    pub route_id: u32,
    pub probe_cluster: Option<u32>,
}

impl SentPacket {
    pub fn new(ssrc: u32, sequence_number: u16, size: usize, send_time: Instant) -> Self {
        Self {
            ssrc,
            sequence_number,
            size,
            send_time,
            route_id: 0,
            probe_cluster: None,
        }
    }

    pub fn with_probe_cluster(mut self, id: u32) -> Self {
        self.probe_cluster = Some(id);
        self
    }

    pub fn on_route(mut self, route_id: u32) -> Self {
        self.route_id = route_id;
        self
    }
}

/// A sent packet matched with what feedback said about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketResult {
    pub sent: SentPacket,
    /// Arrival in the receiver's clock; `None` when reported lost.
    pub recv_time: Option<Duration>,
}

impl PacketResult {
    pub fn is_received(&self) -> bool {
        self.recv_time.is_some()
    }
}

/// One feedback report after matching against the send history.
#[derive(Debug, Clone, Default)]
pub struct TransportFeedback {
    /// Received packets first, ordered by arrival; lost packets last.
    pub packets: Vec<PacketResult>,
    pub rtt: Option<Duration>,
    pub lost: usize,
    pub expected: usize,
}

impl TransportFeedback {
    pub fn received(&self) -> impl Iterator<Item = &PacketResult> {
        self.packets.iter().filter(|p| p.is_received())
    }
}
