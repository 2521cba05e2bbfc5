use std::time::Duration;

/// A burst the pacer should send at `target_bps` to test for headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeClusterConfig {
    pub id: u32,
    pub target_bps: u64,
    pub duration: Duration,
    pub min_packets: usize,
}

impl ProbeClusterConfig {
    /// Bytes the cluster must carry to hit its target over its duration.
    pub fn target_bytes(&self) -> usize {
        (self.target_bps as f64 / 8.0 * self.duration.as_secs_f64()).ceil() as usize
    }
}
