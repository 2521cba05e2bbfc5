use super::{
    constants::{INITIAL_PROBE_SCALES, PROBE_DURATION, PROBE_MIN_PACKETS, RECOVERY_PROBE_SCALE},
    probe_cluster::ProbeClusterConfig,
};

/// Decides when to probe: once at start-up and after leaving overuse.
#[derive(Debug)]
pub struct ProbeController {
    next_id: u32,
    max_bps: u64,
    initial_sent: bool,
}

impl ProbeController {
    pub fn new(max_bps: u64) -> Self {
        Self {
            next_id: 1,
            max_bps,
            initial_sent: false,
        }
    }

    pub fn initial_probes(&mut self, start_bps: u64) -> Vec<ProbeClusterConfig> {
        if self.initial_sent {
            return Vec::new();
        }
        self.initial_sent = true;
        let max_bps = self.max_bps;
        let targets: Vec<u64> = INITIAL_PROBE_SCALES
            .iter()
            .map(|&s| ((start_bps as f64 * s) as u64).min(max_bps))
            .filter(|&bps| bps > start_bps)
            .collect();
        targets.into_iter().map(|bps| self.cluster(bps)).collect()
    }

    pub fn on_recovered_from_overuse(&mut self, current_bps: u64) -> Vec<ProbeClusterConfig> {
        let target = ((current_bps as f64 * RECOVERY_PROBE_SCALE) as u64).min(self.max_bps);
        if target <= current_bps {
            return Vec::new();
        }
        vec![self.cluster(target)]
    }

    fn cluster(&mut self, target_bps: u64) -> ProbeClusterConfig {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        ProbeClusterConfig {
            id,
            target_bps,
            duration: PROBE_DURATION,
            min_packets: PROBE_MIN_PACKETS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_probes_are_capped_and_sent_once() {
        let mut p = ProbeController::new(4_000_000);
        let probes = p.initial_probes(1_000_000);
        assert_eq!(
            probes.iter().map(|c| c.target_bps).collect::<Vec<_>>(),
            vec![3_000_000, 4_000_000]
        );
        assert_ne!(probes[0].id, probes[1].id);
        assert!(p.initial_probes(1_000_000).is_empty());
    }

    #[test]
    fn no_recovery_probe_at_max() {
        let mut p = ProbeController::new(2_000_000);
        assert!(p.on_recovered_from_overuse(2_000_000).is_empty());
        assert_eq!(p.on_recovered_from_overuse(500_000)[0].target_bps, 1_000_000);
    }
}
