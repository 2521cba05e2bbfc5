use super::{bandwidth_usage::EstimatorState, probe_cluster::ProbeClusterConfig};

/// Output of one controller update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthEstimate {
    pub target_bitrate_bps: u64,
    /// In-flight byte budget, when congestion windows are enabled.
    pub congestion_window: Option<u64>,
    pub probes: Vec<ProbeClusterConfig>,
    pub recovered_from_overuse: bool,
    pub state: EstimatorState,
}
