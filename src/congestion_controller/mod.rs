//! Send-side congestion control: delay trend, loss and acknowledged rate
//! combined into a target bitrate, probe requests and a congestion window.
pub mod acknowledged_bitrate;
pub mod aimd_rate_control;
pub mod bandwidth_estimate;
pub mod bandwidth_usage;
pub mod congestion_controller;
pub mod congestion_window;
pub mod controller_worker;
mod constants;
pub mod delay_based;
pub mod feedback_adapter;
pub mod loss_based;
pub mod probe_bitrate_estimator;
pub mod probe_cluster;
pub mod probe_controller;
pub mod send_time_history;
pub mod sent_packet;
pub mod trendline;

pub use bandwidth_estimate::BandwidthEstimate;
pub use bandwidth_usage::{BandwidthUsage, EstimatorState};
pub use congestion_controller::{CongestionConfig, CongestionController};
pub use controller_worker::{CongestionControllerWorker, ControllerInput, ControllerSignals};
pub use probe_cluster::ProbeClusterConfig;
pub use sent_packet::SentPacket;
