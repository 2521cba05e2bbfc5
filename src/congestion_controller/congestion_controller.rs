//! Send-side bandwidth estimation combining delay, loss and acknowledged rate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    acknowledged_bitrate::AcknowledgedBitrateEstimator,
    bandwidth_estimate::BandwidthEstimate,
    bandwidth_usage::EstimatorState,
    congestion_window::congestion_window_bytes,
    constants::{DEFAULT_RTT, PROBE_FLOOR_FACTOR},
    delay_based::DelayBasedBwe,
    feedback_adapter::adapt_feedback,
    loss_based::LossBasedEstimator,
    probe_bitrate_estimator::ProbeBitrateEstimator,
    probe_cluster::ProbeClusterConfig,
    probe_controller::ProbeController,
    send_time_history::SendTimeHistory,
    sent_packet::SentPacket,
};
use crate::{
    log::log_sink::LogSink, rtcp::congestion_feedback::CongestionControlFeedback, sink_debug,
    sink_info, sink_warn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionConfig {
    pub start_bitrate_bps: u64,
    pub min_bitrate_bps: u64,
    pub max_bitrate_bps: u64,
    pub congestion_window: bool,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            start_bitrate_bps: 1_000_000,
            min_bitrate_bps: 100_000,
            max_bitrate_bps: 8_000_000,
            congestion_window: true,
        }
    }
}

pub struct CongestionController {
    config: CongestionConfig,
    history: SendTimeHistory,
    acked: AcknowledgedBitrateEstimator,
    loss: LossBasedEstimator,
    delay: DelayBasedBwe,
    probe_controller: ProbeController,
    probe_estimator: ProbeBitrateEstimator,
    rtt: Duration,
    target_bps: u64,
    logger: Arc<dyn LogSink>,
}

impl CongestionController {
    pub fn new(config: CongestionConfig, logger: Arc<dyn LogSink>) -> Self {
        let start = config
            .start_bitrate_bps
            .clamp(config.min_bitrate_bps, config.max_bitrate_bps);
        Self {
            config,
            history: SendTimeHistory::default(),
            acked: AcknowledgedBitrateEstimator::default(),
            loss: LossBasedEstimator::new(start),
            delay: DelayBasedBwe::new(start, config.min_bitrate_bps, config.max_bitrate_bps),
            probe_controller: ProbeController::new(config.max_bitrate_bps),
            probe_estimator: ProbeBitrateEstimator::new(),
            rtt: DEFAULT_RTT,
            target_bps: start,
            logger,
        }
    }

    /// First estimate, carrying the start-up probe clusters.
    pub fn initial_estimate(&mut self) -> BandwidthEstimate {
        let probes = self.probe_controller.initial_probes(self.target_bps);
        self.estimate(probes, false)
    }

    pub fn on_packet_sent(&mut self, packet: SentPacket) {
        self.history.add(packet);
    }

    /// RTT measured from receiver reports.
    pub fn on_rtt(&mut self, rtt: Duration) {
        self.rtt = rtt;
        self.delay.set_rtt(rtt);
    }

    /// Processes one congestion control feedback report.
    ///
    /// Returns an estimate when any estimator changed its view.
    pub fn on_feedback(
        &mut self,
        fb: &CongestionControlFeedback,
        now: Instant,
    ) -> Option<BandwidthEstimate> {
        self.history.evict(now);
        let feedback = adapt_feedback(&mut self.history, fb, now);
        if feedback.expected == 0 {
            sink_debug!(
                self.logger.as_ref(),
                "[Congestion] feedback matched no sent packets"
            );
            return None;
        }
        if let Some(rtt) = feedback.rtt {
            self.on_rtt(rtt);
        }

        self.acked.incoming(feedback.received());
        let acked = self.acked.bitrate_bps();

        self.loss.on_feedback(feedback.lost, feedback.expected);
        let loss_ratio = self.loss.update(now);

        let measured = feedback
            .received()
            .filter_map(|p| self.probe_estimator.handle(p))
            .last();
        let probe = measured.map(|(id, bps)| {
            let clamped = self.clamp_probe(bps, acked);
            sink_debug!(
                self.logger.as_ref(),
                "[Congestion] probe cluster {} measured {} bps (using {})",
                id,
                bps,
                clamped
            );
            clamped
        });

        let result = self.delay.incoming(&feedback, acked, probe, now);
        if !result.updated && loss_ratio.is_none() {
            return None;
        }
        if let Some(loss) = loss_ratio {
            sink_debug!(
                self.logger.as_ref(),
                "[Congestion] loss {:.2}% over {} packets",
                loss * 100.0,
                feedback.expected
            );
        }

        let probes = if result.recovered_from_overuse {
            sink_info!(
                self.logger.as_ref(),
                "[Congestion] left overuse at {} bps, probing",
                result.target_bps
            );
            self.probe_controller
                .on_recovered_from_overuse(result.target_bps)
        } else {
            Vec::new()
        };
        if result.state == EstimatorState::Decreasing {
            sink_warn!(
                self.logger.as_ref(),
                "[Congestion] overuse, delay estimate lowered to {} bps",
                result.target_bps
            );
        }
        Some(self.estimate(probes, result.recovered_from_overuse))
    }

    /// Periodic tick for loss updates when feedback is sparse.
    pub fn process(&mut self, now: Instant) -> Option<BandwidthEstimate> {
        self.history.evict(now);
        self.loss.update(now)?;
        Some(self.estimate(Vec::new(), false))
    }

    fn clamp_probe(&self, probe_bps: u64, acked: Option<u64>) -> u64 {
        let Some(acked) = acked else {
            return probe_bps;
        };
        let floor = (acked as f64 * PROBE_FLOOR_FACTOR) as u64;
        if probe_bps < self.delay.estimate_bps() && probe_bps < floor {
            floor
        } else {
            probe_bps
        }
    }

    fn estimate(&mut self, probes: Vec<ProbeClusterConfig>, recovered: bool) -> BandwidthEstimate {
        let (min, max) = (self.config.min_bitrate_bps, self.config.max_bitrate_bps);
        let delay = self.delay.estimate_bps();
        self.loss.follow(delay);
        self.loss.clamp(min, max);
        let target = delay.min(self.loss.estimate_bps()).clamp(min, max);
        if target != self.target_bps {
            sink_debug!(
                self.logger.as_ref(),
                "[Congestion] target {} -> {} bps",
                self.target_bps,
                target
            );
        }
        self.target_bps = target;
        BandwidthEstimate {
            target_bitrate_bps: target,
            congestion_window: self.congestion_window_bytes(),
            probes,
            recovered_from_overuse: recovered,
            state: self.delay.state(),
        }
    }

    pub fn target_bitrate_bps(&self) -> u64 {
        self.target_bps
    }

    pub fn state(&self) -> EstimatorState {
        self.delay.state()
    }

    pub fn rtt(&self) -> Duration {
        self.rtt
    }

    pub fn congestion_window_bytes(&self) -> Option<u64> {
        self.config
            .congestion_window
            .then(|| congestion_window_bytes(self.target_bps, self.rtt))
    }

    pub fn in_flight_bytes(&self, route_id: u32) -> u64 {
        self.history.in_flight_bytes(route_id)
    }

    /// True when the route's in-flight bytes fill the congestion window.
    pub fn is_congested(&self, route_id: u32) -> bool {
        self.congestion_window_bytes()
            .is_some_and(|cwnd| self.in_flight_bytes(route_id) >= cwnd)
    }
}
