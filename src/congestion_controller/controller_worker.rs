use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{
    bandwidth_estimate::BandwidthEstimate, congestion_controller::CongestionController,
    constants::PROCESS_INTERVAL, sent_packet::SentPacket,
};
use crate::{
    log::log_sink::LogSink, rtcp::congestion_feedback::CongestionControlFeedback, sink_debug,
    sink_info,
};

pub enum ControllerInput {
    PacketSent(SentPacket),
    Feedback(CongestionControlFeedback, Instant),
    Rtt(Duration),
    RouteChanged(u32),
}

/// Lock-free view of the controller for the pacing threads.
#[derive(Debug)]
pub struct ControllerSignals {
    target_bps: AtomicU64,
    congested: AtomicBool,
}

impl ControllerSignals {
    fn new(target_bps: u64) -> Self {
        Self {
            target_bps: AtomicU64::new(target_bps),
            congested: AtomicBool::new(false),
        }
    }

    pub fn target_bitrate_bps(&self) -> u64 {
        self.target_bps.load(Ordering::Relaxed)
    }

    /// The current route's in-flight bytes fill the congestion window.
    pub fn is_congested(&self) -> bool {
        self.congested.load(Ordering::Relaxed)
    }
}

/// Owns a [`CongestionController`] on a dedicated thread.
pub struct CongestionControllerWorker {
    logger: Arc<dyn LogSink>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    input_tx: Sender<ControllerInput>,
    signals: Arc<ControllerSignals>,
}

impl CongestionControllerWorker {
    /// Spawns the worker. The initial estimate (with start-up probes) is
    /// published before the thread starts.
    pub fn start(
        mut controller: CongestionController,
        estimate_tx: Sender<BandwidthEstimate>,
        logger: Arc<dyn LogSink>,
    ) -> io::Result<Self> {
        let (input_tx, input_rx) = mpsc::channel();
        let signals = Arc::new(ControllerSignals::new(controller.target_bitrate_bps()));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let _ = estimate_tx.send(controller.initial_estimate());

        let handle = {
            let signals = signals.clone();
            let stop_flag = stop_flag.clone();
            let logger = logger.clone();
            thread::Builder::new()
                .name("congestion-controller".into())
                .spawn(move || {
                    run(controller, input_rx, estimate_tx, signals, stop_flag, logger);
                })?
        };

        Ok(Self {
            logger,
            stop_flag,
            handle: Some(handle),
            input_tx,
            signals,
        })
    }

    pub fn input(&self) -> Sender<ControllerInput> {
        self.input_tx.clone()
    }

    pub fn signals(&self) -> Arc<ControllerSignals> {
        self.signals.clone()
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                sink_info!(self.logger.as_ref(), "[Congestion] worker panicked");
            }
        }
    }
}

impl Drop for CongestionControllerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut controller: CongestionController,
    input_rx: Receiver<ControllerInput>,
    estimate_tx: Sender<BandwidthEstimate>,
    signals: Arc<ControllerSignals>,
    stop_flag: Arc<AtomicBool>,
    logger: Arc<dyn LogSink>,
) {
    let mut route_id = 0u32;
    let mut next_process = Instant::now() + PROCESS_INTERVAL;

    while !stop_flag.load(Ordering::SeqCst) {
        let wait = next_process
            .saturating_duration_since(Instant::now())
            .min(Duration::from_millis(100));
        let estimate = match input_rx.recv_timeout(wait) {
            Ok(ControllerInput::PacketSent(p)) => {
                controller.on_packet_sent(p);
                None
            }
            Ok(ControllerInput::Feedback(fb, at)) => controller.on_feedback(&fb, at),
            Ok(ControllerInput::Rtt(rtt)) => {
                controller.on_rtt(rtt);
                None
            }
            Ok(ControllerInput::RouteChanged(id)) => {
                sink_debug!(logger.as_ref(), "[Congestion] route changed to {}", id);
                route_id = id;
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                if now >= next_process {
                    next_process = now + PROCESS_INTERVAL;
                    controller.process(now)
                } else {
                    None
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        signals
            .congested
            .store(controller.is_congested(route_id), Ordering::Relaxed);
        if let Some(est) = estimate {
            signals
                .target_bps
                .store(est.target_bitrate_bps, Ordering::Relaxed);
            if estimate_tx.send(est).is_err() {
                sink_debug!(logger.as_ref(), "[Congestion] estimate receiver gone");
            }
        }
    }
    sink_debug!(logger.as_ref(), "[Congestion] worker stopped");
}
