//! Congestion controller driven by synthetic congestion control feedback.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use deskrtc::congestion_controller::{
    CongestionConfig, CongestionController, EstimatorState, SentPacket,
};
use deskrtc::log::NoopLogSink;
use deskrtc::rtcp::congestion_feedback::{CongestionControlFeedback, Ecn, PacketReport, StreamFeedback};
use proptest::prelude::*;

const SSRC: u32 = 0x1234;
/// Receiver clock base, in 1/1024 s ticks.
const RECV_BASE: u64 = 1000 * 1024;

fn tick(ticks: u64) -> Duration {
    Duration::from_nanos(ticks * 1_000_000_000 / 1024)
}

/// Sends `per_round` packets every round and answers each round with one
/// feedback report. `extra_delay` adds queueing delay per packet sent.
struct Link {
    t0: Instant,
    seq: u16,
    send_tick: u64,
    queue_ticks: u64,
    base_delay: u64,
    extra_delay: u64,
    packet_size: usize,
}

impl Link {
    fn new(base_delay: u64, extra_delay: u64, packet_size: usize) -> Self {
        Self {
            t0: Instant::now(),
            seq: 0,
            send_tick: 0,
            queue_ticks: 0,
            base_delay,
            extra_delay,
            packet_size,
        }
    }

    fn round(
        &mut self,
        ctrl: &mut CongestionController,
        per_round: usize,
    ) -> Option<deskrtc::congestion_controller::BandwidthEstimate> {
        let mut recvs = Vec::new();
        for _ in 0..per_round {
            ctrl.on_packet_sent(SentPacket::new(
                SSRC,
                self.seq,
                self.packet_size,
                self.t0 + tick(self.send_tick),
            ));
            self.queue_ticks += self.extra_delay;
            let recv = RECV_BASE + self.send_tick + self.base_delay + self.queue_ticks;
            recvs.push((self.seq, recv));
            self.seq = self.seq.wrapping_add(1);
            self.send_tick += 10;
        }
        let (_, last_recv) = recvs[recvs.len() - 1];
        let report_tick = last_recv + 1;
        let reports = recvs
            .iter()
            .map(|&(seq, r)| PacketReport::received(seq, Some((report_tick - r) as u16), Ecn::NotEct))
            .collect();
        let fb = CongestionControlFeedback::new(
            9,
            vec![StreamFeedback::new(SSRC, reports)],
            (report_tick * 64) as u32,
        );
        let feedback_time = self.t0 + tick(report_tick - RECV_BASE + self.base_delay);
        ctrl.on_feedback(&fb, feedback_time)
    }
}

fn controller() -> CongestionController {
    CongestionController::new(
        CongestionConfig {
            start_bitrate_bps: 500_000,
            min_bitrate_bps: 50_000,
            max_bitrate_bps: 20_000_000,
            congestion_window: true,
        },
        Arc::new(NoopLogSink),
    )
}

#[test]
fn growing_queue_delay_leads_to_decrease() {
    let mut ctrl = controller();
    let mut link = Link::new(40, 2, 1200);
    let mut states = Vec::new();
    for _ in 0..20 {
        if let Some(est) = link.round(&mut ctrl, 10) {
            states.push(est.state);
        }
    }
    assert!(
        states.contains(&EstimatorState::Decreasing),
        "states: {states:?}"
    );
}

#[test]
fn leaving_overuse_requests_a_probe() {
    let mut ctrl = controller();
    let mut link = Link::new(40, 2, 1200);
    for _ in 0..20 {
        link.round(&mut ctrl, 10);
    }
    assert_ne!(ctrl.state(), EstimatorState::Normal);

    // queue drains, then holds steady
    link.extra_delay = 0;
    let mut recovered = None;
    for _ in 0..40 {
        if let Some(est) = link.round(&mut ctrl, 10) {
            if est.recovered_from_overuse {
                recovered = Some(est);
                break;
            }
        }
    }
    let est = recovered.unwrap();
    assert_eq!(est.state, EstimatorState::Normal);
    assert!(!est.probes.is_empty());
    assert!(est.probes[0].target_bps > est.target_bitrate_bps);
}

#[test]
fn congestion_window_reflects_in_flight_bytes() {
    let mut ctrl = controller();
    let cwnd = ctrl.congestion_window_bytes().unwrap();
    let t0 = Instant::now();
    let mut seq = 0u16;
    while !ctrl.is_congested(0) {
        ctrl.on_packet_sent(SentPacket::new(SSRC, seq, 1200, t0));
        seq += 1;
    }
    assert!(ctrl.in_flight_bytes(0) >= cwnd);
    assert!(!ctrl.is_congested(1));
}

proptest! {
    #[test]
    fn uncongested_link_never_lowers_the_target(
        base_delay in 10u64..100,
        packet_size in 800usize..1400,
        per_round in 5usize..15,
        rounds in 5usize..30,
    ) {
        let mut ctrl = controller();
        let mut link = Link::new(base_delay, 0, packet_size);
        let mut last = ctrl.target_bitrate_bps();
        for _ in 0..rounds {
            if let Some(est) = link.round(&mut ctrl, per_round) {
                prop_assert!(est.target_bitrate_bps >= last,
                    "target dropped {} -> {}", last, est.target_bitrate_bps);
                prop_assert_eq!(est.state, EstimatorState::Normal);
                last = est.target_bitrate_bps;
            }
        }
    }
}
