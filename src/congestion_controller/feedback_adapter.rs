//! Turns RTCP congestion control feedback into matched packet results.

use std::time::{Duration, Instant};

use super::{
    send_time_history::SendTimeHistory,
    sent_packet::{PacketResult, TransportFeedback},
};
use crate::rtcp::congestion_feedback::CongestionControlFeedback;
use crate::rtp::time::compact_to_duration;

/// Arrival time offsets are in 1/1024 s.
fn ato_to_duration(ato: u16) -> Duration {
    Duration::from_micros(u64::from(ato) * 1_000_000 / 1024)
}

/// Matches every report in `fb` against `history`.
///
/// Receive times are expressed in the receiver's clock (report timestamp
/// minus the arrival offset). The RTT is the smallest
/// `(feedback_time - send_time) - offset` over the batch, which removes the
/// time each packet waited at the receiver before being reported.
pub fn adapt_feedback(
    history: &mut SendTimeHistory,
    fb: &CongestionControlFeedback,
    feedback_time: Instant,
) -> TransportFeedback {
    let report_time = compact_to_duration(fb.report_timestamp);
    let mut out = TransportFeedback::default();
    let mut lost = Vec::new();

    for block in &fb.blocks {
        for report in &block.reports {
            let Some(sent) = history.take(block.media_ssrc, report.sequence_number) else {
                continue;
            };
            out.expected += 1;
            let offset = match (report.received, report.arrival_time_offset) {
                (false, _) => {
                    out.lost += 1;
                    lost.push(PacketResult {
                        sent,
                        recv_time: None,
                    });
                    continue;
                }
                (true, Some(ato)) => ato_to_duration(ato),
                // received but too late to express: treat as arriving at report time
                (true, None) => Duration::ZERO,
            };

            let pending = feedback_time
                .saturating_duration_since(sent.send_time)
                .saturating_sub(offset);
            if out.rtt.is_none_or(|r| pending < r) {
                out.rtt = Some(pending);
            }
            out.packets.push(PacketResult {
                sent,
                recv_time: Some(report_time.saturating_sub(offset)),
            });
        }
    }

    out.packets.sort_by_key(|p| p.recv_time);
    out.packets.extend(lost);
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::congestion_controller::sent_packet::SentPacket;
    use crate::rtcp::congestion_feedback::{Ecn, PacketReport, StreamFeedback};
    use crate::rtp::time::duration_to_compact;

    #[test]
    fn matches_records_and_estimates_rtt() {
        let t0 = Instant::now();
        let mut h = SendTimeHistory::default();
        for i in 0..3u16 {
            h.add(SentPacket::new(5, i, 1000, t0 + Duration::from_millis(u64::from(i) * 10)));
        }
        // 512/1024 s = 500 ms offset for seq 0, 0 for seq 2
        let fb = CongestionControlFeedback::new(
            9,
            vec![StreamFeedback::new(
                5,
                vec![
                    PacketReport::received(0, Some(512), Ecn::NotEct),
                    PacketReport::lost(1),
                    PacketReport::received(2, Some(0), Ecn::NotEct),
                ],
            )],
            duration_to_compact(Duration::from_secs(100)),
        );
        let out = adapt_feedback(&mut h, &fb, t0 + Duration::from_millis(600));
        assert_eq!((out.lost, out.expected), (1, 3));
        assert_eq!(out.packets.len(), 3);
        assert_eq!(out.packets[0].sent.sequence_number, 0);
        assert!(!out.packets[2].is_received());
        // seq 0: 600 - 500 = 100 ms; seq 2: 580 ms
        let rtt = out.rtt.unwrap();
        assert!(rtt >= Duration::from_millis(99) && rtt <= Duration::from_millis(101));
        assert!(h.is_empty());
    }
}
