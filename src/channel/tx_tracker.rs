use std::time::{Duration, Instant};

use crate::rtcp::report_block::ReportBlock;
use crate::rtp::time::{NtpTime, compact_to_duration};

/// Sender-side view of one outbound stream, fed by the remote's report
/// blocks. Round-trip time follows RFC 3550 A.3: `A - LSR - DLSR`.
#[derive(Debug, Clone, Default)]
pub struct TxTracker {
    last_sr_compact: u32,
    pub last_report: Option<Instant>,
    pub remote_fraction_lost: u8,
    pub remote_cumulative_lost: i32,
    pub remote_highest_ext_seq: u32,
    pub remote_jitter: u32,
    rtt: Option<Duration>,
}

impl TxTracker {
    pub fn mark_sr_sent(&mut self, ntp: NtpTime) {
        self.last_sr_compact = ntp.compact();
    }

    /// Consumes a report block about our SSRC. Returns the new RTT when the
    /// block answers our last SR.
    pub fn on_report_block(&mut self, rb: &ReportBlock, arrival_compact: u32, now: Instant) -> Option<Duration> {
        self.remote_fraction_lost = rb.fraction_lost;
        self.remote_cumulative_lost = rb.cumulative_lost;
        self.remote_highest_ext_seq = rb.highest_seq_no_received;
        self.remote_jitter = rb.interarrival_jitter;
        self.last_report = Some(now);

        if rb.lsr == 0 || self.last_sr_compact == 0 || rb.lsr != self.last_sr_compact {
            return None;
        }
        let units = arrival_compact.wrapping_sub(rb.lsr).wrapping_sub(rb.dlsr);
        // a negative result wraps to a huge value
        if units > 0x8000_0000 {
            return None;
        }
        let rtt = compact_to_duration(units);
        self.rtt = Some(rtt);
        Some(rtt)
    }

    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(lsr: u32, dlsr: u32) -> ReportBlock {
        ReportBlock {
            ssrc: 1,
            fraction_lost: 12,
            cumulative_lost: 3,
            highest_seq_no_received: 100,
            interarrival_jitter: 5,
            lsr,
            dlsr,
        }
    }

    #[test]
    fn rtt_from_lsr_and_dlsr() {
        let mut tx = TxTracker::default();
        let sent = NtpTime::from_parts(0x0000_0010, 0x8000_0000);
        tx.mark_sr_sent(sent);
        let lsr = sent.compact();
        // held 250 ms at the receiver, back 100 ms later
        let arrival = lsr + 0x4000 + 0x199A;
        let rtt = tx
            .on_report_block(&block(lsr, 0x4000), arrival, Instant::now())
            .map(|d| d.as_millis());
        assert_eq!(rtt, Some(100));
        assert_eq!(tx.remote_fraction_lost, 12);
    }

    #[test]
    fn unrelated_lsr_is_ignored() {
        let mut tx = TxTracker::default();
        tx.mark_sr_sent(NtpTime::from_parts(1, 0));
        assert!(tx.on_report_block(&block(0x1234, 10), 0x2000, Instant::now()).is_none());
        assert!(tx.rtt().is_none());
    }
}
