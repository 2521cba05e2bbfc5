use crate::rtcp::report_block::ReportBlock;
use crate::rtp::{seq_ext::SeqExt, time::NtpTime};

/// Receive-side statistics for one remote SSRC, feeding RTCP receiver
/// report blocks (RFC 3550 A.3 and A.8).
#[derive(Debug, Default, Clone)]
pub struct RxTracker {
    // sequence/loss
    seqext: SeqExt,
    base_ext_seq: Option<u32>,
    highest_ext_seq: u32,
    received: u32,
    expected_prior: u32,
    received_prior: u32,

    // jitter, in RTP clock units
    jitter: u32,
    last_transit: Option<u32>,

    // last SR, for LSR/DLSR
    last_sr_compact: Option<u32>,
    last_sr_arrival_compact: Option<u32>,
}

impl RxTracker {
    /// Call for every RTP packet of this SSRC. `arrival_rtp_units` is the
    /// local arrival time expressed in the stream's RTP clock.
    pub fn on_rtp(&mut self, seq: u16, rtp_ts: u32, arrival_rtp_units: u32) {
        let ext = self.seqext.update(seq);
        if self.base_ext_seq.is_none() {
            self.base_ext_seq = Some(ext);
            self.highest_ext_seq = ext;
        }
        if ext > self.highest_ext_seq {
            self.highest_ext_seq = ext;
        }
        self.received = self.received.wrapping_add(1);

        let transit = arrival_rtp_units.wrapping_sub(rtp_ts);
        if let Some(prev) = self.last_transit {
            let d = i64::from(transit.wrapping_sub(prev) as i32).abs();
            let j = i64::from(self.jitter);
            self.jitter = (j + (d - j) / 16).max(0) as u32;
        }
        self.last_transit = Some(transit);
    }

    pub fn on_sr_received(&mut self, ntp: NtpTime, arrival_compact: u32) {
        self.last_sr_compact = Some(ntp.compact());
        self.last_sr_arrival_compact = Some(arrival_compact);
    }

    pub fn has_received(&self) -> bool {
        self.base_ext_seq.is_some()
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn jitter(&self) -> u32 {
        self.jitter
    }

    pub fn cumulative_lost(&self) -> i64 {
        let expected = self.expected();
        i64::from(expected) - i64::from(self.received)
    }

    fn expected(&self) -> u32 {
        match self.base_ext_seq {
            Some(base) => self.highest_ext_seq.wrapping_sub(base).wrapping_add(1),
            None => 0,
        }
    }

    /// Builds the report block for `ssrc` and starts a new loss interval.
    pub fn build_report_block(&mut self, ssrc: u32, now_compact: u32) -> ReportBlock {
        let expected = self.expected();
        let expected_interval = expected.wrapping_sub(self.expected_prior);
        let received_interval = self.received.wrapping_sub(self.received_prior);
        let lost_interval = i64::from(expected_interval) - i64::from(received_interval);
        let fraction_lost = if expected_interval == 0 || lost_interval <= 0 {
            0
        } else {
            ((lost_interval << 8) / i64::from(expected_interval)).min(255) as u8
        };
        self.expected_prior = expected;
        self.received_prior = self.received;

        let (lsr, dlsr) = match (self.last_sr_compact, self.last_sr_arrival_compact) {
            (Some(lsr), Some(arrival)) => (lsr, now_compact.wrapping_sub(arrival)),
            _ => (0, 0),
        };

        // 24-bit signed field
        let cumulative_lost = self.cumulative_lost().clamp(-0x80_0000, 0x7F_FFFF) as i32;

        ReportBlock {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq_no_received: self.highest_ext_seq,
            interarrival_jitter: self.jitter,
            lsr,
            dlsr,
        }
    }
}
