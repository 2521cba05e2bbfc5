use std::time::Duration;

use super::{media_kind::MediaKind, rtcp_timer::RtcpTimerConfig};
use crate::{
    fec::{FecConfig, fec_receiver::DEFAULT_FEC_WINDOW},
    reassembly::DEFAULT_REASSEMBLY_TIMEOUT,
    rtp::{config::PATH_MTU, payload::PayloadCodec},
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_PACING_TICK: Duration = Duration::from_millis(5);
pub const DEFAULT_PACKETS_PER_TICK: usize = 16;
pub const DEFAULT_SENDER_REPORT_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct SendChannelConfig {
    pub media: MediaKind,
    pub codec: PayloadCodec,
    pub payload_type: u8,
    pub ssrc: u32,
    /// Repair symbols and probe padding go out on this SSRC. `None`
    /// disables both.
    pub fec_ssrc: Option<u32>,
    pub fec: Option<FecConfig>,
    pub mtu: usize,
    pub queue_capacity: usize,
    pub pacing_tick: Duration,
    pub packets_per_tick: usize,
    pub sender_report_interval: Duration,
}

impl SendChannelConfig {
    pub fn new(media: MediaKind, codec: PayloadCodec, payload_type: u8, ssrc: u32) -> Self {
        Self {
            media,
            codec,
            payload_type,
            ssrc,
            fec_ssrc: None,
            fec: None,
            mtu: PATH_MTU,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pacing_tick: DEFAULT_PACING_TICK,
            packets_per_tick: DEFAULT_PACKETS_PER_TICK,
            sender_report_interval: DEFAULT_SENDER_REPORT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceiveChannelConfig {
    pub media: MediaKind,
    pub codec: PayloadCodec,
    pub payload_type: u8,
    /// Sender SSRC of the RTCP this channel emits.
    pub rtcp_ssrc: u32,
    pub fec_enabled: bool,
    pub queue_capacity: usize,
    pub reassembly_timeout: Duration,
    pub fec_window: Duration,
    pub timer: RtcpTimerConfig,
}

impl ReceiveChannelConfig {
    pub fn new(media: MediaKind, codec: PayloadCodec, payload_type: u8, rtcp_ssrc: u32) -> Self {
        Self {
            media,
            codec,
            payload_type,
            rtcp_ssrc,
            fec_enabled: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            fec_window: DEFAULT_FEC_WINDOW,
            timer: RtcpTimerConfig::default(),
        }
    }
}
