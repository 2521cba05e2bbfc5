//! Session settings read from the `[Transport]` and `[Ice]` sections.

use std::{str::FromStr, sync::Arc, time::Duration};

use crate::{
    channel::{
        MediaKind, ReceiveChannelConfig, RtcpTimerConfig, SendChannelConfig,
        channel_config::{
            DEFAULT_PACING_TICK, DEFAULT_PACKETS_PER_TICK, DEFAULT_QUEUE_CAPACITY,
            DEFAULT_SENDER_REPORT_INTERVAL,
        },
        stats_worker::STATS_INTERVAL,
    },
    config::Config,
    congestion_controller::CongestionConfig,
    fec::{FecConfig, fec_receiver::DEFAULT_FEC_WINDOW},
    ice::{IceConfig, IceRole, TurnConfig},
    log::log_sink::LogSink,
    reassembly::DEFAULT_REASSEMBLY_TIMEOUT,
    rtp::{config::PATH_MTU, payload::PayloadCodec},
    sink_warn,
};

const TRANSPORT: &str = "Transport";
const ICE: &str = "Ice";

/// Smallest MTU that still fits an RTP header, the block-offset extension
/// and some payload.
const MIN_MTU: usize = 576;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub mtu: usize,
    pub trickle_ice: bool,
    pub fec_enabled: bool,
    pub fec: FecConfig,
    pub congestion: CongestionConfig,
    pub reassembly_timeout: Duration,
    pub send_queue_capacity: usize,
    pub recv_queue_capacity: usize,
    pub pacing_tick: Duration,
    pub packets_per_tick: usize,
    pub sender_report_interval: Duration,
    pub feedback_interval: Duration,
    pub stats_interval: Duration,
    /// Media lines offered, in `m=` order. Each one must negotiate.
    pub media: Vec<MediaKind>,
    pub stun_server: Option<String>,
    pub turn: Option<TurnConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mtu: PATH_MTU,
            trickle_ice: true,
            fec_enabled: true,
            fec: FecConfig::default(),
            congestion: CongestionConfig::default(),
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            send_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            recv_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pacing_tick: DEFAULT_PACING_TICK,
            packets_per_tick: DEFAULT_PACKETS_PER_TICK,
            sender_report_interval: DEFAULT_SENDER_REPORT_INTERVAL,
            feedback_interval: RtcpTimerConfig::default().feedback_interval,
            stats_interval: STATS_INTERVAL,
            media: MediaKind::ALL.to_vec(),
            stun_server: None,
            turn: None,
        }
    }
}

impl TransportConfig {
    /// Reads every key, keeping the default for missing ones. Unparsable or
    /// out-of-range values are reported through `logger` and replaced by
    /// the default.
    pub fn from_config(config: &Config, logger: &Arc<dyn LogSink>) -> Self {
        let d = Self::default();
        let r = Reader { config, logger };

        let mtu = r.parsed(TRANSPORT, "mtu", d.mtu);
        let mtu = if mtu < MIN_MTU {
            sink_warn!(logger, "[Config] mtu={} below {}, using {}", mtu, MIN_MTU, d.mtu);
            d.mtu
        } else {
            mtu
        };

        let code_rate = r.parsed(TRANSPORT, "fec_code_rate", d.fec.code_rate);
        let symbol_size = r.parsed(TRANSPORT, "fec_max_symbol_size", d.fec.max_symbol_size);
        let fec = match FecConfig::new(code_rate, symbol_size) {
            Ok(fec) => fec,
            Err(e) => {
                sink_warn!(logger, "[Config] {}, using default FEC settings", e);
                d.fec
            }
        };
        let fitted = fec.fit_mtu(mtu);
        if fitted.max_symbol_size < fec.max_symbol_size {
            sink_warn!(
                logger,
                "[Config] fec_max_symbol_size={} does not fit mtu={}, using {}",
                fec.max_symbol_size,
                mtu,
                fitted.max_symbol_size
            );
        }
        let fec = fitted;

        let congestion = CongestionConfig {
            start_bitrate_bps: r.parsed(TRANSPORT, "start_bitrate_bps", d.congestion.start_bitrate_bps),
            min_bitrate_bps: r.parsed(TRANSPORT, "min_bitrate_bps", d.congestion.min_bitrate_bps),
            max_bitrate_bps: r.parsed(TRANSPORT, "max_bitrate_bps", d.congestion.max_bitrate_bps),
            congestion_window: r.flag(TRANSPORT, "congestion_window", d.congestion.congestion_window),
        };
        let congestion = if congestion.min_bitrate_bps == 0
            || congestion.min_bitrate_bps > congestion.max_bitrate_bps
        {
            sink_warn!(
                logger,
                "[Config] bitrate bounds {}..{} invalid, using defaults",
                congestion.min_bitrate_bps,
                congestion.max_bitrate_bps
            );
            d.congestion
        } else {
            congestion
        };

        let media = match config.get_non_empty(TRANSPORT, "media") {
            None => d.media.clone(),
            Some(raw) => match parse_media_list(raw) {
                Some(list) => list,
                None => {
                    sink_warn!(logger, "[Config] [Transport] media='{}' invalid, using default", raw);
                    d.media.clone()
                }
            },
        };

        let turn = config.get_non_empty(ICE, "turn_server").map(|server| TurnConfig {
            server: server.to_string(),
            username: config.get_non_empty_or_default(ICE, "turn_username", "").to_string(),
            password: config.get_non_empty_or_default(ICE, "turn_password", "").to_string(),
        });

        Self {
            mtu,
            trickle_ice: r.flag(TRANSPORT, "trickle_ice", d.trickle_ice),
            fec_enabled: r.flag(TRANSPORT, "fec_enabled", d.fec_enabled),
            fec,
            congestion,
            reassembly_timeout: r.millis(TRANSPORT, "reassembly_timeout_ms", d.reassembly_timeout),
            send_queue_capacity: r.positive(TRANSPORT, "send_queue_capacity", d.send_queue_capacity),
            recv_queue_capacity: r.positive(TRANSPORT, "recv_queue_capacity", d.recv_queue_capacity),
            pacing_tick: r.millis(TRANSPORT, "pacing_tick_ms", d.pacing_tick),
            packets_per_tick: r.positive(TRANSPORT, "packets_per_tick", d.packets_per_tick),
            sender_report_interval: r.millis(
                TRANSPORT,
                "sender_report_interval_ms",
                d.sender_report_interval,
            ),
            feedback_interval: r.millis(TRANSPORT, "feedback_interval_ms", d.feedback_interval),
            stats_interval: r.millis(TRANSPORT, "stats_interval_ms", d.stats_interval),
            media,
            stun_server: config.get_non_empty(ICE, "stun_server").map(str::to_string),
            turn,
        }
    }

    pub fn ice_config(&self, role: IceRole) -> IceConfig {
        IceConfig {
            role,
            trickle: self.trickle_ice,
            reliable: false,
            stun_server: self.stun_server.clone(),
            turn: self.turn.clone(),
        }
    }

    /// FEC applies to video only.
    pub fn send_channel(
        &self,
        media: MediaKind,
        codec: PayloadCodec,
        payload_type: u8,
        ssrc: u32,
        fec_ssrc: Option<u32>,
    ) -> SendChannelConfig {
        let mut cfg = SendChannelConfig::new(media, codec, payload_type, ssrc);
        if media == MediaKind::Video {
            cfg.fec_ssrc = fec_ssrc;
            cfg.fec = fec_ssrc.map(|_| self.fec.fit_mtu(self.mtu));
        }
        cfg.mtu = self.mtu;
        cfg.queue_capacity = self.send_queue_capacity;
        cfg.pacing_tick = self.pacing_tick;
        cfg.packets_per_tick = self.packets_per_tick;
        cfg.sender_report_interval = self.sender_report_interval;
        cfg
    }

    pub fn receive_channel(
        &self,
        media: MediaKind,
        codec: PayloadCodec,
        payload_type: u8,
        rtcp_ssrc: u32,
        fec_enabled: bool,
    ) -> ReceiveChannelConfig {
        let mut cfg = ReceiveChannelConfig::new(media, codec, payload_type, rtcp_ssrc);
        cfg.fec_enabled = fec_enabled && media == MediaKind::Video;
        cfg.queue_capacity = self.recv_queue_capacity;
        cfg.reassembly_timeout = self.reassembly_timeout;
        cfg.fec_window = DEFAULT_FEC_WINDOW;
        cfg.timer = RtcpTimerConfig {
            feedback_interval: self.feedback_interval,
            report_interval: self.sender_report_interval,
            ..RtcpTimerConfig::default()
        };
        cfg
    }
}

struct Reader<'a> {
    config: &'a Config,
    logger: &'a Arc<dyn LogSink>,
}

impl Reader<'_> {
    fn parsed<T: FromStr + Copy + std::fmt::Debug>(&self, section: &str, key: &str, default: T) -> T {
        match self.config.get_parsed::<T>(section, key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(raw) => {
                sink_warn!(
                    self.logger,
                    "[Config] [{}] {}='{}' is not valid, using {:?}",
                    section,
                    key,
                    raw,
                    default
                );
                default
            }
        }
    }

    fn flag(&self, section: &str, key: &str, default: bool) -> bool {
        match self.config.get_bool(section, key) {
            Ok(v) => v.unwrap_or(default),
            Err(raw) => {
                sink_warn!(
                    self.logger,
                    "[Config] [{}] {}='{}' is not a boolean, using {}",
                    section,
                    key,
                    raw,
                    default
                );
                default
            }
        }
    }

    fn positive(&self, section: &str, key: &str, default: usize) -> usize {
        match self.parsed(section, key, default) {
            0 => {
                sink_warn!(self.logger, "[Config] [{}] {}=0, using {}", section, key, default);
                default
            }
            v => v,
        }
    }

    fn millis(&self, section: &str, key: &str, default: Duration) -> Duration {
        let ms = self.positive(section, key, default.as_millis() as usize);
        Duration::from_millis(ms as u64)
    }
}

fn parse_media_list(raw: &str) -> Option<Vec<MediaKind>> {
    let mut out = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let media = MediaKind::ALL
            .into_iter()
            .find(|m| m.sdp_token().eq_ignore_ascii_case(token))?;
        if !out.contains(&media) {
            out.push(media);
        }
    }
    (!out.is_empty()).then_some(out)
}
