//! Send side of one media channel.
//!
//! The application thread packetizes frames into the bounded queue; the
//! pacing thread drains at most `packets_per_tick` packets per tick within
//! the byte budget of the current target bitrate, answers NACKs from the
//! retransmission buffer, plays out probe clusters and emits Sender
//! Reports.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use rand::Rng;

use super::{
    bounded_queue::BoundedQueue, channel_config::SendChannelConfig, channel_error::ChannelError,
    channel_stats::ChannelStats, media_kind::MediaKind, pacing_gate::PacingGate,
    retransmission_buffer::RetransmissionBuffer, tx_tracker::TxTracker,
};
use crate::{
    congestion_controller::{ControllerInput, ControllerSignals, ProbeClusterConfig, SentPacket},
    fec::{
        CauchyBlockCodec, FEC_PAYLOAD_TYPE, FecEncoder, FecError, source_block::SourceBlockBuilder,
    },
    ice::{IceError, PacketTransport},
    log::log_sink::LogSink,
    rtcp::{RtcpPacket, SenderInfo, SenderReport, report_block::ReportBlock},
    rtp::{
        RtpPacket,
        config::{FRAME_BLOCK_OFFSET_EXTENSION_LEN, RTP_FIXED_HEADER_LEN},
        payload::{
            PayloadCodec, RtpPayloadChunk, av1_packetizer::Av1Packetizer,
            h264_packetizer::H264Packetizer,
        },
        time::NtpTime,
    },
    sink_debug, sink_info, sink_trace, sink_warn,
};

/// Padding carried by one probe packet.
const PROBE_PADDING: u8 = 255;

/// Messages for the pacing thread, routed from incoming RTCP.
#[derive(Debug, Clone)]
pub enum SendControl {
    Nack(Vec<u16>),
    ReportBlock { block: ReportBlock, arrival_compact: u32 },
    Probe(ProbeClusterConfig),
}

/// Cloneable RTCP-facing side of a [`ChannelSend`].
#[derive(Clone)]
pub struct SendHandle {
    pub media: MediaKind,
    pub ssrc: u32,
    control: Sender<SendControl>,
    rtt_micros: Arc<AtomicU64>,
}

impl SendHandle {
    /// False once the channel has stopped.
    pub fn post(&self, ctrl: SendControl) -> bool {
        self.control.send(ctrl).is_ok()
    }

    pub fn rtt(&self) -> Option<Duration> {
        rtt_from_micros(self.rtt_micros.load(Ordering::Relaxed))
    }
}

fn rtt_from_micros(us: u64) -> Option<Duration> {
    (us > 0).then(|| Duration::from_micros(us))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketKind {
    Media { payload_len: usize, timestamp: u32 },
    Repair,
    Probe(u32),
    Retransmission,
}

#[derive(Debug, Clone)]
struct OutboundPacket {
    bytes: Vec<u8>,
    ssrc: u32,
    seq: u16,
    kind: PacketKind,
}

/// Retransmissions queued for a single NACK, at most.
pub const MAX_RETRANSMISSIONS_PER_NACK: usize = 64;

#[derive(Debug, Default, PartialEq, Eq)]
struct Requeued {
    resent: usize,
    evicted: usize,
}

/// Puts the oldest NACKed packets still held in `rtx` at the head of the
/// queue, in sequence order. Anything the full queue pushes out the back is
/// counted as evicted.
fn queue_retransmissions(
    queue: &BoundedQueue<OutboundPacket>,
    rtx: &RetransmissionBuffer,
    ssrc: u32,
    seqs: &[u16],
) -> Requeued {
    let mut out = Requeued::default();
    let held: Vec<(u16, &[u8])> = seqs
        .iter()
        .filter_map(|&seq| rtx.get(seq).map(|b| (seq, b)))
        .take(MAX_RETRANSMISSIONS_PER_NACK.min(queue.capacity()))
        .collect();
    // reversed so the oldest ends up first in line
    for (seq, bytes) in held.into_iter().rev() {
        let pkt = OutboundPacket {
            bytes: bytes.to_vec(),
            ssrc,
            seq,
            kind: PacketKind::Retransmission,
        };
        if queue.push_front(pkt).is_some() {
            out.evicted += 1;
        }
        out.resent += 1;
    }
    out
}

pub struct ChannelSend {
    config: SendChannelConfig,
    queue: Arc<BoundedQueue<OutboundPacket>>,
    next_seq: Mutex<u16>,
    fec_seq: Arc<AtomicU16>,
    fec_encoder: Option<FecEncoder>,
    control_tx: Sender<SendControl>,
    stats: Arc<ChannelStats>,
    /// Last RTT from a report block, in microseconds; 0 until known.
    rtt_micros: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    logger: Arc<dyn LogSink>,
}

impl ChannelSend {
    /// Creates the channel and starts its pacing thread. `stats` may be
    /// shared with the receive channel of the same media.
    ///
    /// # Errors
    /// `Spawn` if the thread cannot be created.
    pub fn start(
        config: SendChannelConfig,
        transport: Arc<dyn PacketTransport>,
        controller: Option<Sender<ControllerInput>>,
        signals: Option<Arc<ControllerSignals>>,
        stats: Arc<ChannelStats>,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self, ChannelError> {
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let (control_tx, control_rx) = mpsc::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let rtt_micros = Arc::new(AtomicU64::new(0));
        let mut rng = rand::thread_rng();
        let fec_seq = Arc::new(AtomicU16::new(rng.r#gen()));
        let fec_encoder = match (config.fec, config.fec_ssrc) {
            (Some(fec), Some(_)) => Some(FecEncoder::new(
                fec.fit_mtu(config.mtu),
                Arc::new(CauchyBlockCodec::new()),
            )),
            _ => None,
        };

        let mut pacer = Pacer {
            media: config.media,
            ssrc: config.ssrc,
            fec_ssrc: config.fec_ssrc,
            clock_rate: config.media.clock_rate(),
            tick: config.pacing_tick,
            packets_per_tick: config.packets_per_tick.max(1),
            sr_interval: config.sender_report_interval,
            queue: queue.clone(),
            transport,
            controller,
            signals,
            stats: stats.clone(),
            rtt_micros: rtt_micros.clone(),
            stop_flag: stop_flag.clone(),
            fec_seq: fec_seq.clone(),
            gate: PacingGate::new(config.pacing_tick),
            rtx: RetransmissionBuffer::default(),
            tx_tracker: TxTracker::default(),
            probes: VecDeque::new(),
            probe_quota: 0,
            last_media: None,
            packet_count: 0,
            octet_count: 0,
            logger: logger.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("channel-send-{}", config.media))
            .spawn(move || pacer.run(control_rx))
            .map_err(|e| ChannelError::Spawn(e.to_string()))?;

        sink_info!(
            logger,
            "[ChannelSend] {} started ssrc={:#010x} pt={}",
            config.media,
            config.ssrc,
            config.payload_type
        );
        Ok(Self {
            next_seq: Mutex::new(rng.r#gen()),
            config,
            queue,
            fec_seq,
            fec_encoder,
            control_tx,
            stats,
            rtt_micros,
            stop_flag,
            handle: Some(handle),
            logger,
        })
    }

    pub fn media(&self) -> MediaKind {
        self.config.media
    }

    pub fn ssrc(&self) -> u32 {
        self.config.ssrc
    }

    pub fn fec_ssrc(&self) -> Option<u32> {
        self.config.fec_ssrc
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.stats.clone()
    }

    pub fn rtt(&self) -> Option<Duration> {
        rtt_from_micros(self.rtt_micros.load(Ordering::Relaxed))
    }

    pub fn control(&self) -> Sender<SendControl> {
        self.control_tx.clone()
    }

    /// What incoming RTCP needs to reach this channel.
    pub fn handle(&self) -> SendHandle {
        SendHandle {
            media: self.config.media,
            ssrc: self.config.ssrc,
            control: self.control_tx.clone(),
            rtt_micros: self.rtt_micros.clone(),
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn overhead(&self) -> usize {
        RTP_FIXED_HEADER_LEN + FRAME_BLOCK_OFFSET_EXTENSION_LEN
    }

    fn packetize(&self, frame: &[u8]) -> Result<Vec<RtpPayloadChunk>, ChannelError> {
        let overhead = self.overhead();
        Ok(match self.config.codec {
            PayloadCodec::H264 => H264Packetizer::new(self.config.mtu)
                .with_overhead(overhead)
                .packetize(frame),
            PayloadCodec::Av1 => Av1Packetizer::new(self.config.mtu)
                .with_overhead(overhead)
                .packetize(frame)?,
            PayloadCodec::Generic => {
                let max = self.config.mtu.saturating_sub(overhead).max(1);
                let n = frame.len().div_ceil(max);
                frame
                    .chunks(max)
                    .enumerate()
                    .map(|(i, c)| RtpPayloadChunk::new(c.to_vec(), i + 1 == n))
                    .collect()
            }
        })
    }

    /// Packetizes one encoded frame and queues it, followed by its repair
    /// symbols when FEC is on. Returns the number of media packets.
    ///
    /// # Errors
    /// `Stopped`, `EmptyFrame`, or a packetization error.
    pub fn send_frame(&self, frame: &[u8], timestamp: u32) -> Result<usize, ChannelError> {
        if self.stop_flag.load(Ordering::SeqCst) || self.queue.is_closed() {
            return Err(ChannelError::Stopped);
        }
        let chunks = self.packetize(frame)?;
        if chunks.is_empty() {
            return Err(ChannelError::EmptyFrame);
        }

        let mut block = SourceBlockBuilder::new();
        let mut next_seq = self.next_seq.lock()?;
        let base_seq = *next_seq;
        for chunk in &chunks {
            let seq = *next_seq;
            *next_seq = next_seq.wrapping_add(1);
            let offset = block.push(&chunk.bytes);
            let pkt = RtpPacket::simple(
                self.config.payload_type,
                chunk.marker,
                seq,
                timestamp,
                self.config.ssrc,
                chunk.bytes.clone(),
            )
            .with_block_offset(offset);
            self.enqueue(OutboundPacket {
                bytes: pkt.encode()?,
                ssrc: self.config.ssrc,
                seq,
                kind: PacketKind::Media {
                    payload_len: chunk.bytes.len(),
                    timestamp,
                },
            });
        }
        drop(next_seq);

        if let (Some(encoder), Some(fec_ssrc)) = (&self.fec_encoder, self.config.fec_ssrc) {
            match encoder.encode(&block.finish(), base_seq) {
                Ok(repairs) => {
                    for r in repairs {
                        let seq = self.fec_seq.fetch_add(1, Ordering::Relaxed);
                        let pkt = RtpPacket::simple(
                            FEC_PAYLOAD_TYPE,
                            false,
                            seq,
                            timestamp,
                            fec_ssrc,
                            r.to_payload(),
                        );
                        self.enqueue(OutboundPacket {
                            bytes: pkt.encode()?,
                            ssrc: fec_ssrc,
                            seq,
                            kind: PacketKind::Repair,
                        });
                    }
                }
                Err(e @ FecError::BlockTooLarge { .. }) => {
                    sink_debug!(self.logger, "[ChannelSend] frame sent without FEC: {}", e);
                }
                Err(e) => {
                    sink_warn!(self.logger, "[ChannelSend] FEC encode failed: {}", e);
                }
            }
        }

        self.stats.on_frame_sent();
        sink_trace!(
            self.logger,
            "[ChannelSend] {} frame ts={} in {} packets",
            self.config.media,
            timestamp,
            chunks.len()
        );
        Ok(chunks.len())
    }

    fn enqueue(&self, pkt: OutboundPacket) {
        match self.queue.push(pkt) {
            Ok(None) => {}
            Ok(Some(evicted)) => {
                self.stats.on_queue_dropped();
                sink_debug!(
                    self.logger,
                    "[ChannelSend] queue full, dropped seq={} ssrc={:#010x}",
                    evicted.seq,
                    evicted.ssrc
                );
            }
            Err(_) => self.stats.on_queue_dropped(),
        }
    }

    /// Stops the pacing thread and joins it. Idempotent.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.queue.close();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                sink_warn!(self.logger, "[ChannelSend] pacing thread panicked");
            }
            sink_info!(self.logger, "[ChannelSend] {} stopped", self.config.media);
        }
    }
}

impl Drop for ChannelSend {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the pacing thread.
struct Pacer {
    media: MediaKind,
    ssrc: u32,
    fec_ssrc: Option<u32>,
    clock_rate: u32,
    tick: Duration,
    packets_per_tick: usize,
    sr_interval: Duration,
    queue: Arc<BoundedQueue<OutboundPacket>>,
    transport: Arc<dyn PacketTransport>,
    controller: Option<Sender<ControllerInput>>,
    signals: Option<Arc<ControllerSignals>>,
    stats: Arc<ChannelStats>,
    rtt_micros: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    fec_seq: Arc<AtomicU16>,
    gate: PacingGate,
    rtx: RetransmissionBuffer,
    tx_tracker: TxTracker,
    probes: VecDeque<OutboundPacket>,
    probe_quota: usize,
    /// RTP timestamp of the last media packet sent and when.
    last_media: Option<(u32, Instant)>,
    packet_count: u32,
    octet_count: u32,
    logger: Arc<dyn LogSink>,
}

impl Pacer {
    fn run(&mut self, control_rx: Receiver<SendControl>) {
        let mut last_sr = Instant::now();
        while !self.stop_flag.load(Ordering::SeqCst) {
            match control_rx.recv_timeout(self.tick) {
                Ok(ctrl) => {
                    self.on_control(ctrl);
                    while let Ok(more) = control_rx.try_recv() {
                        self.on_control(more);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.on_tick();

            if last_sr.elapsed() >= self.sr_interval {
                last_sr = Instant::now();
                self.send_sender_report();
            }
        }
        sink_debug!(self.logger, "[ChannelSend] {} pacing loop exited", self.media);
    }

    fn on_control(&mut self, ctrl: SendControl) {
        match ctrl {
            SendControl::Nack(seqs) => {
                let queued = queue_retransmissions(&self.queue, &self.rtx, self.ssrc, &seqs);
                for _ in 0..queued.evicted {
                    self.stats.on_queue_dropped();
                }
                for _ in 0..queued.resent {
                    self.stats.on_retransmitted();
                }
                if queued.resent < seqs.len() {
                    sink_debug!(
                        self.logger,
                        "[ChannelSend] NACK for {} seqs, resent {} (evicted {})",
                        seqs.len(),
                        queued.resent,
                        queued.evicted
                    );
                }
            }
            SendControl::ReportBlock {
                block,
                arrival_compact,
            } => {
                let rtt = self
                    .tx_tracker
                    .on_report_block(&block, arrival_compact, Instant::now());
                let Some(rtt) = rtt else { return };
                sink_debug!(self.logger, "[ChannelSend] rtt={}ms", rtt.as_millis());
                self.rtt_micros
                    .store((rtt.as_micros() as u64).max(1), Ordering::Relaxed);
                if let Some(ctl) = &self.controller {
                    let _ = ctl.send(ControllerInput::Rtt(rtt));
                }
            }
            SendControl::Probe(cluster) => self.schedule_probe(cluster),
        }
    }

    fn schedule_probe(&mut self, cluster: ProbeClusterConfig) {
        let Some(fec_ssrc) = self.fec_ssrc else {
            return;
        };
        let per_packet = RTP_FIXED_HEADER_LEN + usize::from(PROBE_PADDING);
        let count = cluster
            .target_bytes()
            .div_ceil(per_packet)
            .max(cluster.min_packets);
        let ticks = (cluster.duration.as_micros() / self.tick.as_micros().max(1)).max(1) as usize;
        self.probe_quota = count.div_ceil(ticks);

        let ts = self.last_media.map_or(0, |(ts, _)| ts);
        for _ in 0..count {
            let seq = self.fec_seq.fetch_add(1, Ordering::Relaxed);
            let pkt = RtpPacket::padding_only(FEC_PAYLOAD_TYPE, seq, ts, fec_ssrc, PROBE_PADDING);
            match pkt.encode() {
                Ok(bytes) => self.probes.push_back(OutboundPacket {
                    bytes,
                    ssrc: fec_ssrc,
                    seq,
                    kind: PacketKind::Probe(cluster.id),
                }),
                Err(e) => sink_warn!(self.logger, "[ChannelSend] probe encode failed: {}", e),
            }
        }
        sink_debug!(
            self.logger,
            "[ChannelSend] probe cluster {} at {} bps: {} packets",
            cluster.id,
            cluster.target_bps,
            count
        );
    }

    fn on_tick(&mut self) {
        // probes bypass the pacing budget
        for _ in 0..self.probe_quota {
            let Some(pkt) = self.probes.pop_front() else {
                break;
            };
            if !self.transmit(pkt) {
                return;
            }
        }

        let Some(target) = self.signals.as_ref().map(|s| s.target_bitrate_bps()) else {
            self.drain(self.packets_per_tick, false);
            return;
        };
        self.gate.refill(target);
        let congested = self.signals.as_ref().is_some_and(|s| s.is_congested());
        // keep one packet per tick flowing so feedback can reopen the window
        let limit = if congested { 1 } else { self.packets_per_tick };
        self.drain(limit, true);
    }

    fn drain(&mut self, limit: usize, paced: bool) {
        for _ in 0..limit {
            if paced && !self.gate.can_send() {
                break;
            }
            let Some(pkt) = self.queue.try_pop() else {
                break;
            };
            let len = pkt.bytes.len();
            if !self.transmit(pkt) {
                break;
            }
            if paced {
                self.gate.consume(len);
            }
        }
    }

    /// Sends one packet. Returns false when the rest of this tick should be
    /// skipped.
    fn transmit(&mut self, pkt: OutboundPacket) -> bool {
        match self.transport.send(&pkt.bytes) {
            Ok(()) => {}
            Err(IceError::NotReady(state)) => {
                sink_debug!(
                    self.logger,
                    "[ChannelSend] {} transport not ready ({}), skipping tick",
                    self.media,
                    state
                );
                match pkt.kind {
                    PacketKind::Probe(_) => self.probes.push_front(pkt),
                    _ => {
                        if self.queue.push_front(pkt).is_some() {
                            self.stats.on_queue_dropped();
                        }
                    }
                }
                return false;
            }
            Err(e) => {
                sink_warn!(self.logger, "[ChannelSend] send failed: {}", e);
                return false;
            }
        }

        let now = Instant::now();
        let len = pkt.bytes.len();
        self.stats.on_sent(len);

        if let Some(ctl) = &self.controller {
            let mut sent = SentPacket::new(pkt.ssrc, pkt.seq, len, now);
            if let PacketKind::Probe(id) = pkt.kind {
                sent = sent.with_probe_cluster(id);
            }
            let _ = ctl.send(ControllerInput::PacketSent(sent));
        }

        if let PacketKind::Media {
            payload_len,
            timestamp,
        } = pkt.kind
        {
            self.packet_count = self.packet_count.wrapping_add(1);
            self.octet_count = self.octet_count.wrapping_add(payload_len as u32);
            self.last_media = Some((timestamp, now));
            self.rtx.insert(pkt.seq, pkt.bytes);
        }
        true
    }

    fn send_sender_report(&mut self) {
        let Some((last_ts, sent_at)) = self.last_media else {
            return;
        };
        let ntp = NtpTime::now();
        let elapsed_units = (sent_at.elapsed().as_secs_f64() * f64::from(self.clock_rate)) as u32;
        let info = SenderInfo {
            ntp,
            rtp_ts: last_ts.wrapping_add(elapsed_units),
            packet_count: self.packet_count,
            octet_count: self.octet_count,
        };
        let sr = RtcpPacket::Sr(SenderReport::new(self.ssrc, info, Vec::new()));
        let bytes = match sr.encode() {
            Ok(b) => b,
            Err(e) => {
                sink_warn!(self.logger, "[RTCP] failed to encode SR: {}", e);
                return;
            }
        };
        match self.transport.send(&bytes) {
            Ok(()) => {
                self.tx_tracker.mark_sr_sent(ntp);
                sink_debug!(
                    self.logger,
                    "[RTCP] tx SR ssrc={:#010x} lsr={:#010x}",
                    self.ssrc,
                    ntp.compact()
                );
            }
            Err(e) => sink_debug!(self.logger, "[RTCP] SR not sent: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn filled_rtx() -> RetransmissionBuffer {
        let mut rtx = RetransmissionBuffer::default();
        for seq in 0..512u16 {
            rtx.insert(seq, vec![seq as u8; 40]);
        }
        rtx
    }

    #[test]
    fn repeated_nacks_keep_the_queue_bounded() {
        let queue = BoundedQueue::new(32);
        let rtx = filled_rtx();
        let all: Vec<u16> = (0..512).collect();
        for _ in 0..20 {
            queue_retransmissions(&queue, &rtx, 7, &all);
            assert!(queue.len() <= queue.capacity());
        }
        assert_eq!(queue.len(), 32);
        assert_eq!(queue.try_pop().unwrap().seq, 0);
    }

    #[test]
    fn one_nack_resends_at_most_the_cap() {
        let queue = BoundedQueue::new(1024);
        let rtx = filled_rtx();
        let all: Vec<u16> = (0..512).collect();
        let queued = queue_retransmissions(&queue, &rtx, 7, &all);
        assert_eq!(queued.resent, MAX_RETRANSMISSIONS_PER_NACK);
        assert_eq!(queued.evicted, 0);
        assert_eq!(queue.len(), MAX_RETRANSMISSIONS_PER_NACK);
        let first = queue.try_pop().unwrap();
        assert_eq!((first.seq, first.kind), (0, PacketKind::Retransmission));
    }

    #[test]
    fn unknown_sequence_numbers_are_skipped() {
        let queue = BoundedQueue::new(8);
        let rtx = filled_rtx();
        let queued = queue_retransmissions(&queue, &rtx, 7, &[3, 40_000, 5]);
        assert_eq!(queued, Requeued { resent: 2, evicted: 0 });
        assert_eq!(queue.try_pop().unwrap().seq, 3);
        assert_eq!(queue.try_pop().unwrap().seq, 5);
    }
}
