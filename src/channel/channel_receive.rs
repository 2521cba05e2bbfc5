//! Receive side of one media channel.
//!
//! The ICE thread only pushes datagrams into the inbox. The receive thread
//! owns the reassembler, the frame assembler and the FEC sessions; the RTCP
//! timer thread shares only the feedback state behind a mutex.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{
    bounded_queue::BoundedQueue,
    channel_config::ReceiveChannelConfig,
    channel_error::ChannelError,
    channel_stats::ChannelStats,
    feedback_recorder::FeedbackRecorder,
    media_kind::MediaKind,
    nack_tracker::NackTracker,
    rtcp_timer::{RtcpDue, RtcpSignaller, RtcpTimer},
    rx_tracker::RxTracker,
};
use crate::{
    fec::{CauchyBlockCodec, FEC_PAYLOAD_TYPE, FecError, FecReceiver},
    ice::PacketTransport,
    log::log_sink::LogSink,
    reassembly::{FrameAssembler, Fragment, ReassembledUnit, Reassembler, ReassemblyOutcome},
    rtcp::{GenericNack, ReceiverReport, RtcpPacket, SenderReport},
    rtp::{
        RtpPacket,
        payload::{PayloadCodec, PayloadFraming},
        time::NtpTime,
    },
    session::transport_event::TransportEvent,
    sink_debug, sink_info, sink_trace, sink_warn,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAINTENANCE_INTERVAL: Duration = Duration::from_millis(50);
/// Incomplete frames older than this get a recovery attempt.
const STALE_FRAME_AGE: Duration = Duration::from_millis(100);
const INITIAL_RTT: Duration = Duration::from_millis(100);

/// State shared between the receive thread and the RTCP timer.
struct FeedbackState {
    rx: RxTracker,
    nack: NackTracker,
    recorder: FeedbackRecorder,
    remote_ssrc: Option<u32>,
    rtt: Duration,
    reported_lost: i64,
}

/// Cloneable network-facing side of a [`ChannelReceive`], used from the
/// ICE thread.
#[derive(Clone)]
pub struct ReceiveHandle {
    media: MediaKind,
    inbox: Arc<BoundedQueue<Vec<u8>>>,
    feedback: Arc<Mutex<FeedbackState>>,
    stats: Arc<ChannelStats>,
    logger: Arc<dyn LogSink>,
}

impl ReceiveHandle {
    pub fn media(&self) -> MediaKind {
        self.media
    }

    /// Hands one RTP datagram to the receive thread. Never blocks.
    pub fn deliver(&self, bytes: Vec<u8>) {
        match self.inbox.push(bytes) {
            Ok(None) => {}
            Ok(Some(_)) | Err(_) => self.stats.on_queue_dropped(),
        }
    }

    /// The remote media SSRC once the first packet has arrived.
    pub fn remote_ssrc(&self) -> Option<u32> {
        self.feedback.lock().ok().and_then(|f| f.remote_ssrc)
    }

    /// Records an SR from the remote sender for LSR/DLSR.
    ///
    /// # Errors
    /// `MutexPoisoned`.
    pub fn on_sender_report(&self, sr: &SenderReport, arrival_compact: u32) -> Result<(), ChannelError> {
        let mut fb = self.feedback.lock()?;
        if fb.remote_ssrc.is_some_and(|s| s != sr.ssrc) {
            sink_debug!(
                self.logger,
                "[RTCP] SR from unexpected ssrc={:#010x} on {}",
                sr.ssrc,
                self.media
            );
            return Ok(());
        }
        fb.rx
            .on_sr_received(sr.info.ntp, arrival_compact);
        Ok(())
    }

    /// Paces NACK re-requests.
    ///
    /// # Errors
    /// `MutexPoisoned`.
    pub fn set_rtt(&self, rtt: Duration) -> Result<(), ChannelError> {
        self.feedback.lock()?.rtt = rtt;
        Ok(())
    }
}

pub struct ChannelReceive {
    shared: ReceiveHandle,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    timer: Option<RtcpTimer>,
    logger: Arc<dyn LogSink>,
}

impl ChannelReceive {
    /// Starts the receive thread and the RTCP timer. Complete frames are
    /// published on `events`; RTCP goes out through `transport`.
    ///
    /// # Errors
    /// `Spawn` if a thread cannot be created.
    pub fn start(
        config: ReceiveChannelConfig,
        transport: Arc<dyn PacketTransport>,
        events: Sender<TransportEvent>,
        stats: Arc<ChannelStats>,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self, ChannelError> {
        let inbox = Arc::new(BoundedQueue::new(config.queue_capacity));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let feedback = Arc::new(Mutex::new(FeedbackState {
            rx: RxTracker::default(),
            nack: NackTracker::default(),
            recorder: FeedbackRecorder::default(),
            remote_ssrc: None,
            rtt: INITIAL_RTT,
            reported_lost: 0,
        }));

        let timer = RtcpTimer::start(
            format!("rtcp-timer-{}", config.media),
            config.timer,
            rtcp_reporter(
                config.rtcp_ssrc,
                feedback.clone(),
                transport,
                stats.clone(),
                logger.clone(),
            ),
            logger.clone(),
        )
        .map_err(|e| ChannelError::Spawn(e.to_string()))?;

        let fec = config.fec_enabled.then(|| {
            FecReceiver::new(Arc::new(CauchyBlockCodec::new())).with_window(config.fec_window)
        });
        let mut pipeline = ReceivePipeline {
            media: config.media,
            codec: config.codec,
            payload_type: config.payload_type,
            clock_rate: config.media.clock_rate(),
            reassembly_timeout: config.reassembly_timeout,
            inbox: inbox.clone(),
            feedback: feedback.clone(),
            stats: stats.clone(),
            events,
            signaller: timer.signaller(),
            reassembler: Reassembler::new(config.reassembly_timeout, logger.clone()),
            assembler: FrameAssembler::new(logger.clone()),
            fec,
            gaps: HashMap::new(),
            epoch: Instant::now(),
            stop_flag: stop_flag.clone(),
            logger: logger.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("channel-recv-{}", config.media))
            .spawn(move || pipeline.run())
            .map_err(|e| ChannelError::Spawn(e.to_string()))?;

        sink_info!(
            logger,
            "[ChannelReceive] {} started pt={} fec={}",
            config.media,
            config.payload_type,
            config.fec_enabled
        );
        Ok(Self {
            shared: ReceiveHandle {
                media: config.media,
                inbox,
                feedback,
                stats,
                logger: logger.clone(),
            },
            stop_flag,
            handle: Some(handle),
            timer: Some(timer),
            logger,
        })
    }

    pub fn media(&self) -> MediaKind {
        self.shared.media
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.shared.stats.clone()
    }

    pub fn handle(&self) -> ReceiveHandle {
        self.shared.clone()
    }

    pub fn deliver(&self, bytes: Vec<u8>) {
        self.shared.deliver(bytes);
    }

    pub fn remote_ssrc(&self) -> Option<u32> {
        self.shared.remote_ssrc()
    }

    /// Stops the RTCP timer and the receive thread, joining both. Idempotent.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.shared.inbox.close();
        if let Some(mut t) = self.timer.take() {
            t.stop();
        }
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                sink_warn!(self.logger, "[ChannelReceive] receive thread panicked");
            }
            sink_info!(self.logger, "[ChannelReceive] {} stopped", self.shared.media);
        }
    }
}

impl Drop for ChannelReceive {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds the closure run by the RTCP timer: congestion feedback, receiver
/// report and NACK in one compound packet.
fn rtcp_reporter(
    rtcp_ssrc: u32,
    feedback: Arc<Mutex<FeedbackState>>,
    transport: Arc<dyn PacketTransport>,
    stats: Arc<ChannelStats>,
    logger: Arc<dyn LogSink>,
) -> impl FnMut(RtcpDue) + Send + 'static {
    move |due: RtcpDue| {
        let now = Instant::now();
        let now_compact = NtpTime::now().compact();

        let mut pkts = Vec::new();
        {
            let Ok(mut fb) = feedback.lock() else {
                return;
            };
            if due.report
                && let Some(remote) = fb.remote_ssrc
                && fb.rx.has_received()
            {
                let block = fb.rx.build_report_block(remote, now_compact);
                let lost = fb.rx.cumulative_lost();
                stats.on_lost((lost - fb.reported_lost).max(0) as u64);
                fb.reported_lost = lost;
                pkts.push(RtcpPacket::Rr(ReceiverReport::new(rtcp_ssrc, vec![block])));
            }
            if due.feedback
                && let Some(ccfb) = fb.recorder.build(rtcp_ssrc, now, now_compact)
            {
                pkts.push(RtcpPacket::Ccfb(ccfb));
            }
            if let Some(remote) = fb.remote_ssrc {
                let rtt = fb.rtt;
                let lost = fb.nack.take_due(now, rtt);
                if !lost.is_empty() {
                    sink_debug!(logger, "[RTCP] NACK {} packets of ssrc={:#010x}", lost.len(), remote);
                    pkts.push(RtcpPacket::Nack(GenericNack::from_lost(rtcp_ssrc, remote, &lost)));
                }
            }
        }
        if pkts.is_empty() {
            return;
        }

        let bytes = match RtcpPacket::encode_compound(&pkts) {
            Ok(b) => b,
            Err(e) => {
                sink_warn!(logger, "[RTCP] failed to encode compound: {}", e);
                return;
            }
        };
        match transport.send(&bytes) {
            Ok(()) => sink_trace!(logger, "[RTCP] tx {} packets, {} bytes", pkts.len(), bytes.len()),
            Err(e) => sink_debug!(logger, "[RTCP] feedback not sent: {}", e),
        }
    }
}

/// State owned by the receive thread.
struct ReceivePipeline {
    media: MediaKind,
    codec: PayloadCodec,
    payload_type: u8,
    clock_rate: u32,
    reassembly_timeout: Duration,
    inbox: Arc<BoundedQueue<Vec<u8>>>,
    feedback: Arc<Mutex<FeedbackState>>,
    stats: Arc<ChannelStats>,
    events: Sender<TransportEvent>,
    signaller: RtcpSignaller,
    reassembler: Reassembler,
    assembler: FrameAssembler,
    fec: Option<FecReceiver>,
    /// Timestamps with a reported gap, waiting for repair symbols.
    gaps: HashMap<u32, Instant>,
    epoch: Instant,
    stop_flag: Arc<AtomicBool>,
    logger: Arc<dyn LogSink>,
}

impl ReceivePipeline {
    fn run(&mut self) {
        let mut last_maintenance = Instant::now();
        while !self.stop_flag.load(Ordering::SeqCst) {
            if let Some(bytes) = self.inbox.pop_timeout(POLL_INTERVAL) {
                self.on_datagram(&bytes, Instant::now());
            } else if self.inbox.is_closed() {
                break;
            }
            if last_maintenance.elapsed() >= MAINTENANCE_INTERVAL {
                last_maintenance = Instant::now();
                self.maintain(last_maintenance);
            }
        }
        sink_debug!(self.logger, "[ChannelReceive] {} receive loop exited", self.media);
    }

    fn remote_ssrc(&self) -> Option<u32> {
        self.feedback.lock().ok().and_then(|f| f.remote_ssrc)
    }

    fn on_datagram(&mut self, bytes: &[u8], now: Instant) {
        let pkt = match RtpPacket::decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                sink_debug!(self.logger, "[ChannelReceive] malformed RTP dropped: {}", e);
                return;
            }
        };
        self.stats.on_received(bytes.len());
        if let Ok(mut fb) = self.feedback.lock() {
            fb.recorder.record(pkt.ssrc(), pkt.sequence_number(), now);
        }

        if pkt.payload_type() == FEC_PAYLOAD_TYPE {
            self.on_repair(&pkt, now);
        } else if pkt.payload_type() == self.payload_type {
            self.on_media(pkt, now);
        } else {
            sink_debug!(
                self.logger,
                "[ChannelReceive] {} ignoring pt={}",
                self.media,
                pkt.payload_type()
            );
        }
    }

    fn on_media(&mut self, pkt: RtpPacket, now: Instant) {
        let (ssrc, seq, ts) = (pkt.ssrc(), pkt.sequence_number(), pkt.timestamp());
        let arrival = (now.duration_since(self.epoch).as_secs_f64() * f64::from(self.clock_rate)) as u32;

        let mut new_gaps = false;
        if let Ok(mut fb) = self.feedback.lock() {
            if fb.remote_ssrc.is_none() {
                fb.remote_ssrc = Some(ssrc);
                sink_info!(
                    self.logger,
                    "[ChannelReceive] {} bound remote ssrc={:#010x}",
                    self.media,
                    ssrc
                );
            }
            if fb.remote_ssrc == Some(ssrc) {
                fb.rx.on_rtp(seq, ts, arrival);
                new_gaps = fb.nack.on_packet(seq);
            }
        }
        if new_gaps {
            self.signaller.signal();
        }

        if let (Some(fec), Some(offset)) = (self.fec.as_mut(), pkt.block_offset()) {
            fec.on_media(ts, offset, &pkt.payload, now);
        }

        match Fragment::from_packet(&pkt, self.codec) {
            Ok(frag) => self.on_fragment(frag, now),
            Err(e) => sink_debug!(
                self.logger,
                "[ChannelReceive] unparsable payload seq={}: {}",
                seq,
                e
            ),
        }
    }

    fn on_repair(&mut self, pkt: &RtpPacket, now: Instant) {
        if pkt.payload.is_empty() {
            // probe padding
            return;
        }
        let ts = pkt.timestamp();
        let Some(fec) = self.fec.as_mut() else {
            return;
        };
        if let Err(e) = fec.on_repair(ts, &pkt.payload, now) {
            sink_debug!(self.logger, "[FEC] repair for ts={} rejected: {}", ts, e);
            return;
        }
        if self.gaps.contains_key(&ts) {
            self.try_recover(ts, now);
        }
    }

    fn on_fragment(&mut self, frag: Fragment, now: Instant) {
        match self.reassembler.insert(frag, now) {
            ReassemblyOutcome::Complete(unit) => self.on_unit(unit, now),
            ReassemblyOutcome::Pending => {}
            ReassemblyOutcome::Gap {
                timestamp,
                missing_seq,
                ..
            } => {
                sink_trace!(
                    self.logger,
                    "[ChannelReceive] gap at seq={} ts={}",
                    missing_seq,
                    timestamp
                );
                if self.fec.is_some() {
                    self.gaps.entry(timestamp).or_insert(now);
                    self.try_recover(timestamp, now);
                }
            }
            ReassemblyOutcome::Dropped(reason) => {
                sink_trace!(self.logger, "[ChannelReceive] fragment dropped: {:?}", reason);
            }
        }
    }

    fn on_unit(&mut self, unit: ReassembledUnit, now: Instant) {
        let Some(frame) = self.assembler.push(unit, now) else {
            return;
        };
        self.gaps.remove(&frame.timestamp);
        if let Some(fec) = self.fec.as_mut() {
            fec.complete(frame.timestamp);
        }
        self.stats.on_frame_received();
        sink_trace!(
            self.logger,
            "[ChannelReceive] {} frame ts={} {} bytes",
            self.media,
            frame.timestamp,
            frame.data.len()
        );
        if self
            .events
            .send(TransportEvent::Frame {
                media: self.media,
                frame,
            })
            .is_err()
        {
            sink_debug!(self.logger, "[ChannelReceive] event receiver gone");
        }
    }

    /// Tries to rebuild the frame at `ts` from repair symbols and feeds the
    /// recovered payloads back through reassembly.
    fn try_recover(&mut self, ts: u32, now: Instant) {
        let Some(ssrc) = self.remote_ssrc() else {
            return;
        };
        let Some(fec) = self.fec.as_mut() else {
            return;
        };
        if !fec.has_repairs(ts) {
            return;
        }
        let recovered = match fec.recover(ts) {
            Ok(r) => r,
            Err(FecError::Unrecoverable { received, needed }) => {
                sink_trace!(
                    self.logger,
                    "[FEC] ts={} not yet recoverable ({}/{})",
                    ts,
                    received,
                    needed
                );
                return;
            }
            Err(e) => {
                sink_debug!(self.logger, "[FEC] recovery of ts={} failed: {}", ts, e);
                return;
            }
        };
        self.gaps.remove(&ts);

        let missing: Vec<_> = recovered
            .into_iter()
            .filter(|p| {
                !self.reassembler.is_held(ssrc, p.sequence_number)
                    && !self.reassembler.is_consumed(ssrc, p.sequence_number)
            })
            .collect();
        if missing.is_empty() {
            return;
        }
        self.stats.on_fec_recovered(missing.len() as u64);
        if let Ok(mut fb) = self.feedback.lock() {
            for p in &missing {
                fb.nack.on_packet(p.sequence_number);
            }
        }
        sink_debug!(
            self.logger,
            "[FEC] recovered {} packets of ts={}",
            missing.len(),
            ts
        );

        for p in missing {
            let framing = match PayloadFraming::parse(self.codec, &p.payload) {
                Ok(f) => f,
                Err(e) => {
                    sink_warn!(
                        self.logger,
                        "[FEC] recovered seq={} is not a valid payload: {}",
                        p.sequence_number,
                        e
                    );
                    continue;
                }
            };
            self.on_fragment(
                Fragment {
                    ssrc,
                    seq: p.sequence_number,
                    timestamp: ts,
                    marker: p.last,
                    block_offset: Some(p.block_offset),
                    framing,
                },
                now,
            );
        }
    }

    fn maintain(&mut self, now: Instant) {
        if self.fec.is_some() {
            let mut stale = self.assembler.stale_timestamps(now, STALE_FRAME_AGE);
            if let Some(ssrc) = self.remote_ssrc() {
                stale.extend(self.reassembler.stale_timestamps(ssrc, now, STALE_FRAME_AGE));
            }
            stale.sort_unstable();
            stale.dedup();
            for ts in stale {
                self.try_recover(ts, now);
            }
        }

        let fragments = self.reassembler.evict_expired(now);
        let frames = self.assembler.evict_expired(now, self.reassembly_timeout);
        if fragments > 0 || frames > 0 {
            sink_debug!(
                self.logger,
                "[ChannelReceive] {} evicted {} fragments, {} frames",
                self.media,
                fragments,
                frames
            );
        }
        if let Some(fec) = self.fec.as_mut() {
            for ts in fec.evict_expired(now) {
                self.gaps.remove(&ts);
            }
        }
        let timeout = self.reassembly_timeout;
        self.gaps
            .retain(|_, since| now.saturating_duration_since(*since) < timeout);
    }
}
