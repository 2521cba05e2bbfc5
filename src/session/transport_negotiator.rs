//! The owning transport session.
//!
//! A [`TransportNegotiator`] holds the ICE engine, one send/receive channel
//! pair per negotiated media, the congestion controller worker and the
//! statistics worker. The application drives it with [`connect`] and
//! [`pump`]; everything observable comes back as [`TransportEvent`]s.
//!
//! [`connect`]: TransportNegotiator::connect
//! [`pump`]: TransportNegotiator::pump

use std::{
    collections::HashMap,
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use rand::Rng;

use super::{
    connection_status::ConnectionStatus,
    ice_dispatcher::{IceDispatcher, IceNotice},
    negotiation_state::NegotiationState,
    packet_router::{PacketRouter, Routes},
    payload_negotiation::{NegotiatedMedia, answer_template, fill_answer, negotiate, offer_section},
    ssrc_allocator::SsrcAllocator,
    transport_config::TransportConfig,
    transport_error::TransportError,
    transport_event::TransportEvent,
};
use crate::{
    channel::{ChannelReceive, ChannelSend, ChannelStats, MediaKind, SendControl, StatsWorker},
    congestion_controller::{CongestionController, CongestionControllerWorker},
    fec::FEC_PAYLOAD_TYPE,
    ice::{Candidate, ConnState, IceCredentials, IceEngine, IceEngineFactory, IceRole},
    log::log_sink::LogSink,
    sdp::{Attribute, MediaSection, SdpError, SessionDescription},
    signaling::{SignalEnvelope, SignalType, SignalingTransport},
    sink_debug, sink_error, sink_info, sink_warn,
};

const END_OF_CANDIDATES: &str = "end-of-candidates";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

/// Identifiers carried on every signaling envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIds {
    pub transmission_id: String,
    pub user_id: String,
    pub remote_user_id: String,
}

impl PeerIds {
    pub fn new(transmission_id: &str, user_id: &str, remote_user_id: &str) -> Self {
        Self {
            transmission_id: transmission_id.to_string(),
            user_id: user_id.to_string(),
            remote_user_id: remote_user_id.to_string(),
        }
    }
}

/// SSRCs chosen for one local media stream.
#[derive(Debug, Clone, Copy)]
struct LocalStream {
    media: MediaKind,
    ssrc: u32,
    fec_ssrc: Option<u32>,
}

pub struct TransportNegotiator {
    config: TransportConfig,
    role: Role,
    ids: PeerIds,
    state: NegotiationState,
    session_id: u64,
    signaling: Arc<dyn SignalingTransport>,
    ice: Box<dyn IceEngine>,
    router: Arc<PacketRouter>,
    notices: Receiver<IceNotice>,
    events: Sender<TransportEvent>,
    ssrcs: SsrcAllocator,
    local_streams: Vec<LocalStream>,
    local_candidates: Vec<Candidate>,
    gathering_done: bool,
    description_sent: bool,
    negotiated: Vec<NegotiatedMedia>,
    senders: HashMap<MediaKind, ChannelSend>,
    receivers: HashMap<MediaKind, ChannelReceive>,
    controller: Option<CongestionControllerWorker>,
    relay: Option<JoinHandle<()>>,
    stats: Option<StatsWorker>,
    torn_down: bool,
    logger: Arc<dyn LogSink>,
}

impl TransportNegotiator {
    /// Creates the session and its ICE engine. Nothing is sent until
    /// [`connect`](Self::connect).
    ///
    /// # Errors
    /// `Ice` if the engine cannot be created.
    pub fn new(
        config: TransportConfig,
        role: Role,
        ids: PeerIds,
        signaling: Arc<dyn SignalingTransport>,
        ice_factory: &dyn IceEngineFactory,
        events: Sender<TransportEvent>,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self, TransportError> {
        let router = Arc::new(PacketRouter::new(logger.clone()));
        let (notice_tx, notices) = mpsc::channel();
        let dispatcher = Arc::new(IceDispatcher::new(
            router.clone(),
            notice_tx,
            events.clone(),
            logger.clone(),
        ));
        let ice_role = match role {
            Role::Offerer => IceRole::Controlling,
            Role::Answerer => IceRole::Controlled,
        };
        let ice = ice_factory.create(config.ice_config(ice_role), dispatcher, logger.clone())?;

        let mut ssrcs = SsrcAllocator::new();
        let mut local_streams = Vec::with_capacity(config.media.len());
        for &media in &config.media {
            let ssrc = ssrcs.allocate();
            let fec_ssrc = if media == MediaKind::Video && config.fec_enabled {
                Some(ssrcs.allocate())
            } else {
                None
            };
            local_streams.push(LocalStream {
                media,
                ssrc,
                fec_ssrc,
            });
        }

        sink_info!(
            logger,
            "[Negotiator] {:?} created for transmission {} ({} -> {})",
            role,
            ids.transmission_id,
            ids.user_id,
            ids.remote_user_id
        );
        Ok(Self {
            session_id: u64::from(rand::thread_rng().r#gen::<u32>()),
            config,
            role,
            ids,
            state: NegotiationState::Idle,
            signaling,
            ice,
            router,
            notices,
            events,
            ssrcs,
            local_streams,
            local_candidates: Vec::new(),
            gathering_done: false,
            description_sent: false,
            negotiated: Vec::new(),
            senders: HashMap::new(),
            receivers: HashMap::new(),
            controller: None,
            relay: None,
            stats: None,
            torn_down: false,
            logger,
        })
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn ice_state(&self) -> ConnState {
        self.ice.state()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn negotiated(&self) -> &[NegotiatedMedia] {
        &self.negotiated
    }

    pub fn local_ssrc(&self, media: MediaKind) -> Option<u32> {
        self.local_streams.iter().find(|s| s.media == media).map(|s| s.ssrc)
    }

    /// Counters shared by the send and receive channel of `media`.
    pub fn channel_stats(&self, media: MediaKind) -> Option<Arc<ChannelStats>> {
        self.senders.get(&media).map(ChannelSend::stats)
    }

    pub fn rtt(&self, media: MediaKind) -> Option<Duration> {
        self.senders.get(&media).and_then(ChannelSend::rtt)
    }

    /// Starts the exchange. The offerer sends its offer right away with
    /// trickle ICE, or after gathering without it; the answerer waits for
    /// the offer.
    ///
    /// # Errors
    /// `InvalidState` unless `Idle`; signaling or ICE failures.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.expect_state(NegotiationState::Idle, "connect")?;
        let _ = self
            .events
            .send(TransportEvent::Status(ConnectionStatus::Connecting));
        match self.role {
            Role::Offerer => {
                self.set_state(NegotiationState::GatheringOrOffering);
                if self.config.trickle_ice {
                    self.send_description()?;
                }
                self.ice.gather_candidates()?;
            }
            Role::Answerer => self.set_state(NegotiationState::AwaitingRemote),
        }
        Ok(())
    }

    /// Handles pending ICE notices and at most one signaling message,
    /// waiting up to `timeout` for it.
    ///
    /// # Errors
    /// `Closed` after [`close`](Self::close); `NegotiationFailed` (the
    /// session is closed before returning); signaling, SDP or ICE failures.
    pub fn pump(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.state == NegotiationState::Closed {
            return Err(TransportError::Closed);
        }
        self.drain_notices()?;
        if let Some(envelope) = self.signaling.recv_timeout(timeout)? {
            self.handle_signal(envelope)?;
        }
        self.drain_notices()
    }

    pub fn send_video(&self, frame: &[u8], timestamp: u32) -> Result<usize, TransportError> {
        self.send_frame(MediaKind::Video, frame, timestamp)
    }

    pub fn send_audio(&self, frame: &[u8], timestamp: u32) -> Result<usize, TransportError> {
        self.send_frame(MediaKind::Audio, frame, timestamp)
    }

    pub fn send_data(&self, frame: &[u8], timestamp: u32) -> Result<usize, TransportError> {
        self.send_frame(MediaKind::Data, frame, timestamp)
    }

    /// Packetizes and queues one frame. Returns the number of media packets.
    ///
    /// # Errors
    /// `TransportNotReady` before negotiation or while the ICE path is not
    /// Connected/Ready (skip this frame and retry later); `NoChannel` for
    /// media that was not negotiated; `Closed`.
    pub fn send_frame(&self, media: MediaKind, frame: &[u8], timestamp: u32) -> Result<usize, TransportError> {
        if self.state == NegotiationState::Closed {
            return Err(TransportError::Closed);
        }
        let ice = self.ice.state();
        if !self.state.has_channels() || !ice.can_send() {
            return Err(TransportError::TransportNotReady(ice));
        }
        let channel = self.senders.get(&media).ok_or(TransportError::NoChannel(media))?;
        Ok(channel.send_frame(frame, timestamp)?)
    }

    /// Tears the session down: callbacks become no-ops, then channels,
    /// then the controller and statistics workers, and the ICE engine last.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.router.close();

        for (_, mut ch) in self.senders.drain() {
            ch.stop();
        }
        for (_, mut ch) in self.receivers.drain() {
            ch.stop();
        }

        if let Some(mut w) = self.controller.take() {
            w.stop();
        }
        if let Some(h) = self.relay.take()
            && h.join().is_err()
        {
            sink_warn!(self.logger, "[Negotiator] bitrate relay panicked");
        }
        if let Some(mut s) = self.stats.take() {
            s.stop();
        }

        self.ice.close();
        self.set_state(NegotiationState::Closed);
        let _ = self.events.send(TransportEvent::Status(ConnectionStatus::Closed));
        sink_info!(self.logger, "[Negotiator] session {} closed", self.ids.transmission_id);
    }

    fn expect_state(&self, expected: NegotiationState, operation: &'static str) -> Result<(), TransportError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransportError::InvalidState {
                state: self.state,
                operation,
            })
        }
    }

    fn set_state(&mut self, next: NegotiationState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            sink_warn!(
                self.logger,
                "[Negotiator] ignoring transition {} -> {}",
                self.state,
                next
            );
            return;
        }
        sink_info!(self.logger, "[Negotiator] {} -> {}", self.state, next);
        self.state = next;
        let _ = self.events.send(TransportEvent::Negotiation(next));
    }

    /// Aborts on a fatal negotiation error.
    fn fail(&mut self, err: &TransportError) {
        sink_error!(self.logger, "[Negotiator] {}", err);
        let _ = self.events.send(TransportEvent::Error(err.to_string()));
        let _ = self.events.send(TransportEvent::Status(ConnectionStatus::Failed));
        self.close();
    }

    fn drain_notices(&mut self) -> Result<(), TransportError> {
        while let Ok(notice) = self.notices.try_recv() {
            match notice {
                IceNotice::State(state) => self.on_ice_state(state),
                IceNotice::Candidate(c) => self.on_local_candidate(c)?,
                IceNotice::GatheringDone => self.on_local_gathering_done()?,
                IceNotice::SelectedPair { local, remote } => sink_info!(
                    self.logger,
                    "[Negotiator] selected pair {} <-> {}",
                    local.address,
                    remote.address
                ),
            }
        }
        Ok(())
    }

    fn on_ice_state(&mut self, state: ConnState) {
        match state {
            s if s.can_send() && self.state == NegotiationState::Negotiated => {
                self.set_state(NegotiationState::Active);
            }
            ConnState::Failed => sink_warn!(self.logger, "[Negotiator] connectivity failed"),
            ConnState::Disconnected => sink_warn!(self.logger, "[Negotiator] peer disconnected"),
            _ => {}
        }
    }

    fn on_local_candidate(&mut self, candidate: Candidate) -> Result<(), TransportError> {
        sink_debug!(self.logger, "[Negotiator] local candidate {}", candidate);
        let line = format!("a=candidate:{}", candidate.to_sdp_value());
        self.local_candidates.push(candidate);
        if self.config.trickle_ice && self.description_sent {
            self.send_signal(SignalType::NewCandidate, line)?;
        }
        Ok(())
    }

    fn on_local_gathering_done(&mut self) -> Result<(), TransportError> {
        self.gathering_done = true;
        if self.config.trickle_ice {
            if self.description_sent {
                self.send_signal(SignalType::NewCandidate, format!("a={END_OF_CANDIDATES}"))?;
            }
            return Ok(());
        }
        let pending = match self.role {
            Role::Offerer => self.state == NegotiationState::GatheringOrOffering,
            Role::Answerer => self.state.has_channels() && !self.description_sent,
        };
        if pending {
            self.send_description()?;
        }
        Ok(())
    }

    fn handle_signal(&mut self, envelope: SignalEnvelope) -> Result<(), TransportError> {
        if envelope.transmission_id != self.ids.transmission_id
            || envelope.user_id != self.ids.remote_user_id
        {
            sink_warn!(
                self.logger,
                "[Negotiator] {:?} from {} for transmission {} ignored",
                envelope.kind,
                envelope.user_id,
                envelope.transmission_id
            );
            return Ok(());
        }
        match envelope.kind {
            SignalType::Offer => self.on_remote_description(Role::Answerer, &envelope.sdp),
            SignalType::Answer => self.on_remote_description(Role::Offerer, &envelope.sdp),
            SignalType::NewCandidate => self.on_remote_candidate(&envelope.sdp),
        }
    }

    /// Applies the remote offer (answerer) or answer (offerer).
    fn on_remote_description(&mut self, expected_role: Role, text: &str) -> Result<(), TransportError> {
        if self.role != expected_role {
            return Err(TransportError::InvalidState {
                state: self.state,
                operation: "apply a description meant for the other role",
            });
        }
        self.expect_state(NegotiationState::AwaitingRemote, "apply a remote description")?;

        let remote = SessionDescription::parse(text)?;
        let negotiated = match negotiate(&remote, &self.config.media, self.config.fec_enabled) {
            Ok(n) => n,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        for n in &negotiated {
            sink_info!(
                self.logger,
                "[Negotiator] {} negotiated pt={} {} fec={}",
                n.media,
                n.payload_type,
                n.rtp_map.encoding_name,
                n.fec
            );
        }
        self.apply_remote_ice(&remote)?;

        let remote_ssrcs = remote_ssrcs(&remote);
        for &ssrc in remote_ssrcs.keys() {
            if !self.ssrcs.reserve(ssrc) {
                sink_warn!(self.logger, "[Negotiator] remote ssrc={:#010x} collides with a local one", ssrc);
            }
        }

        self.negotiated = negotiated;
        self.start_media(remote_ssrcs)?;
        self.set_state(NegotiationState::Negotiated);

        if self.role == Role::Answerer {
            if self.config.trickle_ice {
                self.send_description()?;
            }
            self.ice.gather_candidates()?;
        }
        if self.ice.state().can_send() {
            self.set_state(NegotiationState::Active);
        }
        Ok(())
    }

    fn apply_remote_ice(&mut self, remote: &SessionDescription) -> Result<(), TransportError> {
        let ufrag = remote.attr("ice-ufrag").ok_or(SdpError::Missing("a=ice-ufrag"))?;
        let pwd = remote.attr("ice-pwd").ok_or(SdpError::Missing("a=ice-pwd"))?;
        self.ice.set_remote_credentials(IceCredentials {
            ufrag: ufrag.to_string(),
            pwd: pwd.to_string(),
        })?;
        for value in remote.candidates() {
            match value.parse::<Candidate>() {
                Ok(c) => self.ice.add_remote_candidate(c)?,
                Err(e) => sink_warn!(self.logger, "[Negotiator] skipping remote candidate: {}", e),
            }
        }
        if remote.has_flag(END_OF_CANDIDATES) {
            self.ice.set_remote_gathering_done()?;
        }
        Ok(())
    }

    fn on_remote_candidate(&mut self, line: &str) -> Result<(), TransportError> {
        let line = line.trim();
        let value = line.strip_prefix("a=").unwrap_or(line);
        if value == END_OF_CANDIDATES {
            sink_debug!(self.logger, "[Negotiator] remote end-of-candidates");
            self.ice.set_remote_gathering_done()?;
            return Ok(());
        }
        match value.parse::<Candidate>() {
            Ok(c) => {
                sink_debug!(self.logger, "[Negotiator] remote candidate {}", c);
                self.ice.add_remote_candidate(c)?;
            }
            Err(e) => sink_warn!(self.logger, "[Negotiator] bad trickled candidate: {}", e),
        }
        Ok(())
    }

    fn local_stream(&self, media: MediaKind) -> Result<LocalStream, TransportError> {
        self.local_streams
            .iter()
            .find(|s| s.media == media)
            .copied()
            .ok_or(TransportError::NoChannel(media))
    }

    /// Starts the controller, one channel pair per negotiated media, the
    /// bitrate relay and the statistics worker, then installs the routes.
    fn start_media(&mut self, remote_ssrcs: HashMap<u32, MediaKind>) -> Result<(), TransportError> {
        let (estimate_tx, estimate_rx) = mpsc::channel();
        let controller = CongestionControllerWorker::start(
            CongestionController::new(self.config.congestion, self.logger.clone()),
            estimate_tx,
            self.logger.clone(),
        )
        .map_err(|e| TransportError::Spawn(e.to_string()))?;
        let controller_input = controller.input();
        let signals = controller.signals();
        self.controller = Some(controller);

        let transport = self.ice.transport();
        let mut routes = Routes {
            controller: Some(controller_input.clone()),
            remote_ssrcs,
            ..Routes::default()
        };
        let mut stats = Vec::new();

        for n in self.negotiated.clone() {
            let local = self.local_stream(n.media)?;
            let fec_ssrc = if n.fec { local.fec_ssrc } else { None };
            let counters = Arc::new(ChannelStats::default());

            let send = ChannelSend::start(
                self.config
                    .send_channel(n.media, n.codec, n.payload_type, local.ssrc, fec_ssrc),
                transport.clone(),
                Some(controller_input.clone()),
                Some(signals.clone()),
                counters.clone(),
                self.logger.clone(),
            )?;
            let recv = ChannelReceive::start(
                self.config
                    .receive_channel(n.media, n.codec, n.payload_type, local.ssrc, n.fec),
                transport.clone(),
                self.events.clone(),
                counters.clone(),
                self.logger.clone(),
            )?;

            routes.send_by_ssrc.insert(local.ssrc, send.handle());
            routes.receive_by_pt.insert(n.payload_type, recv.handle());
            if n.fec {
                routes.receive_by_pt.insert(FEC_PAYLOAD_TYPE, recv.handle());
            }
            stats.push((n.media, counters));
            self.senders.insert(n.media, send);
            self.receivers.insert(n.media, recv);
        }

        let probe_target = self
            .senders
            .get(&MediaKind::Video)
            .filter(|s| s.fec_ssrc().is_some())
            .map(ChannelSend::handle);
        let relay = {
            let events = self.events.clone();
            let logger = self.logger.clone();
            thread::Builder::new()
                .name("bwe-relay".into())
                .spawn(move || {
                    for estimate in estimate_rx {
                        if let Some(video) = &probe_target {
                            for probe in &estimate.probes {
                                video.post(SendControl::Probe(*probe));
                            }
                        }
                        sink_debug!(
                            logger,
                            "[Negotiator] target bitrate {} bps ({:?})",
                            estimate.target_bitrate_bps,
                            estimate.state
                        );
                        let _ = events.send(TransportEvent::Bitrate(estimate));
                    }
                })
                .map_err(|e| TransportError::Spawn(e.to_string()))?
        };
        self.relay = Some(relay);

        let events = self.events.clone();
        let worker = StatsWorker::start(
            stats,
            self.config.stats_interval,
            move |snapshots| {
                let _ = events.send(TransportEvent::Stats(snapshots));
            },
            self.logger.clone(),
        )
        .map_err(|e| TransportError::Spawn(e.to_string()))?;
        self.stats = Some(worker);

        self.router.install(routes);
        Ok(())
    }

    fn send_description(&mut self) -> Result<(), TransportError> {
        let sdp = self.local_description()?;
        let kind = match self.role {
            Role::Offerer => SignalType::Offer,
            Role::Answerer => SignalType::Answer,
        };
        sink_info!(
            self.logger,
            "[Negotiator] sending {:?} with {} candidates",
            kind,
            sdp.candidates().len()
        );
        self.send_signal(kind, sdp.to_string())?;
        self.description_sent = true;
        if self.role == Role::Offerer {
            self.set_state(NegotiationState::AwaitingRemote);
        }
        Ok(())
    }

    fn local_description(&self) -> Result<SessionDescription, TransportError> {
        let mut sdp = SessionDescription::new(self.session_id);
        let creds = self.ice.local_credentials();
        sdp.add_attr(Attribute::new("ice-ufrag", Some(creds.ufrag)));
        sdp.add_attr(Attribute::new("ice-pwd", Some(creds.pwd)));
        if self.config.trickle_ice {
            sdp.add_attr(Attribute::new("ice-options", Some("trickle".to_string())));
        }

        match self.role {
            Role::Offerer => {
                for stream in &self.local_streams {
                    let mut section = offer_section(stream.media, self.config.fec_enabled);
                    self.add_ssrc_attrs(&mut section, stream.ssrc, stream.fec_ssrc);
                    sdp.add_media(section);
                }
            }
            Role::Answerer => {
                for n in &self.negotiated {
                    let stream = self.local_stream(n.media)?;
                    let mut section = answer_template(n);
                    let fec_ssrc = if n.fec { stream.fec_ssrc } else { None };
                    self.add_ssrc_attrs(&mut section, stream.ssrc, fec_ssrc);
                    sdp.add_media(section);
                }
                fill_answer(&mut sdp, &self.negotiated)?;
            }
        }

        if !self.config.trickle_ice {
            for c in &self.local_candidates {
                sdp.add_attr(Attribute::new("candidate", Some(c.to_sdp_value())));
            }
            if self.gathering_done {
                sdp.add_attr(Attribute::flag(END_OF_CANDIDATES));
            }
        }
        Ok(sdp)
    }

    fn add_ssrc_attrs(&self, section: &mut MediaSection, ssrc: u32, fec_ssrc: Option<u32>) {
        for s in std::iter::once(ssrc).chain(fec_ssrc) {
            section.add_attr(Attribute::new(
                "ssrc",
                Some(format!("{s} cname:{}", self.ids.user_id)),
            ));
        }
    }

    fn send_signal(&self, kind: SignalType, sdp: String) -> Result<(), TransportError> {
        let envelope = SignalEnvelope::new(
            kind,
            &self.ids.transmission_id,
            &self.ids.user_id,
            &self.ids.remote_user_id,
            sdp,
        );
        self.signaling.send(&envelope)?;
        Ok(())
    }
}

impl Drop for TransportNegotiator {
    fn drop(&mut self) {
        self.close();
    }
}

/// `a=ssrc:<id> ...` lines of every section, mapped to the section's media.
fn remote_ssrcs(remote: &SessionDescription) -> HashMap<u32, MediaKind> {
    let mut out = HashMap::new();
    for section in remote.media_sections() {
        let Some(media) = MediaKind::ALL
            .into_iter()
            .find(|m| m.sdp_token() == section.media())
        else {
            continue;
        };
        for attr in section.attrs().iter().filter(|a| a.key() == "ssrc") {
            if let Some(ssrc) = attr
                .value()
                .and_then(|v| v.split_whitespace().next())
                .and_then(|t| t.parse::<u32>().ok())
            {
                out.insert(ssrc, media);
            }
        }
    }
    out
}
