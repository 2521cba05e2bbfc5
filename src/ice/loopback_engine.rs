//! ICE engine over a [`LoopbackNetwork`]: host candidates, binding checks
//! with ufrag validation, nomination by the controlling side.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{
    candidate::Candidate,
    conn_state::ConnState,
    ice_config::{IceConfig, IceCredentials, IceRole},
    ice_engine::IceEngine,
    ice_error::IceError,
    ice_event_handler::IceEventHandler,
    loopback_network::{Datagram, EngineInput, LoopbackNetwork},
    packet_transport::PacketTransport,
};
use crate::{log::log_sink::LogSink, sink_debug, sink_info, sink_warn};

const CHECK_INTERVAL: Duration = Duration::from_millis(50);
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

struct Shared {
    state: Mutex<ConnState>,
    selected_remote: Mutex<Option<SocketAddr>>,
    local_addr: SocketAddr,
    network: LoopbackNetwork,
}

impl Shared {
    fn state(&self) -> ConnState {
        self.state.lock().map_or(ConnState::Failed, |s| *s)
    }
}

/// Send side handed to the channels.
struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl PacketTransport for LoopbackTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), IceError> {
        let state = self.shared.state();
        if !state.can_send() {
            return Err(IceError::NotReady(state));
        }
        let remote = self
            .shared
            .selected_remote
            .lock()
            .map_err(|_| IceError::Engine("selected pair lock poisoned".into()))?
            .ok_or(IceError::NotReady(state))?;
        self.shared
            .network
            .deliver(self.shared.local_addr, remote, Datagram::Data(bytes.to_vec()))
    }

    fn state(&self) -> ConnState {
        self.shared.state()
    }
}

pub struct LoopbackIceEngine {
    inbox: Sender<EngineInput>,
    shared: Arc<Shared>,
    credentials: IceCredentials,
    handle: Option<JoinHandle<()>>,
    logger: Arc<dyn LogSink>,
}

impl LoopbackIceEngine {
    pub(crate) fn start(
        network: LoopbackNetwork,
        config: IceConfig,
        handler: Arc<dyn IceEventHandler>,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self, IceError> {
        let (inbox, rx) = mpsc::channel();
        let local_addr = network.bind(inbox.clone())?;
        let shared = Arc::new(Shared {
            state: Mutex::new(ConnState::New),
            selected_remote: Mutex::new(None),
            local_addr,
            network,
        });
        let credentials = IceCredentials::generate();

        let mut agent = Agent {
            config,
            shared: shared.clone(),
            handler,
            logger: logger.clone(),
            local: credentials.clone(),
            remote: None,
            local_candidates: Vec::new(),
            remote_candidates: Vec::new(),
            gathered: false,
            checks_started: None,
            last_check: None,
            nominated: false,
        };
        let handle = thread::Builder::new()
            .name("ice-loopback".into())
            .spawn(move || agent.run(rx))
            .map_err(|e| IceError::Engine(format!("spawn failed: {e}")))?;

        sink_debug!(logger.as_ref(), "[ICE] loopback engine bound to {}", local_addr);
        Ok(Self {
            inbox,
            shared,
            credentials,
            handle: Some(handle),
            logger,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    fn post(&self, input: EngineInput) -> Result<(), IceError> {
        self.inbox.send(input).map_err(|_| IceError::Closed)
    }
}

impl IceEngine for LoopbackIceEngine {
    fn gather_candidates(&mut self) -> Result<(), IceError> {
        self.post(EngineInput::Gather)
    }

    fn local_credentials(&self) -> IceCredentials {
        self.credentials.clone()
    }

    fn set_remote_credentials(&mut self, credentials: IceCredentials) -> Result<(), IceError> {
        self.post(EngineInput::RemoteCredentials(credentials))
    }

    fn add_remote_candidate(&mut self, candidate: Candidate) -> Result<(), IceError> {
        self.post(EngineInput::RemoteCandidate(candidate))
    }

    fn set_remote_gathering_done(&mut self) -> Result<(), IceError> {
        self.post(EngineInput::RemoteGatheringDone)
    }

    fn transport(&self) -> Arc<dyn PacketTransport> {
        Arc::new(LoopbackTransport {
            shared: self.shared.clone(),
        })
    }

    fn state(&self) -> ConnState {
        self.shared.state()
    }

    fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.inbox.send(EngineInput::Close);
        if handle.join().is_err() {
            sink_warn!(self.logger.as_ref(), "[ICE] engine thread panicked");
        }
        self.shared.network.unbind(self.shared.local_addr);
    }
}

impl Drop for LoopbackIceEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// State owned by the engine thread.
struct Agent {
    config: IceConfig,
    shared: Arc<Shared>,
    handler: Arc<dyn IceEventHandler>,
    logger: Arc<dyn LogSink>,
    local: IceCredentials,
    remote: Option<IceCredentials>,
    local_candidates: Vec<Candidate>,
    remote_candidates: Vec<Candidate>,
    gathered: bool,
    checks_started: Option<Instant>,
    last_check: Option<Instant>,
    nominated: bool,
}

impl Agent {
    fn run(&mut self, rx: Receiver<EngineInput>) {
        loop {
            match rx.recv_timeout(CHECK_INTERVAL) {
                Ok(EngineInput::Close) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(EngineInput::Gather) => self.gather(),
                Ok(EngineInput::RemoteCredentials(c)) => {
                    self.remote = Some(c);
                    self.maybe_start_checks();
                }
                Ok(EngineInput::RemoteCandidate(c)) => {
                    if !self.remote_candidates.contains(&c) {
                        self.remote_candidates.push(c);
                        self.remote_candidates
                            .sort_by(|a, b| b.priority.cmp(&a.priority));
                    }
                    self.maybe_start_checks();
                }
                Ok(EngineInput::RemoteGatheringDone) => {
                    sink_debug!(self.logger.as_ref(), "[ICE] remote gathering done");
                }
                Ok(EngineInput::Datagram { from, dgram }) => self.on_datagram(from, dgram),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.on_tick();
        }
        self.say_goodbye();
        self.set_state(ConnState::Closed);
    }

    fn set_state(&self, state: ConnState) {
        let changed = match self.shared.state.lock() {
            Ok(mut s) if *s != state => {
                *s = state;
                true
            }
            _ => false,
        };
        if changed {
            sink_info!(self.logger.as_ref(), "[ICE] state -> {}", state);
            self.handler.on_state_changed(state);
        }
    }

    fn gather(&mut self) {
        if self.gathered {
            return;
        }
        self.set_state(ConnState::Gathering);
        if self.config.stun_server.is_some() || self.config.turn.is_some() {
            sink_debug!(
                self.logger.as_ref(),
                "[ICE] loopback network has no NAT, using host candidates only"
            );
        }
        let host = Candidate::host(self.shared.local_addr);
        self.local_candidates.push(host.clone());
        self.handler.on_new_candidate(host);
        self.gathered = true;
        self.handler.on_gathering_done();
        self.maybe_start_checks();
    }

    fn maybe_start_checks(&mut self) {
        if self.checks_started.is_some()
            || !self.gathered
            || self.remote.is_none()
            || self.remote_candidates.is_empty()
        {
            return;
        }
        self.checks_started = Some(Instant::now());
        self.set_state(ConnState::Checking);
        self.send_checks(false);
    }

    fn on_tick(&mut self) {
        let Some(started) = self.checks_started else {
            return;
        };
        if self.shared.state() != ConnState::Checking {
            return;
        }
        if started.elapsed() > CHECK_TIMEOUT {
            sink_warn!(self.logger.as_ref(), "[ICE] connectivity checks timed out");
            self.set_state(ConnState::Failed);
            return;
        }
        if self.last_check.is_none_or(|t| t.elapsed() >= CHECK_INTERVAL) {
            self.send_checks(false);
        }
    }

    fn send_checks(&mut self, nominate: bool) {
        let Some(remote) = &self.remote else { return };
        let username = format!("{}:{}", remote.ufrag, self.local.ufrag);
        for c in &self.remote_candidates {
            let req = Datagram::BindingRequest {
                username: username.clone(),
                nominate,
            };
            if let Err(e) = self.shared.network.deliver(self.shared.local_addr, c.address, req) {
                sink_debug!(self.logger.as_ref(), "[ICE] check to {} failed: {}", c.address, e);
            }
        }
        self.last_check = Some(Instant::now());
    }

    fn on_datagram(&mut self, from: SocketAddr, dgram: Datagram) {
        match dgram {
            Datagram::BindingRequest { username, nominate } => {
                let expected_prefix = format!("{}:", self.local.ufrag);
                if !username.starts_with(&expected_prefix) {
                    sink_warn!(self.logger.as_ref(), "[ICE] check from {} with bad username", from);
                    return;
                }
                let _ = self
                    .shared
                    .network
                    .deliver(self.shared.local_addr, from, Datagram::BindingResponse);
                if nominate && self.config.role == IceRole::Controlled {
                    self.select(from);
                }
            }
            Datagram::BindingResponse => {
                if self.shared.state() != ConnState::Checking {
                    return;
                }
                self.set_state(ConnState::Connected);
                if self.config.role == IceRole::Controlling && !self.nominated {
                    self.nominated = true;
                    let req = Datagram::BindingRequest {
                        username: self
                            .remote
                            .as_ref()
                            .map(|r| format!("{}:{}", r.ufrag, self.local.ufrag))
                            .unwrap_or_default(),
                        nominate: true,
                    };
                    let _ = self.shared.network.deliver(self.shared.local_addr, from, req);
                    self.select(from);
                }
            }
            Datagram::Data(bytes) => {
                if self.shared.state().can_send() {
                    self.handler.on_receive(&bytes);
                }
            }
            Datagram::Goodbye => {
                if self.shared.state().can_send() {
                    self.set_state(ConnState::Disconnected);
                }
            }
        }
    }

    fn select(&mut self, remote_addr: SocketAddr) {
        if let Ok(mut sel) = self.shared.selected_remote.lock() {
            if sel.is_some() {
                return;
            }
            *sel = Some(remote_addr);
        }
        let local = self
            .local_candidates
            .first()
            .cloned()
            .unwrap_or_else(|| Candidate::host(self.shared.local_addr));
        let remote = self
            .remote_candidates
            .iter()
            .find(|c| c.address == remote_addr)
            .cloned()
            .unwrap_or_else(|| Candidate::host(remote_addr));
        if self.shared.state() == ConnState::Checking {
            self.set_state(ConnState::Connected);
        }
        self.handler.on_new_selected_pair(&local, &remote);
        self.set_state(ConnState::Ready);
    }

    fn say_goodbye(&self) {
        let selected = self.shared.selected_remote.lock().ok().and_then(|s| *s);
        if let Some(remote) = selected {
            let _ = self
                .shared
                .network
                .deliver(self.shared.local_addr, remote, Datagram::Goodbye);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::log::NoopLogSink;

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<ConnState>>,
        candidates: Mutex<Vec<Candidate>>,
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl IceEventHandler for Recorder {
        fn on_state_changed(&self, state: ConnState) {
            self.states.lock().unwrap().push(state);
        }
        fn on_new_candidate(&self, candidate: Candidate) {
            self.candidates.lock().unwrap().push(candidate);
        }
        fn on_gathering_done(&self) {}
        fn on_new_selected_pair(&self, _local: &Candidate, _remote: &Candidate) {}
        fn on_receive(&self, bytes: &[u8]) {
            self.received.lock().unwrap().push(bytes.to_vec());
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn connect_pair(
        net: &LoopbackNetwork,
    ) -> (LoopbackIceEngine, Arc<Recorder>, LoopbackIceEngine, Arc<Recorder>) {
        let logger: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let ha = Arc::new(Recorder::default());
        let hb = Arc::new(Recorder::default());
        let mut a = net
            .create_engine(IceConfig::new(IceRole::Controlling), ha.clone(), logger.clone())
            .unwrap();
        let mut b = net
            .create_engine(IceConfig::new(IceRole::Controlled), hb.clone(), logger)
            .unwrap();
        a.gather_candidates().unwrap();
        b.gather_candidates().unwrap();
        assert!(wait_for(|| !ha.candidates.lock().unwrap().is_empty()
            && !hb.candidates.lock().unwrap().is_empty()));

        a.set_remote_credentials(b.local_credentials()).unwrap();
        b.set_remote_credentials(a.local_credentials()).unwrap();
        for c in hb.candidates.lock().unwrap().iter() {
            a.add_remote_candidate(c.clone()).unwrap();
        }
        for c in ha.candidates.lock().unwrap().iter() {
            b.add_remote_candidate(c.clone()).unwrap();
        }
        (a, ha, b, hb)
    }

    #[test]
    fn send_before_ready_is_not_ready() {
        let net = LoopbackNetwork::new();
        let a = net
            .create_engine(
                IceConfig::new(IceRole::Controlling),
                Arc::new(Recorder::default()),
                Arc::new(NoopLogSink),
            )
            .unwrap();
        let err = a.transport().send(b"x").unwrap_err();
        assert_eq!(err, IceError::NotReady(ConnState::New));
    }

    #[test]
    fn two_engines_reach_ready_and_exchange_data() {
        let net = LoopbackNetwork::new();
        let (a, _ha, b, hb) = connect_pair(&net);
        assert!(wait_for(|| a.state() == ConnState::Ready && b.state() == ConnState::Ready));

        a.transport().send(b"hello").unwrap();
        assert!(wait_for(|| hb.received.lock().unwrap().len() == 1));
        assert_eq!(hb.received.lock().unwrap()[0], b"hello".to_vec());
    }

    #[test]
    fn closing_one_side_disconnects_the_other() {
        let net = LoopbackNetwork::new();
        let (mut a, ha, b, hb) = connect_pair(&net);
        assert!(wait_for(|| a.state() == ConnState::Ready && b.state() == ConnState::Ready));

        a.close();
        a.close();
        assert_eq!(a.state(), ConnState::Closed);
        assert!(wait_for(|| b.state() == ConnState::Disconnected));
        assert!(ha.states.lock().unwrap().contains(&ConnState::Closed));
        assert!(hb.states.lock().unwrap().contains(&ConnState::Disconnected));
    }

    #[test]
    fn wrong_credentials_never_connect() {
        let net = LoopbackNetwork::new();
        let logger: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let ha = Arc::new(Recorder::default());
        let hb = Arc::new(Recorder::default());
        let mut a = net
            .create_engine(IceConfig::new(IceRole::Controlling), ha.clone(), logger.clone())
            .unwrap();
        let mut b = net
            .create_engine(IceConfig::new(IceRole::Controlled), hb.clone(), logger)
            .unwrap();
        a.gather_candidates().unwrap();
        b.gather_candidates().unwrap();
        assert!(wait_for(|| !hb.candidates.lock().unwrap().is_empty()));
        a.set_remote_credentials(IceCredentials::generate()).unwrap();
        a.add_remote_candidate(hb.candidates.lock().unwrap()[0].clone())
            .unwrap();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(a.state(), ConnState::Checking);
        assert!(!b.state().can_send());
    }
}
