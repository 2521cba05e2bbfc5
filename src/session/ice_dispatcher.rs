//! [`IceEventHandler`] owned by a transport session.
//!
//! Callbacks arrive on the ICE engine thread. Datagrams go straight to the
//! [`PacketRouter`]; everything else is forwarded as an [`IceNotice`] for
//! the negotiator to handle on its own thread.

use std::sync::{Arc, mpsc::Sender};

use super::{
    connection_status::ConnectionStatus, packet_router::PacketRouter,
    transport_event::TransportEvent,
};
use crate::{
    ice::{Candidate, ConnState, IceEventHandler},
    log::log_sink::LogSink,
    sink_debug, sink_info,
};

#[derive(Debug, Clone, PartialEq)]
pub enum IceNotice {
    State(ConnState),
    Candidate(Candidate),
    GatheringDone,
    SelectedPair { local: Candidate, remote: Candidate },
}

pub struct IceDispatcher {
    router: Arc<PacketRouter>,
    notices: Sender<IceNotice>,
    events: Sender<TransportEvent>,
    logger: Arc<dyn LogSink>,
}

impl IceDispatcher {
    pub fn new(
        router: Arc<PacketRouter>,
        notices: Sender<IceNotice>,
        events: Sender<TransportEvent>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            router,
            notices,
            events,
            logger,
        }
    }

    fn notify(&self, notice: IceNotice) {
        if self.router.is_closed() {
            return;
        }
        if self.notices.send(notice).is_err() {
            sink_debug!(self.logger, "[IceDispatcher] negotiator gone, notice dropped");
        }
    }
}

impl IceEventHandler for IceDispatcher {
    fn on_state_changed(&self, state: ConnState) {
        if self.router.is_closed() {
            return;
        }
        sink_info!(self.logger, "[IceDispatcher] ICE state {}", state);
        let _ = self.events.send(TransportEvent::IceState(state));
        if let Some(status) = ConnectionStatus::from_conn_state(state) {
            let _ = self.events.send(TransportEvent::Status(status));
        }
        self.notify(IceNotice::State(state));
    }

    fn on_new_candidate(&self, candidate: Candidate) {
        self.notify(IceNotice::Candidate(candidate));
    }

    fn on_gathering_done(&self) {
        self.notify(IceNotice::GatheringDone);
    }

    fn on_new_selected_pair(&self, local: &Candidate, remote: &Candidate) {
        self.notify(IceNotice::SelectedPair {
            local: local.clone(),
            remote: remote.clone(),
        });
    }

    fn on_receive(&self, bytes: &[u8]) {
        self.router.route(bytes);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use std::sync::mpsc;

    #[test]
    fn state_changes_become_events_and_notices() {
        let logger: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let router = Arc::new(PacketRouter::new(logger.clone()));
        let (ntx, nrx) = mpsc::channel();
        let (etx, erx) = mpsc::channel();
        let d = IceDispatcher::new(router, ntx, etx, logger);

        d.on_state_changed(ConnState::Connected);
        assert_eq!(erx.try_recv().unwrap(), TransportEvent::IceState(ConnState::Connected));
        assert_eq!(
            erx.try_recv().unwrap(),
            TransportEvent::Status(ConnectionStatus::Connected)
        );
        assert_eq!(nrx.try_recv().unwrap(), IceNotice::State(ConnState::Connected));
    }

    #[test]
    fn callbacks_after_close_are_ignored() {
        let logger: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let router = Arc::new(PacketRouter::new(logger.clone()));
        let (ntx, nrx) = mpsc::channel();
        let (etx, erx) = mpsc::channel();
        let d = IceDispatcher::new(router.clone(), ntx, etx, logger);

        router.close();
        d.on_state_changed(ConnState::Failed);
        d.on_gathering_done();
        d.on_receive(&[0x80, 96, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(erx.try_recv().is_err());
        assert!(nrx.try_recv().is_err());
    }
}
