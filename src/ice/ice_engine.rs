use std::sync::Arc;

use super::{
    candidate::Candidate, conn_state::ConnState, ice_config::{IceConfig, IceCredentials},
    ice_error::IceError, ice_event_handler::IceEventHandler, packet_transport::PacketTransport,
};
use crate::log::log_sink::LogSink;

/// Connectivity establishment owned by one transport session.
///
/// The engine runs its own event loop thread and reports through the
/// [`IceEventHandler`](super::ice_event_handler::IceEventHandler) given at
/// creation.
pub trait IceEngine: Send {
    /// Starts candidate gathering; candidates arrive through the handler.
    fn gather_candidates(&mut self) -> Result<(), IceError>;

    fn local_credentials(&self) -> IceCredentials;

    fn set_remote_credentials(&mut self, credentials: IceCredentials) -> Result<(), IceError>;

    fn add_remote_candidate(&mut self, candidate: Candidate) -> Result<(), IceError>;

    /// The remote side finished gathering (end-of-candidates).
    fn set_remote_gathering_done(&mut self) -> Result<(), IceError>;

    fn transport(&self) -> Arc<dyn PacketTransport>;

    fn state(&self) -> ConnState;

    /// Stops the event loop and joins its thread. Idempotent.
    fn close(&mut self);
}

/// Creates engines for a transport session (`Create(role, trickle,
/// reliable, turn-config)`).
pub trait IceEngineFactory: Send + Sync {
    fn create(
        &self,
        config: IceConfig,
        handler: Arc<dyn IceEventHandler>,
        logger: Arc<dyn LogSink>,
    ) -> Result<Box<dyn IceEngine>, IceError>;
}
