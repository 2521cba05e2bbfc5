//! In-process datagram network for running two ICE engines without sockets.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, mpsc::Sender},
};

use super::{
    ice_config::IceConfig,
    ice_engine::{IceEngine, IceEngineFactory},
    ice_error::IceError,
    ice_event_handler::IceEventHandler,
    loopback_engine::LoopbackIceEngine,
};
use crate::log::log_sink::LogSink;

/// Returns true to drop a data datagram travelling to `to`.
pub type DropFilter = Arc<dyn Fn(SocketAddr, &[u8]) -> bool + Send + Sync>;

const FIRST_PORT: u16 = 40_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Datagram {
    BindingRequest { username: String, nominate: bool },
    BindingResponse,
    Data(Vec<u8>),
    /// Sent by an engine that is closing.
    Goodbye,
}

pub(crate) enum EngineInput {
    Gather,
    RemoteCredentials(super::ice_config::IceCredentials),
    RemoteCandidate(super::candidate::Candidate),
    RemoteGatheringDone,
    Datagram { from: SocketAddr, dgram: Datagram },
    Close,
}

#[derive(Default)]
struct NetworkInner {
    next_port: u16,
    endpoints: HashMap<SocketAddr, Sender<EngineInput>>,
    drop_filter: Option<DropFilter>,
}

/// Shared, cloneable handle to the in-memory network.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a loss model applied to media datagrams (not to checks).
    pub fn set_drop_filter<F>(&self, filter: F)
    where
        F: Fn(SocketAddr, &[u8]) -> bool + Send + Sync + 'static,
    {
        if let Ok(mut g) = self.inner.lock() {
            g.drop_filter = Some(Arc::new(filter));
        }
    }

    /// Creates an engine bound to a fresh loopback address.
    pub fn create_engine(
        &self,
        config: IceConfig,
        handler: Arc<dyn IceEventHandler>,
        logger: Arc<dyn LogSink>,
    ) -> Result<LoopbackIceEngine, IceError> {
        LoopbackIceEngine::start(self.clone(), config, handler, logger)
    }

    pub(crate) fn bind(&self, inbox: Sender<EngineInput>) -> Result<SocketAddr, IceError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| IceError::Engine("network lock poisoned".into()))?;
        if g.next_port == 0 {
            g.next_port = FIRST_PORT;
        }
        let port = g.next_port;
        g.next_port = g
            .next_port
            .checked_add(1)
            .ok_or_else(|| IceError::Engine("loopback ports exhausted".into()))?;
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        g.endpoints.insert(addr, inbox);
        Ok(addr)
    }

    pub(crate) fn unbind(&self, addr: SocketAddr) {
        if let Ok(mut g) = self.inner.lock() {
            g.endpoints.remove(&addr);
        }
    }

    /// Delivers a datagram. Dropped datagrams count as delivered.
    pub(crate) fn deliver(
        &self,
        from: SocketAddr,
        to: SocketAddr,
        dgram: Datagram,
    ) -> Result<(), IceError> {
        let (inbox, filter) = {
            let g = self
                .inner
                .lock()
                .map_err(|_| IceError::Engine("network lock poisoned".into()))?;
            let inbox = g
                .endpoints
                .get(&to)
                .cloned()
                .ok_or_else(|| IceError::Engine(format!("no route to {to}")))?;
            (inbox, g.drop_filter.clone())
        };
        if let (Datagram::Data(bytes), Some(f)) = (&dgram, filter) {
            if f(to, bytes) {
                return Ok(());
            }
        }
        inbox
            .send(EngineInput::Datagram { from, dgram })
            .map_err(|_| IceError::Engine(format!("endpoint {to} gone")))
    }
}

impl IceEngineFactory for LoopbackNetwork {
    fn create(
        &self,
        config: IceConfig,
        handler: Arc<dyn IceEventHandler>,
        logger: Arc<dyn LogSink>,
    ) -> Result<Box<dyn IceEngine>, IceError> {
        Ok(Box::new(self.create_engine(config, handler, logger)?))
    }
}
