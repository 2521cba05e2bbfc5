//! Connectivity establishment: the engine capability the transport session
//! owns, plus an in-memory implementation.
pub mod candidate;
pub mod candidate_type;
pub mod conn_state;
pub mod ice_config;
pub mod ice_engine;
pub mod ice_error;
pub mod ice_event_handler;
pub mod loopback_engine;
pub mod loopback_network;
pub mod packet_transport;

pub use candidate::Candidate;
pub use candidate_type::CandidateType;
pub use conn_state::ConnState;
pub use ice_config::{IceConfig, IceCredentials, IceRole, TurnConfig};
pub use ice_engine::{IceEngine, IceEngineFactory};
pub use ice_error::IceError;
pub use ice_event_handler::IceEventHandler;
pub use loopback_engine::LoopbackIceEngine;
pub use loopback_network::{DropFilter, LoopbackNetwork};
pub use packet_transport::PacketTransport;
