//! The owning transport session: negotiation, routing and public events.
pub mod connection_status;
pub mod ice_dispatcher;
pub mod negotiation_state;
pub mod packet_classifier;
pub mod packet_router;
pub mod payload_negotiation;
pub mod ssrc_allocator;
pub mod transport_config;
pub mod transport_error;
pub mod transport_event;
pub mod transport_negotiator;

pub use connection_status::ConnectionStatus;
pub use negotiation_state::NegotiationState;
pub use packet_classifier::{PacketClass, classify};
pub use payload_negotiation::NegotiatedMedia;
pub use ssrc_allocator::SsrcAllocator;
pub use transport_config::TransportConfig;
pub use transport_error::TransportError;
pub use transport_event::TransportEvent;
pub use transport_negotiator::{PeerIds, Role, TransportNegotiator};
