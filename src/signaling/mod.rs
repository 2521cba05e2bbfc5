//! Offer/answer/candidate exchange with the remote peer.
pub mod in_memory;
pub mod signal_envelope;
pub mod signaling_error;
pub mod signaling_transport;

pub use in_memory::InMemorySignaling;
pub use signal_envelope::{SignalEnvelope, SignalType};
pub use signaling_error::SignalingError;
pub use signaling_transport::SignalingTransport;
