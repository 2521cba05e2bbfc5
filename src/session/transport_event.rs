use crate::{
    channel::{MediaKind, StatsSnapshot},
    congestion_controller::BandwidthEstimate,
    ice::ConnState,
    reassembly::AccessUnit,
};

use super::{connection_status::ConnectionStatus, negotiation_state::NegotiationState};

/// Everything the transport reports to the application, delivered over the
/// `Sender<TransportEvent>` given to the negotiator.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Status(ConnectionStatus),
    IceState(ConnState),
    Negotiation(NegotiationState),
    /// A complete frame, ready for the decoder.
    Frame { media: MediaKind, frame: AccessUnit },
    /// New congestion controller output; apply it to the encoders.
    Bitrate(BandwidthEstimate),
    Stats(Vec<StatsSnapshot>),
    Error(String),
}
