use std::fmt;

/// Where a [`TransportNegotiator`](super::TransportNegotiator) is in the
/// offer/answer exchange.
///
/// Offerer: `Idle -> GatheringOrOffering -> AwaitingRemote -> Negotiated -> Active`.
/// Answerer: `Idle -> AwaitingRemote -> Negotiated -> Active`.
/// Every state may move to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NegotiationState {
    Idle,
    GatheringOrOffering,
    /// Offer sent (offerer) or waiting for one (answerer).
    AwaitingRemote,
    /// Payload types agreed and channels running; connectivity may still be pending.
    Negotiated,
    /// Negotiated and the ICE path is Connected/Ready.
    Active,
    Closed,
}

impl NegotiationState {
    pub fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        matches!(
            (self, next),
            (Idle, GatheringOrOffering)
                | (Idle, AwaitingRemote)
                | (GatheringOrOffering, AwaitingRemote)
                | (AwaitingRemote, Negotiated)
                | (Negotiated, Active)
                | (_, Closed)
        ) && self != Closed
    }

    /// Channels exist in these states.
    pub fn has_channels(self) -> bool {
        matches!(self, NegotiationState::Negotiated | NegotiationState::Active)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
