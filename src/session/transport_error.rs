use std::{fmt, sync::PoisonError};

use super::negotiation_state::NegotiationState;
use crate::{
    channel::{ChannelError, MediaKind},
    ice::{ConnState, IceError},
    sdp::SdpError,
    signaling::SignalingError,
};

/// Errors surfaced by the [`TransportNegotiator`](super::TransportNegotiator).
#[derive(Debug)]
pub enum TransportError {
    /// No payload type in the remote list is supported locally.
    NegotiationFailed { media: MediaKind },
    /// Send attempted while the ICE path is not Connected/Ready. Retry later.
    TransportNotReady(ConnState),
    InvalidState {
        state: NegotiationState,
        operation: &'static str,
    },
    /// The media was not negotiated for this session.
    NoChannel(MediaKind),
    Sdp(SdpError),
    Signaling(SignalingError),
    Ice(IceError),
    Channel(ChannelError),
    Spawn(String),
    Closed,
    MutexPoisoned,
}

impl TransportError {
    /// The caller should skip this send and try again on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::TransportNotReady(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TransportError::*;
        match self {
            NegotiationFailed { media } => write!(f, "no common payload type for {media}"),
            TransportNotReady(state) => write!(f, "transport not ready (ICE {state})"),
            InvalidState { state, operation } => write!(f, "cannot {operation} in state {state}"),
            NoChannel(media) => write!(f, "{media} was not negotiated"),
            Sdp(e) => write!(f, "SDP error: {e}"),
            Signaling(e) => write!(f, "signaling error: {e}"),
            Ice(e) => write!(f, "ICE error: {e}"),
            Channel(e) => write!(f, "channel error: {e}"),
            Spawn(e) => write!(f, "failed to spawn worker: {e}"),
            Closed => write!(f, "session closed"),
            MutexPoisoned => write!(f, "mutex poisoned"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Sdp(e) => Some(e),
            TransportError::Signaling(e) => Some(e),
            TransportError::Ice(e) => Some(e),
            TransportError::Channel(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SdpError> for TransportError {
    fn from(e: SdpError) -> Self {
        TransportError::Sdp(e)
    }
}

impl From<SignalingError> for TransportError {
    fn from(e: SignalingError) -> Self {
        TransportError::Signaling(e)
    }
}

impl From<IceError> for TransportError {
    fn from(e: IceError) -> Self {
        match e {
            IceError::NotReady(state) => TransportError::TransportNotReady(state),
            IceError::Closed => TransportError::Closed,
            other => TransportError::Ice(other),
        }
    }
}

impl From<ChannelError> for TransportError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Transport(ice) => ice.into(),
            other => TransportError::Channel(other),
        }
    }
}

impl<T> From<PoisonError<T>> for TransportError {
    fn from(_: PoisonError<T>) -> Self {
        TransportError::MutexPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ice_not_ready_becomes_transient_transport_error() {
        let e: TransportError = IceError::NotReady(ConnState::Checking).into();
        assert!(e.is_transient());
        assert!(matches!(e, TransportError::TransportNotReady(ConnState::Checking)));
    }

    #[test]
    fn negotiation_failure_names_the_media() {
        let e = TransportError::NegotiationFailed {
            media: MediaKind::Audio,
        };
        assert_eq!(e.to_string(), "no common payload type for audio");
        assert!(!e.is_transient());
    }
}
