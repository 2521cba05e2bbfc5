use std::fmt;

#[derive(Debug)]
pub enum SignalingError {
    Json(serde_json::Error),
    /// The other end of the channel is gone.
    Closed,
    /// A well-formed envelope that makes no sense in the current state.
    Unexpected(String),
    MutexPoisoned,
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingError::Json(e) => write!(f, "invalid signaling message: {e}"),
            SignalingError::Closed => write!(f, "signaling channel closed"),
            SignalingError::Unexpected(m) => write!(f, "unexpected signaling message: {m}"),
            SignalingError::MutexPoisoned => write!(f, "Mutex poisoned"),
        }
    }
}

impl std::error::Error for SignalingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignalingError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(e: serde_json::Error) -> Self {
        SignalingError::Json(e)
    }
}

impl<T> From<std::sync::PoisonError<T>> for SignalingError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SignalingError::MutexPoisoned
    }
}
