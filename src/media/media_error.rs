use std::fmt;

use crate::session::TransportError;

#[derive(Debug)]
pub enum MediaError {
    Codec(String),
    Transport(TransportError),
}

impl MediaError {
    /// The frame was dropped because the path is not ready yet.
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaError::Transport(e) if e.is_transient())
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Codec(e) => write!(f, "Codec error: {e}"),
            MediaError::Transport(e) => write!(f, "Transport error: {e}"),
        }
    }
}

impl std::error::Error for MediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MediaError::Transport(e) => Some(e),
            MediaError::Codec(_) => None,
        }
    }
}

impl From<TransportError> for MediaError {
    fn from(e: TransportError) -> Self {
        MediaError::Transport(e)
    }
}
