use std::fmt;

use super::conn_state::ConnState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IceError {
    /// Send attempted while the path is not Connected/Ready.
    NotReady(ConnState),
    Closed,
    InvalidCandidate(String),
    /// Remote credentials are needed before checks can start.
    MissingRemoteCredentials,
    Engine(String),
}

impl IceError {
    /// Retry later rather than tear down.
    pub fn is_transient(&self) -> bool {
        matches!(self, IceError::NotReady(_))
    }
}

impl fmt::Display for IceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use IceError::*;
        match self {
            NotReady(state) => write!(f, "transport not ready (state {state})"),
            Closed => write!(f, "ICE engine closed"),
            InvalidCandidate(msg) => write!(f, "invalid candidate: {msg}"),
            MissingRemoteCredentials => write!(f, "remote ICE credentials missing"),
            Engine(msg) => write!(f, "ICE engine error: {msg}"),
        }
    }
}

impl std::error::Error for IceError {}
