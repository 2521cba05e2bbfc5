use std::fmt;

use crate::ice::ConnState;

/// Connection state as the UI shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
    /// The remote side rejected the credentials sent with the request.
    IncorrectPassword,
    /// No peer is registered under the requested id.
    NoSuchId,
}

impl ConnectionStatus {
    /// Maps an ICE state; `None` for states the UI does not distinguish.
    pub fn from_conn_state(state: ConnState) -> Option<Self> {
        match state {
            ConnState::New => None,
            ConnState::Gathering | ConnState::Checking => Some(ConnectionStatus::Connecting),
            ConnState::Connected | ConnState::Ready => Some(ConnectionStatus::Connected),
            ConnState::Failed => Some(ConnectionStatus::Failed),
            ConnState::Disconnected => Some(ConnectionStatus::Disconnected),
            ConnState::Closed => Some(ConnectionStatus::Closed),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Failed => "failed",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::IncorrectPassword => "incorrect password",
            ConnectionStatus::NoSuchId => "no such id",
        };
        f.write_str(s)
    }
}
