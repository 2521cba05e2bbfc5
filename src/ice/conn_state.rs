use std::fmt;

/// Connectivity state reported by an ICE engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnState {
    #[default]
    New,
    Gathering,
    Checking,
    Connected,
    Ready,
    Failed,
    Disconnected,
    Closed,
}

impl ConnState {
    /// Media may flow only on a connected path.
    pub fn can_send(self) -> bool {
        matches!(self, ConnState::Connected | ConnState::Ready)
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
