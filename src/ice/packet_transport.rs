use super::{conn_state::ConnState, ice_error::IceError};

/// Datagram send side of a connected ICE path, shared by the channels.
pub trait PacketTransport: Send + Sync {
    /// # Errors
    /// `IceError::NotReady` when the state is neither Connected nor Ready.
    fn send(&self, bytes: &[u8]) -> Result<(), IceError>;

    fn state(&self) -> ConnState;
}
