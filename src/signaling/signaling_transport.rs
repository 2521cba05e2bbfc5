use std::time::Duration;

use super::{signal_envelope::SignalEnvelope, signaling_error::SignalingError};

/// A reliable, ordered message channel to the remote peer (a WebSocket in
/// production). `send` must not block for long: it is called from the ICE
/// callback path when trickling candidates.
pub trait SignalingTransport: Send + Sync {
    /// # Errors
    /// `Closed` when the channel is gone.
    fn send(&self, envelope: &SignalEnvelope) -> Result<(), SignalingError>;

    /// Waits up to `timeout` for the next envelope; `Ok(None)` on timeout.
    ///
    /// # Errors
    /// `Closed`, or `Json` for an undecodable message.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<SignalEnvelope>, SignalingError>;
}
