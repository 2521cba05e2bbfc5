use super::{candidate::Candidate, conn_state::ConnState};

/// Callbacks invoked on the engine's own thread.
///
/// Implementations must return quickly and never block: forward the event
/// into a queue or flip a flag.
pub trait IceEventHandler: Send + Sync {
    fn on_state_changed(&self, state: ConnState);
    fn on_new_candidate(&self, candidate: Candidate);
    fn on_gathering_done(&self);
    fn on_new_selected_pair(&self, local: &Candidate, remote: &Candidate);
    fn on_receive(&self, bytes: &[u8]);
}
