//! Paired in-process signaling channel carrying the JSON text form.

use std::{
    sync::{
        Mutex,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    time::Duration,
};

use super::{
    signal_envelope::SignalEnvelope, signaling_error::SignalingError,
    signaling_transport::SignalingTransport,
};

pub struct InMemorySignaling {
    tx: Sender<String>,
    rx: Mutex<Receiver<String>>,
}

impl InMemorySignaling {
    /// Two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            Self {
                tx: a_tx,
                rx: Mutex::new(a_rx),
            },
            Self {
                tx: b_tx,
                rx: Mutex::new(b_rx),
            },
        )
    }
}

impl SignalingTransport for InMemorySignaling {
    fn send(&self, envelope: &SignalEnvelope) -> Result<(), SignalingError> {
        self.tx
            .send(envelope.to_json()?)
            .map_err(|_| SignalingError::Closed)
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<SignalEnvelope>, SignalingError> {
        let rx = self.rx.lock()?;
        match rx.recv_timeout(timeout) {
            Ok(text) => Ok(Some(SignalEnvelope::from_json(&text)?)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SignalingError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::signaling::signal_envelope::SignalType;

    #[test]
    fn messages_cross_in_order() {
        let (a, b) = InMemorySignaling::pair();
        let offer = SignalEnvelope::new(SignalType::Offer, "t", "a", "b", "v=0".into());
        let cand = SignalEnvelope::new(SignalType::NewCandidate, "t", "a", "b", "a=candidate:x".into());
        a.send(&offer).unwrap();
        a.send(&cand).unwrap();
        assert_eq!(b.recv_timeout(Duration::from_millis(10)).unwrap(), Some(offer));
        assert_eq!(b.recv_timeout(Duration::from_millis(10)).unwrap(), Some(cand));
        assert_eq!(b.recv_timeout(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn dropped_peer_closes_the_channel() {
        let (a, b) = InMemorySignaling::pair();
        drop(b);
        let env = SignalEnvelope::new(SignalType::Answer, "t", "a", "b", String::new());
        assert!(matches!(a.send(&env), Err(SignalingError::Closed)));
        assert!(matches!(
            a.recv_timeout(Duration::from_millis(1)),
            Err(SignalingError::Closed)
        ));
    }
}
