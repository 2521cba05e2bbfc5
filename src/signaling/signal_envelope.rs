use serde::{Deserialize, Serialize};

use super::signaling_error::SignalingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Offer,
    Answer,
    NewCandidate,
}

/// JSON message exchanged over the signaling channel.
///
/// For `new_candidate`, `sdp` holds one `a=candidate:` line, or
/// `a=end-of-candidates` once the sender has finished gathering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub transmission_id: String,
    pub user_id: String,
    pub remote_user_id: String,
    pub sdp: String,
}

impl SignalEnvelope {
    pub fn new(
        kind: SignalType,
        transmission_id: &str,
        user_id: &str,
        remote_user_id: &str,
        sdp: String,
    ) -> Self {
        Self {
            kind,
            transmission_id: transmission_id.to_string(),
            user_id: user_id.to_string(),
            remote_user_id: remote_user_id.to_string(),
            sdp,
        }
    }

    /// # Errors
    /// Serialization failure.
    pub fn to_json(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    /// `Json` for malformed text or an unknown `type`.
    pub fn from_json(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn wire_names_match_the_protocol() {
        let env = SignalEnvelope::new(SignalType::NewCandidate, "t1", "alice", "bob", "a=end-of-candidates".into());
        let json = env.to_json().unwrap();
        assert!(json.contains(r#""type":"new_candidate""#));
        assert!(json.contains(r#""remote_user_id":"bob""#));
        assert_eq!(SignalEnvelope::from_json(&json).unwrap(), env);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"type":"bye","transmission_id":"t","user_id":"a","remote_user_id":"b","sdp":""}"#;
        assert!(matches!(SignalEnvelope::from_json(json), Err(SignalingError::Json(_))));
    }
}
