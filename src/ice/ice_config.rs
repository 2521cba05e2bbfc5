use rand::{Rng, rngs::OsRng};

/// Role for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceRole {
    /// Makes the final decision on which candidate pair is used.
    Controlling,
    /// Accepts the nominated pair.
    Controlled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnConfig {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// Creation parameters for an ICE engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceConfig {
    pub role: IceRole,
    /// Emit candidates as they are found instead of after gathering.
    pub trickle: bool,
    /// Reliable (ordered, retransmitted) delivery requested from the engine.
    pub reliable: bool,
    pub stun_server: Option<String>,
    pub turn: Option<TurnConfig>,
}

impl IceConfig {
    pub fn new(role: IceRole) -> Self {
        Self {
            role,
            trickle: true,
            reliable: false,
            stun_server: None,
            turn: None,
        }
    }
}

/// Username fragment and password exchanged in SDP (`a=ice-ufrag`, `a=ice-pwd`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCredentials {
    pub ufrag: String,
    pub pwd: String,
}

impl IceCredentials {
    /// ICE: ufrag >= 4 chars; pwd >= 22 chars
    pub fn generate() -> Self {
        Self {
            ufrag: gen_token(8),
            pwd: gen_token(24),
        }
    }
}

fn gen_token(len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    (0..len)
        .map(|_| ALPHABET[OsRng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
