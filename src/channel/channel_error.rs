use std::fmt;
use std::sync::{MutexGuard, PoisonError};

use crate::{fec::FecError, ice::IceError, rtcp::RtcpError, rtp::RtpError};

#[derive(Debug)]
pub enum ChannelError {
    Rtp(RtpError),
    Rtcp(RtcpError),
    Fec(FecError),
    Transport(IceError),
    /// The channel was stopped; nothing more is accepted.
    Stopped,
    Spawn(String),
    EmptyFrame,
    MutexPoisoned,
}

impl<'a, T> From<PoisonError<MutexGuard<'a, T>>> for ChannelError {
    fn from(_: PoisonError<MutexGuard<'a, T>>) -> Self {
        ChannelError::MutexPoisoned
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ChannelError::*;
        match self {
            Rtp(e) => write!(f, "RTP error: {e}"),
            Rtcp(e) => write!(f, "RTCP error: {e}"),
            Fec(e) => write!(f, "FEC error: {e}"),
            Transport(e) => write!(f, "transport error: {e}"),
            Stopped => write!(f, "channel stopped"),
            Spawn(e) => write!(f, "failed to spawn channel thread: {e}"),
            EmptyFrame => write!(f, "empty frame"),
            MutexPoisoned => write!(f, "Mutex poisoned"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<RtpError> for ChannelError {
    fn from(e: RtpError) -> Self {
        Self::Rtp(e)
    }
}
impl From<RtcpError> for ChannelError {
    fn from(e: RtcpError) -> Self {
        Self::Rtcp(e)
    }
}
impl From<FecError> for ChannelError {
    fn from(e: FecError) -> Self {
        Self::Fec(e)
    }
}
impl From<IceError> for ChannelError {
    fn from(e: IceError) -> Self {
        Self::Transport(e)
    }
}
