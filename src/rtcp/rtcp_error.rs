use std::fmt;

/// RTCP encode/decode failures. Decode variants all mean malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpError {
    TooShort,
    BadVersion(u8),
    InvalidPadding,
    LengthMismatch,
    UnknownPacketType(u8),
    UnsupportedFormat { pt: u8, fmt: u8 },
    Truncated,
    TooManyReportBlocks(usize),
    NonContiguousFeedback { ssrc: u32, expected: u16, got: u16 },
    TooManyFeedbackReports(usize),
}

impl RtcpError {
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(
            self,
            RtcpError::TooManyReportBlocks(_)
                | RtcpError::NonContiguousFeedback { .. }
                | RtcpError::TooManyFeedbackReports(_)
        )
    }
}

impl fmt::Display for RtcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RtcpError::*;
        match self {
            TooShort => write!(f, "malformed packet: buffer too short"),
            BadVersion(v) => write!(f, "malformed packet: bad RTCP version {v}"),
            InvalidPadding => write!(f, "malformed packet: invalid RTCP padding count"),
            LengthMismatch => write!(f, "malformed packet: body does not match header length"),
            UnknownPacketType(pt) => write!(f, "malformed packet: unknown RTCP packet type {pt}"),
            UnsupportedFormat { pt, fmt } => {
                write!(f, "malformed packet: unsupported FMT {fmt} for PT {pt}")
            }
            Truncated => write!(f, "malformed packet: truncated RTCP structure"),
            TooManyReportBlocks(n) => write!(f, "{n} report blocks exceed the limit of 31"),
            NonContiguousFeedback { ssrc, expected, got } => write!(
                f,
                "feedback for ssrc={ssrc} must be gap-free: expected seq {expected}, got {got}"
            ),
            TooManyFeedbackReports(n) => {
                write!(f, "{n} feedback reports do not fit one block")
            }
        }
    }
}

impl std::error::Error for RtcpError {}
