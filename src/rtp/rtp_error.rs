use std::fmt;

/// Errors from encoding or decoding RTP packets.
///
/// Every decode variant means the input was a malformed packet; decode never
/// returns a partially populated packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtpError {
    TooShort,
    BadVersion(u8),
    CsrcCountMismatch { expected: usize, buf_left: usize },
    HeaderExtensionTooShort { declared: usize, buf_left: usize },
    InvalidPadding,
    PaddingTooShort { padding: usize, payload_len: usize },
    InvalidExtensionElement { id: u8, len: usize },
    TooManyCsrcs(usize),
    PayloadTypeOutOfRange(u8),
    PayloadTooLarge { size: usize, max: usize },
    InvalidPayload(&'static str),
}

impl RtpError {
    /// True for every error raised by decoding attacker-controlled input.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(
            self,
            RtpError::TooManyCsrcs(_)
                | RtpError::PayloadTypeOutOfRange(_)
                | RtpError::PayloadTooLarge { .. }
        )
    }
}

impl fmt::Display for RtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RtpError::*;
        match self {
            TooShort => write!(f, "malformed packet: buffer too short"),
            BadVersion(v) => write!(f, "malformed packet: bad RTP version {v}"),
            CsrcCountMismatch { expected, buf_left } => write!(
                f,
                "malformed packet: {expected} CSRCs need {} bytes, only {buf_left} remain",
                expected * 4
            ),
            HeaderExtensionTooShort { declared, buf_left } => write!(
                f,
                "malformed packet: extension declares {declared} bytes, only {buf_left} remain"
            ),
            InvalidPadding => write!(f, "malformed packet: padding flag set with zero count"),
            PaddingTooShort {
                padding,
                payload_len,
            } => write!(
                f,
                "malformed packet: padding count {padding} exceeds payload length {payload_len}"
            ),
            InvalidExtensionElement { id, len } => write!(
                f,
                "malformed packet: extension element id={id} len={len} overruns extension"
            ),
            TooManyCsrcs(n) => write!(f, "{n} CSRCs exceed the limit of 15"),
            PayloadTypeOutOfRange(pt) => write!(f, "payload type {pt} does not fit in 7 bits"),
            PayloadTooLarge { size, max } => {
                write!(f, "payload of {size} bytes exceeds the {max}-byte limit")
            }
            InvalidPayload(what) => write!(f, "malformed payload: {what}"),
        }
    }
}

impl std::error::Error for RtpError {}
