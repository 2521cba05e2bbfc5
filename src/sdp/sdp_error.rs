use std::fmt;
use std::num::ParseIntError;

use super::rtp_map::RtpMapParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    Missing(&'static str),
    Invalid(&'static str),
    ParseInt(ParseIntError),
    /// No `m=` section for this media token.
    NoMediaSection(String),
    /// The placeholder token is absent from the section.
    NoPlaceholder { media: String, placeholder: String },
    RtpMap(RtpMapParseError),
}

impl From<ParseIntError> for SdpError {
    fn from(e: ParseIntError) -> Self {
        Self::ParseInt(e)
    }
}

impl From<RtpMapParseError> for SdpError {
    fn from(e: RtpMapParseError) -> Self {
        Self::RtpMap(e)
    }
}

impl fmt::Display for SdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpError::Missing(msg) => write!(f, "Missing field: {msg}"),
            SdpError::Invalid(msg) => write!(f, "Invalid field: {msg}"),
            SdpError::ParseInt(e) => write!(f, "Parse int error: {e}"),
            SdpError::NoMediaSection(m) => write!(f, "No m={m} section"),
            SdpError::NoPlaceholder { media, placeholder } => {
                write!(f, "No '{placeholder}' token in m={media} section")
            }
            SdpError::RtpMap(e) => write!(f, "Invalid rtpmap: {e}"),
        }
    }
}

impl std::error::Error for SdpError {}
