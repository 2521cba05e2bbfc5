use std::fmt;
use std::str::FromStr;

use crate::rtp::payload::PayloadCodec;

/// Value of an `a=rtpmap:` attribute: `<pt> <encoding>/<clock>[/<params>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub payload_type: u8,
    /// As written; compared case-insensitively.
    pub encoding_name: String,
    pub clock_rate: u32,
    /// Usually the channel count for audio.
    pub encoding_params: Option<u16>,
}

impl RtpMap {
    pub fn new(payload_type: u8, encoding_name: &str, clock_rate: u32) -> Self {
        Self {
            payload_type,
            encoding_name: encoding_name.to_string(),
            clock_rate,
            encoding_params: None,
        }
    }

    pub fn with_params(mut self, params: u16) -> Self {
        self.encoding_params = Some(params);
        self
    }

    pub fn codec(&self) -> PayloadCodec {
        PayloadCodec::from_encoding_name(&self.encoding_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtpMapParseError {
    MissingParts,
    InvalidPayloadType,
    InvalidClockRate,
    InvalidParams,
    PayloadTypeOutOfRange,
    TrailingGarbage,
}

impl fmt::Display for RtpMapParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RtpMapParseError::*;
        match self {
            MissingParts => write!(f, "Missing required parts in rtpmap"),
            InvalidPayloadType => write!(f, "Invalid payload type"),
            InvalidClockRate => write!(f, "Invalid clock rate"),
            InvalidParams => write!(f, "Invalid encoding parameters"),
            PayloadTypeOutOfRange => write!(f, "Payload type out of [0,127]"),
            TrailingGarbage => write!(f, "Unexpected trailing tokens after rtpmap"),
        }
    }
}

impl std::error::Error for RtpMapParseError {}

impl fmt::Display for RtpMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.payload_type, self.encoding_name, self.clock_rate)?;
        if let Some(p) = self.encoding_params {
            write!(f, "/{p}")?;
        }
        Ok(())
    }
}

impl FromStr for RtpMap {
    type Err = RtpMapParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use RtpMapParseError::*;

        let mut it = s.split_whitespace();
        let pt_str = it.next().ok_or(MissingParts)?;
        let rhs = it.next().ok_or(MissingParts)?;
        if it.next().is_some() {
            return Err(TrailingGarbage);
        }

        let payload_type: u8 = pt_str.parse().map_err(|_| InvalidPayloadType)?;
        if payload_type > 127 {
            return Err(PayloadTypeOutOfRange);
        }

        let mut parts = rhs.splitn(3, '/');
        let encoding_name = parts.next().ok_or(MissingParts)?.trim().to_string();
        if encoding_name.is_empty() {
            return Err(MissingParts);
        }
        let clock_rate: u32 = parts
            .next()
            .ok_or(MissingParts)?
            .trim()
            .parse()
            .map_err(|_| InvalidClockRate)?;

        // "0" channels is treated as absent
        let encoding_params = match parts.next().map(str::trim) {
            None | Some("") => None,
            Some(p) => {
                let v: u16 = p.parse().map_err(|_| InvalidParams)?;
                (v != 0).then_some(v)
            }
        };

        Ok(RtpMap {
            payload_type,
            encoding_name,
            clock_rate,
            encoding_params,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn parses_opus_with_channels() {
        let rm: RtpMap = "111 opus/48000/2".parse().unwrap();
        assert_eq!(rm, RtpMap::new(111, "opus", 48_000).with_params(2));
        assert_eq!(rm.to_string(), "111 opus/48000/2");
        assert_eq!(rm.codec(), PayloadCodec::Generic);
    }

    #[test]
    fn video_codecs_map_to_framing() {
        let h264: RtpMap = "96 H264/90000".parse().unwrap();
        assert_eq!(h264.codec(), PayloadCodec::H264);
        assert_eq!(h264.encoding_params, None);
        let av1: RtpMap = "  98\tAV1/90000  ".parse().unwrap();
        assert_eq!(av1.codec(), PayloadCodec::Av1);
    }

    #[test]
    fn invalid_inputs() {
        assert_eq!("".parse::<RtpMap>(), Err(RtpMapParseError::MissingParts));
        assert_eq!("96".parse::<RtpMap>(), Err(RtpMapParseError::MissingParts));
        assert_eq!(
            "x9 opus/48000/2".parse::<RtpMap>(),
            Err(RtpMapParseError::InvalidPayloadType)
        );
        assert_eq!(
            "96 opus/xx".parse::<RtpMap>(),
            Err(RtpMapParseError::InvalidClockRate)
        );
        assert_eq!(
            "200 opus/48000".parse::<RtpMap>(),
            Err(RtpMapParseError::PayloadTypeOutOfRange)
        );
        assert_eq!(
            "96 opus/48000/2 extra".parse::<RtpMap>(),
            Err(RtpMapParseError::TrailingGarbage)
        );
    }

    #[test]
    fn zero_channels_becomes_none() {
        let rm: RtpMap = "98 opus/48000/0".parse().unwrap();
        assert_eq!(rm.encoding_params, None);
    }
}
