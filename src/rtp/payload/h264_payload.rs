//! RFC 6184 payload classification for the receive path.

use super::h264_packetizer::{NAL_TYPE_FU_A, NAL_TYPE_STAP_A};
use crate::rtp::rtp_error::RtpError;

/// One H.264 RTP payload, classified once on receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum H264Payload {
    /// Single NAL unit packet; the payload is the NAL unit itself.
    Single(Vec<u8>),
    /// STAP-A: several complete NAL units in one packet.
    StapA(Vec<Vec<u8>>),
    /// One FU-A fragment.
    FuA {
        indicator: u8,
        header: u8,
        data: Vec<u8>,
    },
}

impl H264Payload {
    /// # Errors
    /// `InvalidPayload` for empty payloads, truncated FU-A/STAP-A, or
    /// reserved NAL types.
    pub fn parse(payload: &[u8]) -> Result<Self, RtpError> {
        let Some(&first) = payload.first() else {
            return Err(RtpError::InvalidPayload("empty H.264 payload"));
        };
        match first & 0x1F {
            1..=23 => Ok(H264Payload::Single(payload.to_vec())),
            NAL_TYPE_STAP_A => parse_stap_a(&payload[1..]).map(H264Payload::StapA),
            NAL_TYPE_FU_A => {
                if payload.len() < 3 {
                    return Err(RtpError::InvalidPayload("FU-A shorter than 3 bytes"));
                }
                Ok(H264Payload::FuA {
                    indicator: first,
                    header: payload[1],
                    data: payload[2..].to_vec(),
                })
            }
            _ => Err(RtpError::InvalidPayload("unsupported H.264 NAL type")),
        }
    }

    /// True for the first fragment of a NAL unit or any self-contained packet.
    pub fn is_start(&self) -> bool {
        match self {
            H264Payload::FuA { header, .. } => header & 0x80 != 0,
            _ => true,
        }
    }

    /// True for the last fragment of a NAL unit or any self-contained packet.
    pub fn is_end(&self) -> bool {
        match self {
            H264Payload::FuA { header, .. } => header & 0x40 != 0,
            _ => true,
        }
    }

    /// Original NAL header rebuilt from FU indicator (F|NRI) and FU header
    /// (type).
    pub fn nal_header(&self) -> Option<u8> {
        match self {
            H264Payload::FuA {
                indicator, header, ..
            } => Some((indicator & 0xE0) | (header & 0x1F)),
            H264Payload::Single(nal) => nal.first().copied(),
            H264Payload::StapA(_) => None,
        }
    }
}

fn parse_stap_a(mut buf: &[u8]) -> Result<Vec<Vec<u8>>, RtpError> {
    let mut nalus = Vec::new();
    while !buf.is_empty() {
        if buf.len() < 2 {
            return Err(RtpError::InvalidPayload("STAP-A size truncated"));
        }
        let size = usize::from(u16::from_be_bytes([buf[0], buf[1]]));
        if size == 0 || buf.len() - 2 < size {
            return Err(RtpError::InvalidPayload("STAP-A NAL overruns packet"));
        }
        nalus.push(buf[2..2 + size].to_vec());
        buf = &buf[2 + size..];
    }
    Ok(nalus)
}

/// Concatenates an in-order FU-A run (start..=end) into one NAL unit.
///
/// # Errors
/// `InvalidPayload` if the run does not begin with a start fragment or
/// contains a non-FU-A payload.
pub fn join_fu_a<'a, I>(fragments: I) -> Result<Vec<u8>, RtpError>
where
    I: IntoIterator<Item = &'a H264Payload>,
{
    let mut iter = fragments.into_iter();
    let first = iter
        .next()
        .ok_or(RtpError::InvalidPayload("empty FU-A run"))?;
    let (H264Payload::FuA { data, .. }, Some(hdr), true) =
        (first, first.nal_header(), first.is_start())
    else {
        return Err(RtpError::InvalidPayload("FU-A run without start fragment"));
    };
    let mut nal = Vec::with_capacity(1 + data.len());
    nal.push(hdr);
    nal.extend_from_slice(data);
    for frag in iter {
        match frag {
            H264Payload::FuA { data, .. } => nal.extend_from_slice(data),
            _ => return Err(RtpError::InvalidPayload("non FU-A packet inside FU-A run")),
        }
    }
    Ok(nal)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::rtp::payload::h264_packetizer::{H264Packetizer, build_annexb};

    #[test]
    fn fu_a_run_rebuilds_original_nal() {
        let mut nal = vec![0x65];
        nal.extend(0..40u8);
        let chunks = H264Packetizer::new(28).packetize(&build_annexb(&[&nal]));
        let parsed: Vec<H264Payload> = chunks
            .iter()
            .map(|c| H264Payload::parse(&c.bytes).unwrap())
            .collect();
        assert!(parsed[0].is_start());
        assert!(parsed.last().unwrap().is_end());
        assert_eq!(join_fu_a(&parsed).unwrap(), nal);
    }

    #[test]
    fn stap_a_is_split() {
        let p = H264Payload::parse(&[24, 0, 2, 0x67, 1, 0, 1, 0x68]).unwrap();
        assert_eq!(p, H264Payload::StapA(vec![vec![0x67, 1], vec![0x68]]));
        assert!(H264Payload::parse(&[24, 0, 9, 0x67]).is_err());
    }

    #[test]
    fn empty_and_reserved_are_errors() {
        assert!(H264Payload::parse(&[]).is_err());
        assert!(H264Payload::parse(&[30, 1]).is_err());
        assert!(H264Payload::parse(&[28, 0x85]).is_err());
    }
}
