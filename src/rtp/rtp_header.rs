use byteorder::{BigEndian, ByteOrder};

use super::{
    config::{MAX_CSRC_COUNT, RTP_FIXED_HEADER_LEN, RTP_VERSION},
    rtp_error::RtpError,
    rtp_header_extension::RtpHeaderExtension,
};

/// Everything before the payload: fixed header, CSRCs, extension.
///
/// The version is implied (always 2) and the X bit follows
/// `header_extension`. Padding belongs to [`RtpPacket`](super::rtp_packet::RtpPacket)
/// because its count byte sits at the end of the datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrcs: Vec<u32>,
    pub header_extension: Option<RtpHeaderExtension>,
}

/// A decoded header plus the P bit, which only the packet can act on.
pub(super) struct DecodedHeader {
    pub header: RtpHeader,
    pub padded: bool,
    pub len: usize,
}

impl RtpHeader {
    pub fn new(payload_type: u8, sequence_number: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrcs: Vec::new(),
            header_extension: None,
        }
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_csrcs(mut self, csrcs: Vec<u32>) -> Self {
        self.csrcs = csrcs;
        self
    }

    pub fn with_extension(mut self, ext: Option<RtpHeaderExtension>) -> Self {
        self.header_extension = ext;
        self
    }

    pub fn encoded_len(&self) -> usize {
        let ext = self
            .header_extension
            .as_ref()
            .map_or(0, |e| 4 + e.data.len().div_ceil(4) * 4);
        RTP_FIXED_HEADER_LEN + self.csrcs.len() * 4 + ext
    }

    /// Writes the header with the P bit set to `padded`.
    pub(super) fn encode_into(&self, padded: bool, out: &mut Vec<u8>) -> Result<(), RtpError> {
        let cc = u8::try_from(self.csrcs.len())
            .ok()
            .filter(|&n| usize::from(n) <= MAX_CSRC_COUNT)
            .ok_or(RtpError::TooManyCsrcs(self.csrcs.len()))?;
        if self.payload_type > 0x7F {
            return Err(RtpError::PayloadTypeOutOfRange(self.payload_type));
        }

        let mut fixed = [0u8; RTP_FIXED_HEADER_LEN];
        fixed[0] = (RTP_VERSION << 6)
            | (u8::from(padded) << 5)
            | (u8::from(self.header_extension.is_some()) << 4)
            | cc;
        fixed[1] = (u8::from(self.marker) << 7) | self.payload_type;
        BigEndian::write_u16(&mut fixed[2..4], self.sequence_number);
        BigEndian::write_u32(&mut fixed[4..8], self.timestamp);
        BigEndian::write_u32(&mut fixed[8..12], self.ssrc);
        out.extend_from_slice(&fixed);

        for csrc in &self.csrcs {
            out.extend_from_slice(&csrc.to_be_bytes());
        }
        if let Some(ext) = &self.header_extension {
            ext.encode_into(out);
        }
        Ok(())
    }

    /// Reads the header at the start of `buf`, checking the version, the
    /// CSRC list and the extension against the buffer length.
    pub(super) fn decode(buf: &[u8]) -> Result<DecodedHeader, RtpError> {
        let Some(fixed) = buf.get(..RTP_FIXED_HEADER_LEN) else {
            return Err(RtpError::TooShort);
        };
        let version = fixed[0] >> 6;
        if version != RTP_VERSION {
            return Err(RtpError::BadVersion(version));
        }
        let padded = fixed[0] & 0x20 != 0;
        let has_ext = fixed[0] & 0x10 != 0;
        let cc = usize::from(fixed[0] & 0x0F);

        let mut len = RTP_FIXED_HEADER_LEN;
        let Some(csrc_bytes) = buf.get(len..len + cc * 4) else {
            return Err(RtpError::CsrcCountMismatch {
                expected: cc,
                buf_left: buf.len() - len,
            });
        };
        let csrcs = csrc_bytes.chunks_exact(4).map(BigEndian::read_u32).collect();
        len += cc * 4;

        let header_extension = if has_ext {
            let (ext, used) = RtpHeaderExtension::decode(&buf[len..])?;
            len += used;
            Some(ext)
        } else {
            None
        };

        Ok(DecodedHeader {
            header: RtpHeader {
                marker: fixed[1] & 0x80 != 0,
                payload_type: fixed[1] & 0x7F,
                sequence_number: BigEndian::read_u16(&fixed[2..4]),
                timestamp: BigEndian::read_u32(&fixed[4..8]),
                ssrc: BigEndian::read_u32(&fixed[8..12]),
                csrcs,
                header_extension,
            },
            padded,
            len,
        })
    }
}
