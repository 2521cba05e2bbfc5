use super::{config::RTCP_VERSION, rtcp_error::RtcpError};

/// 4-byte header shared by every RTCP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonHeader {
    version: u8,       // 2
    padding: bool,     // P
    rc_or_fmt: u8,     // 5 bits (report count or FMT)
    pt: u8,            // packet type
    length_words: u16, // number of 32-bit words minus one
}

impl CommonHeader {
    pub fn new(rc_or_fmt: u8, pt: u8, padding: bool) -> Self {
        Self {
            version: RTCP_VERSION,
            padding,
            rc_or_fmt,
            pt,
            length_words: 0,
        }
    }

    /// Decodes the header at the start of `buf`.
    ///
    /// Returns the header, the packet body (padding removed) and the total
    /// bytes the packet occupies in `buf`.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8], usize), RtcpError> {
        if buf.len() < 4 {
            return Err(RtcpError::TooShort);
        }
        let vprc = buf[0];
        let version = vprc >> 6;
        if version != RTCP_VERSION {
            return Err(RtcpError::BadVersion(version));
        }
        let padding = ((vprc >> 5) & 1) != 0;
        let rc_or_fmt = vprc & 0x1F;
        let pt = buf[1];
        let length_words = u16::from_be_bytes([buf[2], buf[3]]);

        let total_bytes = (usize::from(length_words) + 1) * 4;
        if buf.len() < total_bytes {
            return Err(RtcpError::TooShort);
        }
        let mut body_end = total_bytes;
        if padding {
            let pad = usize::from(buf[total_bytes - 1]);
            if pad == 0 || pad > total_bytes - 4 {
                return Err(RtcpError::InvalidPadding);
            }
            body_end -= pad;
        }

        Ok((
            Self {
                version,
                padding,
                rc_or_fmt,
                pt,
                length_words,
            },
            &buf[4..body_end],
            total_bytes,
        ))
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let vprc =
            ((self.version & 0b11) << 6) | (u8::from(self.padding) << 5) | (self.rc_or_fmt & 0x1F);
        out.push(vprc);
        out.push(self.pt);
        out.extend_from_slice(&self.length_words.to_be_bytes());
    }

    /// Pads the packet that starts at `start` to 32 bits and writes its
    /// length field.
    pub fn finish(out: &mut Vec<u8>, start: usize) {
        let pad = (4 - (out.len() - start) % 4) % 4;
        out.extend(std::iter::repeat_n(0u8, pad));
        let len_words = ((out.len() - start) / 4 - 1) as u16;
        out[start + 2..start + 4].copy_from_slice(&len_words.to_be_bytes());
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn padding(&self) -> bool {
        self.padding
    }

    pub fn rc_or_fmt(&self) -> u8 {
        self.rc_or_fmt
    }

    pub fn pt(&self) -> u8 {
        self.pt
    }

    pub fn length_words(&self) -> u16 {
        self.length_words
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn version_checked_before_length() {
        // version 1 and a length that would overrun
        assert_eq!(
            CommonHeader::decode(&[0x40, 201, 0xFF, 0xFF]),
            Err(RtcpError::BadVersion(1))
        );
    }

    #[test]
    fn declared_length_must_fit() {
        assert_eq!(
            CommonHeader::decode(&[0x80, 201, 0, 1, 0, 0]),
            Err(RtcpError::TooShort)
        );
    }

    #[test]
    fn padding_is_stripped_and_validated() {
        let buf = [0xA0, 201, 0, 2, 1, 2, 3, 4, 0, 0, 0, 4];
        let (hdr, body, total) = CommonHeader::decode(&buf).unwrap();
        assert!(hdr.padding());
        assert_eq!(body, &[1, 2, 3, 4]);
        assert_eq!(total, 12);

        let zero_pad = [0xA0, 201, 0, 1, 1, 2, 3, 0];
        assert_eq!(
            CommonHeader::decode(&zero_pad),
            Err(RtcpError::InvalidPadding)
        );
        let over_pad = [0xA0, 201, 0, 1, 1, 2, 3, 9];
        assert_eq!(
            CommonHeader::decode(&over_pad),
            Err(RtcpError::InvalidPadding)
        );
    }
}
