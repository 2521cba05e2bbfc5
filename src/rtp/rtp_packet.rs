//! RTP packet model + encode/decode per RFC 3550.
//! No session logic lives here; decode validates every length field before
//! slicing, so hostile input yields `RtpError` rather than a panic.

use super::{
    config::FRAME_BLOCK_OFFSET_EXTENSION_ID,
    rtp_error::RtpError,
    rtp_header::{DecodedHeader, RtpHeader},
    rtp_header_extension::{ExtensionElement, RtpHeaderExtension},
};

/// Complete RTP packet (header + payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    /// Payload without any trailing padding bytes.
    pub payload: Vec<u8>,
    /// Count of padding bytes (including the count byte itself); 0 means the
    /// P bit is clear.
    pub padding_bytes: u8,
}

impl RtpPacket {
    pub fn new(header: RtpHeader, payload: Vec<u8>) -> Self {
        Self {
            header,
            payload,
            padding_bytes: 0,
        }
    }

    /// Convenience constructor.
    pub fn simple(
        payload_type: u8,
        marker: bool,
        seq: u16,
        ts: u32,
        ssrc: u32,
        payload: Vec<u8>,
    ) -> Self {
        let header = RtpHeader::new(payload_type, seq, ts, ssrc).with_marker(marker);
        Self::new(header, payload)
    }

    /// Padding-only packet, used for bandwidth probes.
    pub fn padding_only(payload_type: u8, seq: u16, ts: u32, ssrc: u32, padding: u8) -> Self {
        Self {
            header: RtpHeader::new(payload_type, seq, ts, ssrc),
            payload: Vec::new(),
            padding_bytes: padding,
        }
    }

    pub fn with_padding(mut self, padding: u8) -> Self {
        self.padding_bytes = padding;
        self
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }
    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }
    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }
    pub fn marker(&self) -> bool {
        self.header.marker
    }
    pub fn payload_type(&self) -> u8 {
        self.header.payload_type
    }

    /// Body of one-byte extension element `id`, if the packet carries one.
    pub fn extension_element(&self, id: u8) -> Option<Vec<u8>> {
        self.header.header_extension.as_ref()?.element(id)
    }

    /// Frame block offset carried in the one-byte extension, if any.
    pub fn block_offset(&self) -> Option<u32> {
        let raw = self.extension_element(FRAME_BLOCK_OFFSET_EXTENSION_ID)?;
        let bytes: [u8; 4] = raw.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Attaches the frame block offset extension.
    pub fn with_block_offset(mut self, offset: u32) -> Self {
        let ext = RtpHeaderExtension::one_byte(&[ExtensionElement::new(
            FRAME_BLOCK_OFFSET_EXTENSION_ID,
            offset.to_be_bytes().to_vec(),
        )])
        .ok();
        self.header = self.header.with_extension(ext);
        self
    }

    /// Bytes on the wire once encoded.
    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len() + self.payload.len() + usize::from(self.padding_bytes)
    }

    /// Serializes the packet.
    ///
    /// # Errors
    /// More than 15 CSRCs or a payload type above 127.
    pub fn encode(&self) -> Result<Vec<u8>, RtpError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RtpError> {
        self.header.encode_into(self.padding_bytes > 0, out)?;
        out.extend_from_slice(&self.payload);
        if self.padding_bytes > 0 {
            out.extend(std::iter::repeat_n(0u8, usize::from(self.padding_bytes) - 1));
            out.push(self.padding_bytes);
        }
        Ok(())
    }

    /// Parses a packet, validating version, CSRC count, extension length and
    /// padding against the buffer.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpError> {
        let DecodedHeader { header, padded, len } = RtpHeader::decode(buf)?;

        let mut end = buf.len();
        let mut padding_bytes = 0u8;
        if padded {
            let count = buf[end - 1];
            if count == 0 {
                return Err(RtpError::InvalidPadding);
            }
            let payload_len = end - len;
            if usize::from(count) > payload_len {
                return Err(RtpError::PaddingTooShort {
                    padding: usize::from(count),
                    payload_len,
                });
            }
            end -= usize::from(count);
            padding_bytes = count;
        }

        Ok(Self {
            header,
            payload: buf[len..end].to_vec(),
            padding_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn full_packet() -> RtpPacket {
        let ext =
            RtpHeaderExtension::one_byte(&[ExtensionElement::new(2, vec![0, 0, 4, 0])]).unwrap();
        let header = RtpHeader::new(96, 65_535, 90_000, 0xDEAD_BEEF)
            .with_marker(true)
            .with_csrcs(vec![1, 2, 3])
            .with_extension(Some(ext));
        RtpPacket::new(header, vec![0x65, 1, 2, 3, 4]).with_padding(3)
    }

    #[test]
    fn encode_decode_keeps_every_field() {
        let pkt = full_packet();
        let bytes = pkt.encode().unwrap();
        assert_eq!(bytes.len(), pkt.encoded_len());
        assert_eq!(RtpPacket::decode(&bytes).unwrap(), pkt);
    }

    #[test]
    fn short_buffer_is_malformed() {
        let err = RtpPacket::decode(&[0x80, 96, 0, 1]).unwrap_err();
        assert_eq!(err, RtpError::TooShort);
        assert!(err.is_malformed());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut bytes = full_packet().encode().unwrap();
        bytes[0] = (bytes[0] & 0x3F) | (1 << 6);
        assert_eq!(RtpPacket::decode(&bytes), Err(RtpError::BadVersion(1)));
    }

    #[test]
    fn csrc_count_beyond_buffer_is_rejected() {
        let mut bytes = RtpPacket::simple(96, false, 1, 2, 3, vec![]).encode().unwrap();
        bytes[0] |= 0x02;
        assert!(matches!(
            RtpPacket::decode(&bytes),
            Err(RtpError::CsrcCountMismatch { expected: 2, .. })
        ));
    }

    #[test]
    fn extension_length_beyond_buffer_is_rejected() {
        let mut bytes = RtpPacket::simple(96, false, 1, 2, 3, vec![]).encode().unwrap();
        bytes[0] |= 0x10;
        bytes.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x05, 0x10, 0xAA]);
        assert!(matches!(
            RtpPacket::decode(&bytes),
            Err(RtpError::HeaderExtensionTooShort { .. })
        ));
    }

    #[test]
    fn padding_count_checks() {
        let mut bytes = RtpPacket::simple(96, false, 1, 2, 3, vec![9, 9]).encode().unwrap();
        bytes[0] |= 0x20;
        let last = bytes.len() - 1;
        bytes[last] = 0;
        assert_eq!(RtpPacket::decode(&bytes), Err(RtpError::InvalidPadding));
        bytes[last] = 3;
        assert!(matches!(
            RtpPacket::decode(&bytes),
            Err(RtpError::PaddingTooShort { padding: 3, payload_len: 2 })
        ));
    }

    #[test]
    fn probe_packet_is_padding_only() {
        let pkt = RtpPacket::padding_only(125, 7, 0, 42, 200);
        let bytes = pkt.encode().unwrap();
        assert_eq!(bytes.len(), 12 + 200);
        let back = RtpPacket::decode(&bytes).unwrap();
        assert!(back.payload.is_empty());
        assert_eq!(back.padding_bytes, 200);
    }

    #[test]
    fn block_offset_extension_round_trips() {
        let pkt = RtpPacket::simple(96, false, 1, 2, 3, vec![1, 2]).with_block_offset(70_000);
        assert_eq!(pkt.encoded_len(), 12 + 12 + 2);
        let back = RtpPacket::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(back.block_offset(), Some(70_000));
        assert_eq!(RtpPacket::simple(96, false, 1, 2, 3, vec![]).block_offset(), None);
    }

    #[test]
    fn too_many_csrcs_is_an_encode_error() {
        let header = RtpHeader::new(96, 1, 2, 3).with_csrcs(vec![0; 16]);
        assert_eq!(
            RtpPacket::new(header, vec![]).encode(),
            Err(RtpError::TooManyCsrcs(16))
        );
    }
}
