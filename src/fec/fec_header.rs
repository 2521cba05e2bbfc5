use byteorder::{BigEndian, ByteOrder};

use super::fec_error::FecError;

pub const FEC_HEADER_LEN: usize = 12;

/// Header prefixed to every repair symbol on the FEC stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecHeader {
    pub symbol_id: u16,
    pub source_count: u16,
    pub total_count: u16,
    /// Length of the source block in bytes.
    pub block_len: u32,
    /// Sequence number of the first media packet in the block.
    pub base_seq: u16,
}

impl FecHeader {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.symbol_id.to_be_bytes());
        out.extend_from_slice(&self.source_count.to_be_bytes());
        out.extend_from_slice(&self.total_count.to_be_bytes());
        out.extend_from_slice(&self.block_len.to_be_bytes());
        out.extend_from_slice(&self.base_seq.to_be_bytes());
    }

    /// Splits a repair packet payload into header and symbol bytes.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), FecError> {
        if buf.len() < FEC_HEADER_LEN {
            return Err(FecError::MalformedHeader);
        }
        let hdr = Self {
            symbol_id: BigEndian::read_u16(&buf[0..2]),
            source_count: BigEndian::read_u16(&buf[2..4]),
            total_count: BigEndian::read_u16(&buf[4..6]),
            block_len: BigEndian::read_u32(&buf[6..10]),
            base_seq: BigEndian::read_u16(&buf[10..12]),
        };
        if hdr.source_count == 0
            || hdr.total_count < hdr.source_count
            || hdr.symbol_id >= hdr.total_count
        {
            return Err(FecError::MalformedHeader);
        }
        Ok((hdr, &buf[FEC_HEADER_LEN..]))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn inconsistent_counts_are_rejected() {
        let mut out = Vec::new();
        FecHeader {
            symbol_id: 9,
            source_count: 6,
            total_count: 9,
            block_len: 100,
            base_seq: 1,
        }
        .encode_into(&mut out);
        assert_eq!(FecHeader::decode(&out), Err(FecError::MalformedHeader));
        out[1] = 8;
        let (hdr, rest) = FecHeader::decode(&out).unwrap();
        assert_eq!(hdr.symbol_id, 8);
        assert!(rest.is_empty());
    }
}
