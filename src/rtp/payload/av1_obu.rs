//! AV1 OBU helpers: LEB128 and conversion between the low-overhead bitstream
//! (OBUs carrying `obu_size`) and RTP elements (OBUs without it).

use bytes::{BufMut, BytesMut};

use crate::rtp::rtp_error::RtpError;

pub const OBU_TYPE_MASK: u8 = 0b0111_1000;
pub const OBU_EXTENSION_BIT: u8 = 0b0000_0100;
pub const OBU_HAS_SIZE_BIT: u8 = 0b0000_0010;

pub const OBU_TYPE_SEQUENCE_HEADER: u8 = 1;
pub const OBU_TYPE_TEMPORAL_DELIMITER: u8 = 2;
pub const OBU_TYPE_TILE_LIST: u8 = 8;

const MAX_LEB128_BYTES: usize = 8;

#[inline]
pub fn obu_type(header: u8) -> u8 {
    (header & OBU_TYPE_MASK) >> 3
}

/// Reads an unsigned LEB128 value, returning it with the number of bytes used.
pub fn read_leb128(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, b) in buf.iter().take(MAX_LEB128_BYTES).enumerate() {
        value |= u64::from(b & 0x7F) << (7 * i);
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

pub fn write_leb128<B: BufMut>(out: &mut B, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.put_u8(byte);
            return;
        }
        out.put_u8(byte | 0x80);
    }
}

pub fn leb128_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

/// Splits a temporal unit into RTP elements: `obu_size` is stripped from every
/// OBU and temporal delimiters and tile lists are dropped.
///
/// # Errors
/// `InvalidPayload` if an OBU header or size overruns the buffer.
pub fn split_temporal_unit(tu: &[u8]) -> Result<Vec<Vec<u8>>, RtpError> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < tu.len() {
        let header = tu[idx];
        let header_len = if header & OBU_EXTENSION_BIT != 0 { 2 } else { 1 };
        if idx + header_len > tu.len() {
            return Err(RtpError::InvalidPayload("AV1 OBU header truncated"));
        }
        let (payload_start, payload_len) = if header & OBU_HAS_SIZE_BIT != 0 {
            let (size, used) = read_leb128(&tu[idx + header_len..])
                .ok_or(RtpError::InvalidPayload("AV1 obu_size truncated"))?;
            (idx + header_len + used, size as usize)
        } else {
            // Without obu_size the OBU runs to the end of the buffer
            (idx + header_len, tu.len() - idx - header_len)
        };
        let end = payload_start
            .checked_add(payload_len)
            .filter(|&e| e <= tu.len())
            .ok_or(RtpError::InvalidPayload("AV1 OBU overruns temporal unit"))?;

        let kind = obu_type(header);
        if kind != OBU_TYPE_TEMPORAL_DELIMITER && kind != OBU_TYPE_TILE_LIST {
            let mut el = Vec::with_capacity(header_len + payload_len);
            el.push(header & !OBU_HAS_SIZE_BIT);
            if header_len == 2 {
                el.push(tu[idx + 1]);
            }
            el.extend_from_slice(&tu[payload_start..end]);
            out.push(el);
        }
        idx = end;
    }
    Ok(out)
}

/// Appends an RTP element to `out` as a low-overhead OBU with `obu_size` set.
pub fn append_sized_obu(out: &mut BytesMut, element: &[u8]) {
    let Some(&header) = element.first() else {
        return;
    };
    if header & OBU_HAS_SIZE_BIT != 0 {
        out.extend_from_slice(element);
        return;
    }
    let header_len = if header & OBU_EXTENSION_BIT != 0 { 2 } else { 1 };
    out.put_u8(header | OBU_HAS_SIZE_BIT);
    if header_len == 2 && element.len() > 1 {
        out.put_u8(element[1]);
    }
    let body = element.get(header_len..).unwrap_or(&[]);
    write_leb128(out, body.len() as u64);
    out.extend_from_slice(body);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn leb128_encodes_multibyte_values() {
        let mut buf = BytesMut::new();
        write_leb128(&mut buf, 300);
        assert_eq!(&buf[..], &[0xAC, 0x02]);
        assert_eq!(read_leb128(&buf), Some((300, 2)));
        assert_eq!(leb128_len(300), 2);
        assert_eq!(leb128_len(127), 1);
        assert_eq!(read_leb128(&[0x80, 0x80]), None);
    }

    #[test]
    fn temporal_unit_split_and_restore() {
        // temporal delimiter, sequence header (3 bytes body), frame OBU with extension
        let tu = vec![
            0x12, 0x00, // TD, size 0
            0x0A, 0x03, 1, 2, 3, // SH
            0x36, 0x28, 0x02, 9, 8, // frame (type 6) + ext byte
        ];
        let elements = split_temporal_unit(&tu).unwrap();
        assert_eq!(elements, vec![vec![0x08, 1, 2, 3], vec![0x34, 0x28, 9, 8]]);

        let mut out = BytesMut::new();
        for el in &elements {
            append_sized_obu(&mut out, el);
        }
        assert_eq!(&out[..], &tu[2..]);
    }

    #[test]
    fn overrunning_size_is_rejected() {
        assert!(split_temporal_unit(&[0x0A, 0x09, 1]).is_err());
    }
}
