use super::{config::ONE_BYTE_EXTENSION_PROFILE, rtp_error::RtpError};

/// RFC 3550 header extension: a 16-bit profile and a body padded to 32 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeaderExtension {
    /// 16-bit profile-specific identifier.
    pub profile: u16,
    /// Raw extension body (not including the 4-byte header). Always a
    /// multiple of 4 bytes.
    pub data: Vec<u8>,
}

/// One element of a one-byte (0xBEDE) extension block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionElement {
    pub id: u8,
    pub data: Vec<u8>,
}

impl ExtensionElement {
    pub fn new(id: u8, data: Vec<u8>) -> Self {
        Self { id, data }
    }
}

impl RtpHeaderExtension {
    /// Builds an extension with an arbitrary profile, zero-padding `data`.
    pub fn new(profile: u16, mut data: Vec<u8>) -> Self {
        let pad = (4 - data.len() % 4) % 4;
        data.extend(std::iter::repeat_n(0u8, pad));
        Self { profile, data }
    }

    /// Builds a one-byte extension block (RFC 8285) from its elements.
    ///
    /// # Errors
    /// Element ids must be in 1..=14 and element lengths in 1..=16.
    pub fn one_byte(elements: &[ExtensionElement]) -> Result<Self, RtpError> {
        let mut data = Vec::new();
        for el in elements {
            if !(1..=14).contains(&el.id) || el.data.is_empty() || el.data.len() > 16 {
                return Err(RtpError::InvalidExtensionElement {
                    id: el.id,
                    len: el.data.len(),
                });
            }
            data.push((el.id << 4) | (el.data.len() as u8 - 1));
            data.extend_from_slice(&el.data);
        }
        Ok(Self::new(ONE_BYTE_EXTENSION_PROFILE, data))
    }

    pub fn is_one_byte(&self) -> bool {
        self.profile == ONE_BYTE_EXTENSION_PROFILE
    }

    /// Parses the one-byte elements. Non one-byte profiles yield no elements.
    ///
    /// # Errors
    /// `InvalidExtensionElement` when an element overruns the block.
    pub fn elements(&self) -> Result<Vec<ExtensionElement>, RtpError> {
        let mut out = Vec::new();
        if !self.is_one_byte() {
            return Ok(out);
        }
        let mut idx = 0;
        while idx < self.data.len() {
            let b = self.data[idx];
            let id = b >> 4;
            if id == 0 {
                // padding byte
                idx += 1;
                continue;
            }
            if id == 15 {
                break;
            }
            let len = usize::from(b & 0x0F) + 1;
            let start = idx + 1;
            let end = start + len;
            if end > self.data.len() {
                return Err(RtpError::InvalidExtensionElement { id, len });
            }
            out.push(ExtensionElement::new(id, self.data[start..end].to_vec()));
            idx = end;
        }
        Ok(out)
    }

    /// Returns the body of element `id`, if present and well formed.
    pub fn element(&self, id: u8) -> Option<Vec<u8>> {
        self.elements()
            .ok()?
            .into_iter()
            .find(|e| e.id == id)
            .map(|e| e.data)
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.profile.to_be_bytes());
        let words = self.data.len().div_ceil(4) as u16;
        out.extend_from_slice(&words.to_be_bytes());
        out.extend_from_slice(&self.data);
        let pad = (4 - self.data.len() % 4) % 4;
        out.extend(std::iter::repeat_n(0u8, pad));
    }

    /// Decodes an extension from the start of `buf`, returning bytes consumed.
    pub(crate) fn decode(buf: &[u8]) -> Result<(Self, usize), RtpError> {
        if buf.len() < 4 {
            return Err(RtpError::HeaderExtensionTooShort {
                declared: 4,
                buf_left: buf.len(),
            });
        }
        let profile = u16::from_be_bytes([buf[0], buf[1]]);
        let words = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
        let body_len = words * 4;
        if buf.len() - 4 < body_len {
            return Err(RtpError::HeaderExtensionTooShort {
                declared: body_len,
                buf_left: buf.len() - 4,
            });
        }
        let data = buf[4..4 + body_len].to_vec();
        Ok((Self { profile, data }, 4 + body_len))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn one_byte_elements_survive_padding() {
        let ext = RtpHeaderExtension::one_byte(&[
            ExtensionElement::new(2, vec![0, 0, 5, 220]),
            ExtensionElement::new(5, vec![9]),
        ])
        .unwrap();
        assert_eq!(ext.data.len() % 4, 0);
        assert_eq!(ext.element(2), Some(vec![0, 0, 5, 220]));
        assert_eq!(ext.element(5), Some(vec![9]));
        assert_eq!(ext.element(7), None);
    }

    #[test]
    fn rejects_reserved_ids_and_oversized_elements() {
        assert!(RtpHeaderExtension::one_byte(&[ExtensionElement::new(15, vec![1])]).is_err());
        assert!(RtpHeaderExtension::one_byte(&[ExtensionElement::new(0, vec![1])]).is_err());
        assert!(RtpHeaderExtension::one_byte(&[ExtensionElement::new(3, vec![0; 17])]).is_err());
    }

    #[test]
    fn overrunning_element_is_malformed() {
        // id=1, len=4 but only 3 bytes follow
        let ext = RtpHeaderExtension {
            profile: ONE_BYTE_EXTENSION_PROFILE,
            data: vec![0x13, 1, 2, 3],
        };
        assert!(ext.elements().unwrap_err().is_malformed());
    }
}
