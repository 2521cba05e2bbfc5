//! A frame's FEC source block: `u16 len || payload` for every media packet of
//! the frame, in send order.

use super::fec_error::FecError;

#[derive(Debug, Default, Clone)]
pub struct SourceBlockBuilder {
    buf: Vec<u8>,
    entries: usize,
}

impl SourceBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one payload and returns its byte offset in the block.
    pub fn push(&mut self, payload: &[u8]) -> u32 {
        let offset = self.buf.len() as u32;
        self.buf
            .extend_from_slice(&(payload.len().min(usize::from(u16::MAX)) as u16).to_be_bytes());
        self.buf.extend_from_slice(payload);
        self.entries += 1;
        offset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// The bytes a payload occupies inside the block.
pub fn block_entry(payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(2 + payload.len());
    v.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    v.extend_from_slice(payload);
    v
}

/// Splits a rebuilt block back into `(offset, payload)` entries.
///
/// # Errors
/// `MalformedSourceBlock` if an entry overruns the block.
pub fn split_source_block(block: &[u8]) -> Result<Vec<(u32, Vec<u8>)>, FecError> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < block.len() {
        if block.len() - idx < 2 {
            return Err(FecError::MalformedSourceBlock);
        }
        let len = usize::from(u16::from_be_bytes([block[idx], block[idx + 1]]));
        let start = idx + 2;
        if block.len() - start < len {
            return Err(FecError::MalformedSourceBlock);
        }
        out.push((idx as u32, block[start..start + len].to_vec()));
        idx = start + len;
    }
    Ok(out)
}
