use std::collections::BTreeMap;
use std::time::Instant;

use super::{
    block_codec::BlockCodec,
    fec_error::FecError,
    fec_header::FecHeader,
    source_block::{block_entry, split_source_block},
};

/// A media payload rebuilt from repair symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPacket {
    pub sequence_number: u16,
    /// Offset of the payload's entry in the source block.
    pub block_offset: u32,
    pub payload: Vec<u8>,
    /// Last media packet of the block (carries the frame marker).
    pub last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockLayout {
    source_count: usize,
    total_count: usize,
    block_len: usize,
    symbol_size: usize,
    base_seq: u16,
}

/// Decoder state for exactly one source block.
#[derive(Debug)]
pub struct FecBlockDecoder {
    created: Instant,
    pieces: BTreeMap<u32, Vec<u8>>,
    repairs: BTreeMap<usize, Vec<u8>>,
    layout: Option<BlockLayout>,
}

impl FecBlockDecoder {
    pub fn new(now: Instant) -> Self {
        Self {
            created: now,
            pieces: BTreeMap::new(),
            repairs: BTreeMap::new(),
            layout: None,
        }
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    /// Records a received media payload at its source-block offset.
    pub fn add_source(&mut self, offset: u32, payload: &[u8]) {
        self.pieces.insert(offset, block_entry(payload));
    }

    /// Nothing received for this block yet.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty() && self.repairs.is_empty()
    }

    /// The block layout is only adopted once a symbol matching it arrives.
    ///
    /// # Errors
    /// `InvalidSymbolId` for an id inside the source range,
    /// `SymbolSizeMismatch` when the symbol does not fit the layout its
    /// header describes, `MalformedHeader` if that layout disagrees with
    /// earlier repair symbols.
    pub fn add_repair(&mut self, hdr: &FecHeader, data: &[u8]) -> Result<(), FecError> {
        let source_count = usize::from(hdr.source_count);
        let symbol_id = usize::from(hdr.symbol_id);
        if symbol_id < source_count {
            return Err(FecError::InvalidSymbolId(symbol_id));
        }
        let block_len = hdr.block_len as usize;
        let layout = BlockLayout {
            source_count,
            total_count: usize::from(hdr.total_count),
            block_len,
            symbol_size: block_len.div_ceil(source_count).max(1),
            base_seq: hdr.base_seq,
        };
        if data.len() != layout.symbol_size {
            return Err(FecError::SymbolSizeMismatch {
                expected: layout.symbol_size,
                got: data.len(),
            });
        }
        if self.layout.is_some_and(|existing| existing != layout) {
            return Err(FecError::MalformedHeader);
        }
        self.layout = Some(layout);
        self.repairs.insert(symbol_id, data.to_vec());
        Ok(())
    }

    pub fn repair_count(&self) -> usize {
        self.repairs.len()
    }

    /// Rebuilds the block and returns the media payloads that were not
    /// received.
    ///
    /// # Errors
    /// `Unrecoverable` when fewer than `source_count` symbols are known.
    pub fn try_recover(&self, codec: &dyn BlockCodec) -> Result<Vec<RecoveredPacket>, FecError> {
        let Some(layout) = self.layout else {
            return Err(FecError::Unrecoverable {
                received: self.pieces.len(),
                needed: 0,
            });
        };
        let s = layout.symbol_size;
        let mut block = vec![0u8; layout.source_count * s];
        let mut covered = vec![false; layout.block_len];
        for (&offset, entry) in &self.pieces {
            let start = offset as usize;
            let end = start + entry.len();
            if end > layout.block_len {
                continue;
            }
            block[start..end].copy_from_slice(entry);
            covered[start..end].iter_mut().for_each(|c| *c = true);
        }

        let mut received: Vec<(usize, Vec<u8>)> = (0..layout.source_count)
            .filter(|&i| {
                let lo = i * s;
                let hi = ((i + 1) * s).min(layout.block_len);
                lo < hi && covered[lo..hi].iter().all(|&c| c)
            })
            .map(|i| (i, block[i * s..(i + 1) * s].to_vec()))
            .collect();
        received.extend(self.repairs.iter().map(|(&id, d)| (id, d.clone())));

        let symbols = codec.decode_block(layout.source_count, layout.total_count, &received)?;
        let mut rebuilt: Vec<u8> = symbols.concat();
        rebuilt.truncate(layout.block_len);

        let entries = split_source_block(&rebuilt)?;
        let count = entries.len();
        Ok(entries
            .into_iter()
            .enumerate()
            .filter(|(_, (offset, _))| !self.pieces.contains_key(offset))
            .map(|(i, (offset, payload))| RecoveredPacket {
                sequence_number: layout.base_seq.wrapping_add(i as u16),
                block_offset: offset,
                payload,
                last: i + 1 == count,
            })
            .collect())
    }
}
