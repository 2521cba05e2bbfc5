use std::sync::Arc;

use super::{
    block_codec::BlockCodec, fec_config::FecConfig, fec_error::FecError, fec_header::FecHeader,
};

/// One repair symbol ready to be sent on the FEC stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairSymbol {
    pub header: FecHeader,
    pub data: Vec<u8>,
}

impl RepairSymbol {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(super::fec_header::FEC_HEADER_LEN + self.data.len());
        self.header.encode_into(&mut out);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Splits `block` into `k` zero-padded symbols of `symbol_size` bytes.
pub fn split_symbols(block: &[u8], symbol_size: usize) -> Vec<Vec<u8>> {
    block
        .chunks(symbol_size)
        .map(|c| {
            let mut s = c.to_vec();
            s.resize(symbol_size, 0);
            s
        })
        .collect()
}

/// Produces repair symbols for one source block at a time. Keeps no state
/// between blocks.
#[derive(Clone)]
pub struct FecEncoder {
    config: FecConfig,
    codec: Arc<dyn BlockCodec>,
}

impl FecEncoder {
    pub fn new(config: FecConfig, codec: Arc<dyn BlockCodec>) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &FecConfig {
        &self.config
    }

    /// # Errors
    /// `EmptyBlock`, or `BlockTooLarge` when the block needs more symbols
    /// than the codec supports.
    pub fn encode(&self, block: &[u8], base_seq: u16) -> Result<Vec<RepairSymbol>, FecError> {
        if block.is_empty() {
            return Err(FecError::EmptyBlock);
        }
        let symbol_size = self.config.symbol_size(block.len());
        let source = split_symbols(block, symbol_size);
        let k = source.len();
        let n = self.config.total_symbol_count(k);
        if n > self.codec.max_symbols() || n > usize::from(u16::MAX) {
            return Err(FecError::BlockTooLarge {
                symbols: n,
                max: self.codec.max_symbols(),
            });
        }
        let block_len = u32::try_from(block.len()).map_err(|_| FecError::BlockTooLarge {
            symbols: n,
            max: self.codec.max_symbols(),
        })?;
        let repairs = self.codec.encode_block(&source, n - k)?;
        Ok(repairs
            .into_iter()
            .enumerate()
            .map(|(i, data)| RepairSymbol {
                header: FecHeader {
                    symbol_id: (k + i) as u16,
                    source_count: k as u16,
                    total_count: n as u16,
                    block_len,
                    base_seq,
                },
                data,
            })
            .collect())
    }
}
