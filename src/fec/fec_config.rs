use super::{fec_error::FecError, fec_header::FEC_HEADER_LEN};
use crate::rtp::config::RTP_FIXED_HEADER_LEN;

/// Payload type carried by FEC repair packets.
pub const FEC_PAYLOAD_TYPE: u8 = 125;

pub const DEFAULT_CODE_RATE: f64 = 0.667;
pub const DEFAULT_MAX_SYMBOL_SIZE: usize = 1400;

/// Code rate and symbol size shared by every block of a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FecConfig {
    pub code_rate: f64,
    pub max_symbol_size: usize,
}

impl Default for FecConfig {
    fn default() -> Self {
        Self {
            code_rate: DEFAULT_CODE_RATE,
            max_symbol_size: DEFAULT_MAX_SYMBOL_SIZE,
        }
    }
}

impl FecConfig {
    /// # Errors
    /// `InvalidConfig` unless `0 < code_rate <= 1` and `max_symbol_size > 0`.
    pub fn new(code_rate: f64, max_symbol_size: usize) -> Result<Self, FecError> {
        if !(code_rate > 0.0 && code_rate <= 1.0) {
            return Err(FecError::InvalidConfig(format!(
                "code rate {code_rate} outside (0, 1]"
            )));
        }
        if max_symbol_size == 0 {
            return Err(FecError::InvalidConfig("max symbol size is 0".into()));
        }
        Ok(Self {
            code_rate,
            max_symbol_size,
        })
    }

    /// Shrinks the symbol size so a repair packet (RTP header, FEC header,
    /// one symbol) never exceeds `mtu`.
    #[must_use]
    pub fn fit_mtu(self, mtu: usize) -> Self {
        let room = mtu.saturating_sub(RTP_FIXED_HEADER_LEN + FEC_HEADER_LEN).max(1);
        Self {
            max_symbol_size: self.max_symbol_size.min(room),
            ..self
        }
    }

    /// `ceil(block_len / max_symbol_size)`.
    pub fn source_symbol_count(&self, block_len: usize) -> usize {
        block_len.div_ceil(self.max_symbol_size)
    }

    /// `ceil(source_symbol_count / code_rate)`.
    pub fn total_symbol_count(&self, source_symbol_count: usize) -> usize {
        (source_symbol_count as f64 / self.code_rate).ceil() as usize
    }

    pub fn repair_symbol_count(&self, source_symbol_count: usize) -> usize {
        self.total_symbol_count(source_symbol_count) - source_symbol_count
    }

    /// Symbol size actually used for a block: the smallest size that still
    /// splits the block into `source_symbol_count` symbols.
    pub fn symbol_size(&self, block_len: usize) -> usize {
        let k = self.source_symbol_count(block_len).max(1);
        block_len.div_ceil(k).max(1)
    }
}
