use super::fec_error::FecError;

/// Erasure code used by the FEC adapter. Symbols `0..source_count` are the
/// source symbols; ids `source_count..total_count` are repair symbols.
pub trait BlockCodec: Send + Sync {
    /// Produces `repair_count` repair symbols for equally sized `source`
    /// symbols.
    fn encode_block(&self, source: &[Vec<u8>], repair_count: usize)
    -> Result<Vec<Vec<u8>>, FecError>;

    /// Rebuilds all source symbols from any sufficient subset of symbols.
    ///
    /// # Errors
    /// `Unrecoverable` when `received` does not determine the block.
    fn decode_block(
        &self,
        source_count: usize,
        total_count: usize,
        received: &[(usize, Vec<u8>)],
    ) -> Result<Vec<Vec<u8>>, FecError>;

    /// Largest `total_count` the codec supports.
    fn max_symbols(&self) -> usize;
}
