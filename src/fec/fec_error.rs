use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FecError {
    InvalidConfig(String),
    EmptyBlock,
    BlockTooLarge { symbols: usize, max: usize },
    SymbolSizeMismatch { expected: usize, got: usize },
    InvalidSymbolId(usize),
    /// Not enough symbols to rebuild the block; the block is dropped.
    Unrecoverable { received: usize, needed: usize },
    MalformedHeader,
    MalformedSourceBlock,
}

impl fmt::Display for FecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FecError::*;
        match self {
            InvalidConfig(m) => write!(f, "invalid FEC config: {m}"),
            EmptyBlock => write!(f, "empty FEC source block"),
            BlockTooLarge { symbols, max } => {
                write!(f, "block needs {symbols} symbols, codec supports {max}")
            }
            SymbolSizeMismatch { expected, got } => {
                write!(f, "symbol size {got} differs from block symbol size {expected}")
            }
            InvalidSymbolId(id) => write!(f, "symbol id {id} outside the block"),
            Unrecoverable { received, needed } => {
                write!(f, "unrecoverable block: {received} of {needed} symbols")
            }
            MalformedHeader => write!(f, "malformed FEC payload header"),
            MalformedSourceBlock => write!(f, "malformed FEC source block"),
        }
    }
}

impl std::error::Error for FecError {}
