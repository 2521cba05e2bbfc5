use super::reassembled_unit::ReassembledUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The fragment belongs to a unit that was already emitted.
    AlreadyConsumed,
    /// A fragment run that can never form a unit (end fragment crossed
    /// before a start, mixed timestamps, or an unparsable run).
    InvalidRun,
}

/// Result of feeding one fragment to the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyOutcome {
    Complete(ReassembledUnit),
    /// Stored; waiting for more fragments.
    Pending,
    /// The end fragment arrived but `missing_seq` is absent. Non-fatal;
    /// the caller may try FEC recovery for `timestamp`.
    Gap {
        ssrc: u32,
        timestamp: u32,
        missing_seq: u16,
    },
    Dropped(DropReason),
}
