pub const RTCP_VERSION: u8 = 2;
/// The 5-bit count field caps report blocks per SR/RR.
pub const MAX_REPORT_BLOCKS: usize = 31;
