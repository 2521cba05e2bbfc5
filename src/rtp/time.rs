//! NTP wall-clock values as carried by sender reports, plus the 16.16
//! "compact" form used by LSR/DLSR and congestion feedback.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

/// 64-bit NTP timestamp: seconds since 1900 in the high word, binary
/// fraction in the low word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct NtpTime(pub u64);

impl NtpTime {
    pub fn now() -> Self {
        Self::from_unix(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default())
    }

    pub fn from_unix(since_epoch: Duration) -> Self {
        let secs = (since_epoch.as_secs() + NTP_UNIX_OFFSET_SECS) & 0xFFFF_FFFF;
        let frac = (u64::from(since_epoch.subsec_nanos()) << 32) / 1_000_000_000;
        Self((secs << 32) | frac)
    }

    pub fn from_parts(secs: u32, frac: u32) -> Self {
        Self((u64::from(secs) << 32) | u64::from(frac))
    }

    pub fn secs(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn frac(self) -> u32 {
        self.0 as u32
    }

    /// Middle 32 bits (16.16 fixed point); the LSR value echoed by receivers.
    pub fn compact(self) -> u32 {
        (self.0 >> 16) as u32
    }
}

pub fn compact_now() -> u32 {
    NtpTime::now().compact()
}

pub fn compact_to_duration(compact: u32) -> Duration {
    Duration::from_micros((u64::from(compact) * 1_000_000) >> 16)
}

/// Saturates at `u32::MAX` (about 18 hours).
pub fn duration_to_compact(d: Duration) -> u32 {
    let v = (d.as_micros() << 16) / 1_000_000;
    u32::try_from(v).unwrap_or(u32::MAX)
}
