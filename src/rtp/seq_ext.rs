/// Extends 16-bit RTP sequence numbers into a 32-bit count of cycles + seq.
#[derive(Debug, Default, Clone)]
pub struct SeqExt {
    cycles: u32, // multiples of 2^16
    last: u16,   // last sequence number we saw
    started: bool,
}

impl SeqExt {
    pub fn update(&mut self, seq: u16) -> u32 {
        if !self.started {
            self.started = true;
            self.last = seq;
            return u32::from(seq);
        }
        // If we went "backwards" by more than half the space, it's a wrap
        if seq < self.last && self.last.wrapping_sub(seq) > 0x8000 {
            self.cycles = self.cycles.wrapping_add(1 << 16);
        }
        if is_newer_seq(seq, self.last) {
            self.last = seq;
        }
        self.cycles | u32::from(seq) // same as cycles + seq because cycles % 2^16 == 0
    }
}

/// `b` is newer than `a` in Z/65536 when `(b - a) mod 2^16` falls in the
/// lower half-range. A number is never newer than itself.
#[inline]
pub fn is_newer_seq(b: u16, a: u16) -> bool {
    b != a && b.wrapping_sub(a) < 0x8000
}

/// Same half-range rule over 32-bit RTP timestamps.
#[inline]
pub fn is_newer_ts(b: u32, a: u32) -> bool {
    b != a && b.wrapping_sub(a) < 0x8000_0000
}

/// Signed forward distance from `a` to `b`, in [-32768, 32767].
#[inline]
pub fn seq_delta(b: u16, a: u16) -> i32 {
    i32::from(b.wrapping_sub(a) as i16)
}

/// Unwraps 16-bit sequence numbers into monotonically comparable i64 values.
/// Late packets from the previous cycle map below the current cycle.
#[derive(Debug, Default, Clone)]
pub struct SeqUnwrapper {
    last: Option<i64>,
}

impl SeqUnwrapper {
    pub fn unwrap(&mut self, seq: u16) -> i64 {
        let Some(last) = self.last else {
            self.last = Some(i64::from(seq));
            return i64::from(seq);
        };
        let last_seq = (last & 0xFFFF) as u16;
        let value = last + i64::from(seq_delta(seq, last_seq));
        if value > last {
            self.last = Some(value);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_across_wraparound() {
        assert!(is_newer_seq(2, 65_534));
        assert!(!is_newer_seq(65_534, 2));
        assert!(is_newer_ts(5, u32::MAX - 5));
        assert!(!is_newer_ts(u32::MAX - 5, 5));
    }

    #[test]
    fn equal_values_are_not_newer() {
        assert!(!is_newer_seq(7, 7));
        assert!(!is_newer_seq(0, 0));
        assert!(!is_newer_ts(90_000, 90_000));
        // the half-range distance still counts as older
        assert!(!is_newer_seq(0x8000, 0));
    }

    #[test]
    fn seq_ext_counts_cycles() {
        let mut ext = SeqExt::default();
        assert_eq!(ext.update(65_534), 65_534);
        assert_eq!(ext.update(65_535), 65_535);
        assert_eq!(ext.update(1), 65_537);
        assert_eq!(ext.update(2), 65_538);
    }

    #[test]
    fn unwrapper_is_monotonic_through_wrap() {
        let mut u = SeqUnwrapper::default();
        assert_eq!(u.unwrap(65_535), 65_535);
        assert_eq!(u.unwrap(0), 65_536);
        assert_eq!(u.unwrap(65_534), 65_534);
        assert_eq!(u.unwrap(3), 65_539);
    }

    #[test]
    fn signed_delta() {
        assert_eq!(seq_delta(2, 65_534), 4);
        assert_eq!(seq_delta(65_534, 2), -4);
    }
}
