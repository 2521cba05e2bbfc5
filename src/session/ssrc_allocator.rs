use std::collections::HashSet;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Hands out random, non-zero SSRCs that are unique within one session,
/// including the remote side's SSRCs once they are known.
#[derive(Debug)]
pub struct SsrcAllocator {
    used: HashSet<u32>,
    rng: StdRng,
}

impl Default for SsrcAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SsrcAllocator {
    pub fn new() -> Self {
        Self {
            used: HashSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            used: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn allocate(&mut self) -> u32 {
        loop {
            let ssrc: u32 = self.rng.r#gen();
            if ssrc != 0 && self.used.insert(ssrc) {
                return ssrc;
            }
        }
    }

    /// Marks an SSRC already taken. Returns false if it collides with one
    /// handed out or reserved before.
    pub fn reserve(&mut self, ssrc: u32) -> bool {
        self.used.insert(ssrc)
    }

    pub fn contains(&self, ssrc: u32) -> bool {
        self.used.contains(&ssrc)
    }
}
