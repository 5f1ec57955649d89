//! Injectable random source for cosmetic values and track shuffling

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random numbers used by the session. Tests substitute a seeded source.
pub trait RandomSource {
    /// Uniform value in `low..high`. `low` when the range is empty.
    fn range_u32(&mut self, low: u32, high: u32) -> u32;

    /// Uniform index in `0..len`. Callers never pass zero.
    fn index(&mut self, len: usize) -> usize;
}

pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for StdRandom {
    fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "index() needs a non-empty range");
        self.rng.gen_range(0..len.max(1))
    }
}
