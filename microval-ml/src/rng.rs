//! Seedable PRNG shared by fold shuffling and forest training.

/// Simple LCG PRNG (linear congruential generator).
///
/// Uses the Knuth MMIX constants: multiplier 6364136223846793005,
/// increment 1442695040888963407.
#[derive(Debug, Clone)]
pub(crate) struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(1), // avoid zero state
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Bounded draw from the high bits; the low bits of an LCG are weak.
    pub(crate) fn next_bounded(&mut self, bound: u64) -> u64 {
        (self.next_u64() >> 33) % bound
    }
}

/// Fisher-Yates shuffle using LCG.
pub(crate) fn shuffle(rng: &mut LcgRng, data: &mut [usize]) {
    let n = data.len();
    for i in (1..n).rev() {
        let j = rng.next_bounded((i + 1) as u64) as usize;
        data.swap(i, j);
    }
}

/// Seed for one fold's model, distinct for every `(trial, fold)` of a run.
///
/// SplitMix64 finalizer over the run seed and the fold position.
pub(crate) fn fold_seed(run_seed: u64, trial: usize, fold: usize) -> u64 {
    let mut z = run_seed
        .wrapping_add((trial as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((fold as u64 + 1).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed drawn from the clock, for runs that do not ask for reproducibility.
pub fn entropy_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ (std::process::id() as u64).rotate_left(32)
}
