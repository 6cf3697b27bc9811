//! Deterministic pseudo-random source for partitioning and bagging.
//!
//! A 64-bit Xorshift generator: reproducible across platforms, no OS entropy,
//! no global state. Every random decision in the pipeline (train/test
//! partition, bootstrap draws, feature sub-sampling) flows through an
//! [`XorShift64`] seeded from [`crate::config::ForecastConfig::seed`].

/// Replacement state for a zero seed, which would otherwise stay zero forever.
const ZERO_SEED_STATE: u64 = 0x853c_49e6_748f_ea9b;

/// Xorshift64 generator.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Create a generator from `seed`.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { ZERO_SEED_STATE } else { seed };
        XorShift64 { state }
    }

    /// Generator for the `stream`-th independent consumer of `seed`.
    ///
    /// Used to give every tree in a forest its own reproducible sequence.
    pub fn derived(seed: u64, stream: u64) -> Self {
        Self::new(splitmix64(seed ^ splitmix64(stream.wrapping_add(1))))
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform index in `0..bound`. `bound` must be non-zero.
    pub fn next_index(&mut self, bound: usize) -> usize {
        debug_assert!(bound > 0, "bound must be > 0");
        (self.next_u64() % bound as u64) as usize
    }

    /// In-place Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let n = items.len();
        if n <= 1 {
            return;
        }
        for i in (1..n).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

/// SplitMix64 finalizer, used to decorrelate derived seeds.
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
