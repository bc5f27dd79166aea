//! Seeded randomness and rare-event sampling.
//!
//! The sampler needs a reproducible stream: the same `(seed, batch_size, circuit)`
//! reproduces the same shots within one released version of this crate (deliberately
//! not guaranteed *across* versions — see [EngineRng::VERSION_SALT]).

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha12Rng;

/// A seeded, portable random stream for the sampler and tableau collapse.
///
/// Wraps [ChaCha12Rng] rather than the platform/version-dependent default RNG so
/// that seeds reproduce identically across machines and Rust versions, as long as
/// this crate's own version doesn't change (bumping [EngineRng::VERSION_SALT] is a
/// deliberate escape hatch for whenever a future version tweaks how randomness is
/// consumed, so stale seeds don't silently produce different-looking "reproduced"
/// runs).
#[derive(Clone)]
pub struct EngineRng {
    inner: ChaCha12Rng,
}

impl std::fmt::Debug for EngineRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRng").finish_non_exhaustive()
    }
}

impl EngineRng {
    /// Bumped whenever a crate version changes how the RNG stream is consumed, so
    /// that a seed reproducing a particular shot stream in one version is not
    /// silently expected to reproduce it in another.
    const VERSION_SALT: u64 = 1;

    /// Seed deterministically from a `u64`, mixed with [Self::VERSION_SALT].
    pub fn from_seed(seed: u64) -> Self {
        let mixed = seed ^ Self::VERSION_SALT.wrapping_mul(0x9E3779B97F4A7C15);
        Self { inner: ChaCha12Rng::seed_from_u64(mixed) }
    }

    /// Seed from the OS entropy source (still salted with [Self::VERSION_SALT], so
    /// logging the derived seed and replaying it later stays meaningful).
    pub fn from_entropy() -> Self {
        let mut seed_bytes = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut seed_bytes);
        Self::from_seed(u64::from_le_bytes(seed_bytes))
    }

    /// Mutable access to the underlying RNG, for callers that want to use
    /// `rand::Rng` methods or pass this to [crate::bits::Word::random_biased].
    pub fn inner_mut(&mut self) -> &mut impl RngCore {
        &mut self.inner
    }
}

impl RngCore for EngineRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }
}

/// Draw the number of independent Bernoulli(`p`) trials until (and including) the
/// next success, via the inverse-CDF transform `ceil(ln(1-u) / ln(1-p))`.
///
/// This lets a noise channel with a small error probability skip straight to its
/// next hit (`O(hits)` random draws) instead of flipping a coin per target
/// (`O(targets)`), which matters when `p` is tiny and the circuit is huge.
///
/// Returns `1` for any `p >= 1.0` (every trial already succeeds) and `u64::MAX` for
/// `p <= 0.0` (never succeeds — callers should treat this as "no more hits in this
/// stream" and stop sampling).
pub fn geometric_skip(rng: &mut impl RngCore, p: f64) -> u64 {
    if p <= 0.0 {
        return u64::MAX;
    }
    if p >= 1.0 {
        return 1;
    }
    let u: f64 = loop {
        let u = (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
        if u < 1.0 {
            break u;
        }
    };
    let skip = ((1.0 - u).ln() / (1.0 - p).ln()).ceil();
    skip.max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_stream() {
        let mut a = EngineRng::from_seed(7);
        let mut b = EngineRng::from_seed(7);
        let sample_a: Vec<u64> = (0..16).map(|_| a.next_u64()).collect();
        let sample_b: Vec<u64> = (0..16).map(|_| b.next_u64()).collect();
        assert_eq!(sample_a, sample_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = EngineRng::from_seed(1);
        let mut b = EngineRng::from_seed(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn geometric_skip_edges() {
        let mut rng = EngineRng::from_seed(3);
        assert_eq!(geometric_skip(&mut rng, 1.0), 1);
        assert_eq!(geometric_skip(&mut rng, 0.0), u64::MAX);
    }

    #[test]
    fn geometric_skip_mean_is_roughly_one_over_p() {
        let mut rng = EngineRng::from_seed(99);
        let p = 0.01;
        let n = 20_000;
        let total: u64 = (0..n).map(|_| geometric_skip(&mut rng, p)).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 1.0 / p).abs() < 0.1 * (1.0 / p));
    }
}
