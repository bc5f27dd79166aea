//! The packed-bit lane type all of [crate::bits] is generic over.

use rand::RngCore;

/// A fixed-width unsigned integer used as the packed-bit lane for [super::BitVec] and
/// [super::BitTable].
///
/// Sealed: only [u64] and [u128] implement it, selected at build time via the
/// `lane64`/`lane128` cargo features (see the crate root docs). The trait exists so
/// the bit-packed structures are written once, generic over the lane width, instead
/// of duplicated per width.
pub trait Word:
    Copy + Clone + Default + PartialEq + Eq + std::fmt::Debug + sealed::Sealed
{
    /// Number of bits in one lane.
    const BITS: u32;
    /// The all-zero lane.
    const ZERO: Self;
    /// The all-one lane.
    const ALL: Self;

    fn bitand(self, other: Self) -> Self;
    fn bitor(self, other: Self) -> Self;
    fn bitxor(self, other: Self) -> Self;
    fn not(self) -> Self;
    fn shl(self, amount: u32) -> Self;
    fn shr(self, amount: u32) -> Self;
    fn count_ones(self) -> u32;
    fn is_zero(self) -> bool;

    /// Get bit `i` (0-indexed from the low bit).
    fn get_bit(self, i: u32) -> bool;
    /// Set (or clear) bit `i`.
    fn set_bit(self, i: u32, value: bool) -> Self;

    /// Draw a random lane from `rng`.
    fn random(rng: &mut impl RngCore) -> Self;

    /// Draw a random lane biased so each bit is independently `1` with probability
    /// `p`, using the "AND of `ceil(log2(1/p))` random words" trick from the
    /// reference simulator: ANDing `k` uniform words yields a per-bit one-probability
    /// of `2^-k`, which approximates `p` from above. At `p >= 0.5` this degrades to a
    /// single raw random word.
    fn random_biased(rng: &mut impl RngCore, p: f64) -> Self {
        if p <= 0.0 {
            return Self::ZERO;
        }
        if p >= 0.5 {
            return Self::random(rng);
        }
        let k = (-p.log2()).ceil() as u32;
        let mut word = Self::ALL;
        for _ in 0..k {
            word = word.bitand(Self::random(rng));
        }
        word
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for u64 {}
    impl Sealed for u128 {}
}

macro_rules! impl_word {
    ($ty:ty) => {
        impl Word for $ty {
            const BITS: u32 = <$ty>::BITS;
            const ZERO: Self = 0;
            const ALL: Self = <$ty>::MAX;

            #[inline]
            fn bitand(self, other: Self) -> Self {
                self & other
            }
            #[inline]
            fn bitor(self, other: Self) -> Self {
                self | other
            }
            #[inline]
            fn bitxor(self, other: Self) -> Self {
                self ^ other
            }
            #[inline]
            fn not(self) -> Self {
                !self
            }
            #[inline]
            fn shl(self, amount: u32) -> Self {
                if amount >= Self::BITS { 0 } else { self << amount }
            }
            #[inline]
            fn shr(self, amount: u32) -> Self {
                if amount >= Self::BITS { 0 } else { self >> amount }
            }
            #[inline]
            fn count_ones(self) -> u32 {
                <$ty>::count_ones(self)
            }
            #[inline]
            fn is_zero(self) -> bool {
                self == 0
            }
            #[inline]
            fn get_bit(self, i: u32) -> bool {
                (self >> i) & 1 == 1
            }
            #[inline]
            fn set_bit(self, i: u32, value: bool) -> Self {
                if value { self | (1 << i) } else { self & !(1 << i) }
            }
            fn random(rng: &mut impl RngCore) -> Self {
                let mut buf = [0u8; (Self::BITS / 8) as usize];
                rng.fill_bytes(&mut buf);
                let mut out: Self = 0;
                for (i, byte) in buf.iter().enumerate() {
                    out |= (*byte as Self) << (8 * i);
                }
                out
            }
        }
    };
}

impl_word!(u64);
impl_word!(u128);

#[cfg(feature = "lane128")]
/// The lane type selected at build time.
pub type DefaultWord = u128;
#[cfg(not(feature = "lane128"))]
/// The lane type selected at build time.
pub type DefaultWord = u64;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn bit_get_set_roundtrip() {
        let mut w = 0u64;
        w = w.set_bit(3, true);
        assert!(w.get_bit(3));
        assert_eq!(w.count_ones(), 1);
        w = w.set_bit(3, false);
        assert!(!w.get_bit(3));
        assert!(w.is_zero());
    }

    #[test]
    fn random_biased_extremes() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        assert_eq!(u64::random_biased(&mut rng, 0.0), 0);
        assert_eq!(u128::random_biased(&mut rng, 0.0), 0);
    }
}
