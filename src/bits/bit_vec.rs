//! Owned, word-packed bit buffers.

use std::fmt;

use rand::RngCore;

use super::word::Word;

/// An owned buffer of `W`-bit words with a tracked logical bit length.
///
/// The backing storage is always a whole number of words; bits beyond
/// [BitVec::len] but within the last word are kept zeroed so that popcount and
/// equality don't need to mask them off on every call.
#[derive(Clone, PartialEq, Eq)]
pub struct BitVec<W: Word> {
    words: Vec<W>,
    len: usize,
}

impl<W: Word> fmt::Debug for BitVec<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitVec").field("len", &self.len).finish()
    }
}

impl<W: Word> BitVec<W> {
    /// Number of words needed to hold `bits` logical bits.
    fn words_for(bits: usize) -> usize {
        bits.div_ceil(W::BITS as usize)
    }

    /// Create a zeroed bit vector with the given logical length.
    pub fn zeros(len: usize) -> Self {
        Self { words: vec![W::ZERO; Self::words_for(len)], len }
    }

    /// Logical number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector holds zero bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw backing words, including any padding beyond `len`.
    pub fn words(&self) -> &[W] {
        &self.words
    }

    /// Mutable access to the raw backing words.
    pub fn words_mut(&mut self) -> &mut [W] {
        &mut self.words
    }

    fn word_bit(index: usize) -> (usize, u32) {
        (index / W::BITS as usize, (index % W::BITS as usize) as u32)
    }

    /// Read bit `index`.
    ///
    /// # Panics
    /// If `index >= self.len()`.
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
        let (word, bit) = Self::word_bit(index);
        self.words[word].get_bit(bit)
    }

    /// Write bit `index`.
    ///
    /// # Panics
    /// If `index >= self.len()`.
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
        let (word, bit) = Self::word_bit(index);
        self.words[word] = self.words[word].set_bit(bit, value);
    }

    /// Flip bit `index`.
    pub fn flip(&mut self, index: usize) {
        let cur = self.get(index);
        self.set(index, !cur);
    }

    /// Clear every bit to zero.
    pub fn clear(&mut self) {
        self.words.fill(W::ZERO);
    }

    /// `self ^= other`, word by word.
    ///
    /// # Panics
    /// If the lengths differ.
    pub fn xor_assign(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "BitVec length mismatch");
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a = a.bitxor(*b);
        }
    }

    /// `self |= other`, word by word.
    pub fn or_assign(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "BitVec length mismatch");
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a = a.bitor(*b);
        }
    }

    /// `self &= other`, word by word.
    pub fn and_assign(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "BitVec length mismatch");
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a = a.bitand(*b);
        }
    }

    /// Number of set bits.
    pub fn popcount(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// True if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| w.is_zero())
    }

    /// Fill every bit independently at random with probability `p` of being one,
    /// using [Word::random_biased].
    pub fn randomize_biased(&mut self, rng: &mut impl RngCore, p: f64) {
        for w in self.words.iter_mut() {
            *w = W::random_biased(rng, p);
        }
        self.mask_tail();
    }

    /// Zero out the padding bits beyond `len` in the final word, so popcount/equality
    /// aren't polluted by stale bits after a raw word write.
    pub fn mask_tail(&mut self) {
        let used_bits = self.len % W::BITS as usize;
        if used_bits == 0 || self.words.is_empty() {
            return;
        }
        let last = self.words.len() - 1;
        let mut mask = W::ZERO;
        for i in 0..used_bits as u32 {
            mask = mask.set_bit(i, true);
        }
        self.words[last] = self.words[last].bitand(mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn set_get_roundtrip() {
        let mut v = BitVec::<u64>::zeros(200);
        for i in [0, 1, 63, 64, 65, 127, 128, 199] {
            v.set(i, true);
        }
        for i in 0..200 {
            assert_eq!(v.get(i), matches!(i, 0 | 1 | 63 | 64 | 65 | 127 | 128 | 199));
        }
    }

    #[test]
    fn xor_is_involution() {
        let mut a = BitVec::<u64>::zeros(130);
        a.set(5, true);
        a.set(129, true);
        let b = a.clone();
        a.xor_assign(&b);
        assert!(a.is_zero());
    }

    #[test]
    fn popcount_matches_manual_count() {
        let mut v = BitVec::<u128>::zeros(300);
        let set_bits = [0, 10, 127, 128, 299];
        for &i in &set_bits {
            v.set(i, true);
        }
        assert_eq!(v.popcount() as usize, set_bits.len());
    }

    #[test]
    fn randomize_biased_zero_prob_is_empty() {
        let mut rng = ChaCha12Rng::seed_from_u64(42);
        let mut v = BitVec::<u64>::zeros(256);
        v.randomize_biased(&mut rng, 0.0);
        assert!(v.is_zero());
    }
}
