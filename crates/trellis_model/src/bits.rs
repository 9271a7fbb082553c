//! Compact bit vectors for component signatures
//!
//! Every component type is assigned a bit index on first sight (see
//! [`crate::component::ComponentId`]), so testing whether a node carries a
//! set of components is a word-wise subset test instead of a per-component
//! lookup. `Bits` is the immutable, arbitrary-width vector backing those
//! signatures.
//!
//! Values are stored as little-endian `u64` words, always trimmed so the
//! highest word is non-zero. The canonical empty value has zero words, which
//! lets the derived equality and hash ignore trailing unset words for free.

use smallvec::SmallVec;
use std::fmt;

/// Number of bits per storage word.
const WORD_BITS: usize = 64;

/// An immutable, arbitrary-length bit vector.
///
/// All operations are pure and return new values. Bit indices are 0-based;
/// negative indices and shift counts are unrepresentable (`usize`).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bits {
    /// Little-endian words, trimmed so the last word is non-zero.
    words: SmallVec<[u64; 2]>,
}

impl Bits {
    /// The empty signature (no bits set, zero words).
    pub fn empty() -> Self {
        Self {
            words: SmallVec::new(),
        }
    }

    /// A signature with exactly one bit set.
    pub fn of_bit(index: usize) -> Self {
        let mut words = SmallVec::new();
        words.resize(index / WORD_BITS + 1, 0u64);
        let last = words.len() - 1;
        words[last] = 1u64 << (index % WORD_BITS);
        Self { words }
    }

    /// Builds a signature from raw little-endian words.
    ///
    /// Trailing zero words are trimmed, so `[0b1, 0]` and `[0b1]` produce
    /// equal values.
    pub fn from_words(words: &[u64]) -> Self {
        Self::trimmed(words.iter().copied().collect())
    }

    fn trimmed(mut words: SmallVec<[u64; 2]>) -> Self {
        while words.last() == Some(&0) {
            words.pop();
        }
        Self { words }
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Index of the highest set bit plus one; 0 when empty.
    pub fn len(&self) -> usize {
        match self.words.last() {
            Some(word) => self.words.len() * WORD_BITS - word.leading_zeros() as usize,
            None => 0,
        }
    }

    /// Whether the bit at `index` is set.
    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word >> (index % WORD_BITS) & 1 == 1)
    }

    /// Bitwise intersection.
    pub fn and(&self, other: &Bits) -> Bits {
        let words = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a & b)
            .collect();
        Self::trimmed(words)
    }

    /// Bitwise union.
    pub fn or(&self, other: &Bits) -> Bits {
        let (longer, shorter) = if self.words.len() >= other.words.len() {
            (&self.words, &other.words)
        } else {
            (&other.words, &self.words)
        };
        let mut words: SmallVec<[u64; 2]> = longer.clone();
        for (word, other_word) in words.iter_mut().zip(shorter.iter()) {
            *word |= other_word;
        }
        // Union of trimmed inputs cannot end in a zero word.
        Self { words }
    }

    /// Logical (unsigned) right shift, zero-filling from the top.
    ///
    /// Shifting by the signature's logical length or more yields the empty
    /// value. Bits crossing a word boundary carry into the lower word via
    /// the complementary shift.
    pub fn right_shift(&self, count: usize) -> Bits {
        if count == 0 {
            return self.clone();
        }
        if count >= self.len() {
            return Self::empty();
        }
        let word_shift = count / WORD_BITS;
        let bit_shift = count % WORD_BITS;
        if bit_shift == 0 {
            // Whole-word shift, no carries.
            return Self::trimmed(self.words[word_shift..].iter().copied().collect());
        }
        let mut words: SmallVec<[u64; 2]> = SmallVec::new();
        for i in word_shift..self.words.len() {
            let mut word = self.words[i] >> bit_shift;
            if let Some(next) = self.words.get(i + 1) {
                word |= next << (WORD_BITS - bit_shift);
            }
            words.push(word);
        }
        Self::trimmed(words)
    }

    /// Whether any bit is set in both `self` and `other`.
    pub fn intersects(&self, other: &Bits) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Whether `self` is a superset of `other`.
    pub fn contains_all(&self, other: &Bits) -> bool {
        if other.words.len() > self.words.len() {
            return false;
        }
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bits[")?;
        for (i, word) in self.words.iter().enumerate().rev() {
            if i < self.words.len() - 1 {
                write!(f, " ")?;
            }
            write!(f, "{word:016x}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_length() {
        assert!(Bits::empty().is_empty());
        assert_eq!(Bits::empty().len(), 0);
    }

    #[test]
    fn test_of_bit() {
        let bits = Bits::of_bit(5);
        assert!(bits.get(5));
        assert!(!bits.get(4));
        assert_eq!(bits.len(), 6);

        let high = Bits::of_bit(70);
        assert!(high.get(70));
        assert_eq!(high.len(), 71);
    }

    #[test]
    fn test_or_is_commutative() {
        let a = Bits::of_bit(3);
        let b = Bits::of_bit(100);
        assert_eq!(a.or(&b), b.or(&a));
    }

    #[test]
    fn test_and_is_idempotent() {
        let a = Bits::of_bit(7).or(&Bits::of_bit(90));
        assert_eq!(a.and(&a), a);
    }

    #[test]
    fn test_or_with_empty_is_identity() {
        let a = Bits::of_bit(12).or(&Bits::of_bit(64));
        assert_eq!(a.or(&Bits::empty()), a);
        assert_eq!(Bits::empty().or(&a), a);
    }

    #[test]
    fn test_contains_all_is_reflexive() {
        let a = Bits::of_bit(1).or(&Bits::of_bit(127));
        assert!(a.contains_all(&a));
        assert!(Bits::empty().contains_all(&Bits::empty()));
    }

    #[test]
    fn test_contains_all_subset() {
        let a = Bits::of_bit(2).or(&Bits::of_bit(65));
        assert!(a.contains_all(&Bits::of_bit(2)));
        assert!(a.contains_all(&Bits::of_bit(65)));
        assert!(!a.contains_all(&Bits::of_bit(3)));
        assert!(!Bits::of_bit(2).contains_all(&a));
    }

    #[test]
    fn test_intersects() {
        let a = Bits::of_bit(2).or(&Bits::of_bit(65));
        assert!(a.intersects(&Bits::of_bit(65)));
        assert!(!a.intersects(&Bits::of_bit(64)));
        assert!(!a.intersects(&Bits::empty()));
    }

    #[test]
    fn test_equality_ignores_trailing_zero_words() {
        assert_eq!(Bits::from_words(&[0b1, 0]), Bits::from_words(&[0b1]));
        assert_eq!(Bits::from_words(&[0, 0]), Bits::empty());
    }

    #[test]
    fn test_right_shift_zero_is_identity() {
        let a = Bits::of_bit(70).or(&Bits::of_bit(3));
        assert_eq!(a.right_shift(0), a);
    }

    #[test]
    fn test_right_shift_past_length_is_empty() {
        let a = Bits::of_bit(10);
        assert_eq!(a.right_shift(11), Bits::empty());
        assert_eq!(a.right_shift(1000), Bits::empty());
    }

    #[test]
    fn test_right_shift_single_word() {
        let a = Bits::from_words(&[0b1100]);
        assert_eq!(a.right_shift(2), Bits::from_words(&[0b11]));
    }

    #[test]
    fn test_right_shift_whole_words() {
        let a = Bits::from_words(&[0xdead, 0xbeef]);
        assert_eq!(a.right_shift(64), Bits::from_words(&[0xbeef]));
    }

    #[test]
    fn test_right_shift_carries_across_words() {
        // Bit 70 shifted down by 6 lands on bit 64.
        let a = Bits::of_bit(70);
        let shifted = a.right_shift(6);
        assert!(shifted.get(64));
        assert_eq!(shifted.len(), 65);

        // Bit 70 shifted down by 7 crosses into the low word.
        let crossed = a.right_shift(7);
        assert!(crossed.get(63));
        assert_eq!(crossed.len(), 64);
    }

    #[test]
    fn test_right_shift_shrinks_length() {
        let a = Bits::of_bit(100).or(&Bits::of_bit(3));
        for n in [1, 5, 64, 99, 100] {
            assert!(a.right_shift(n).len() <= a.len().saturating_sub(n));
        }
    }
}
