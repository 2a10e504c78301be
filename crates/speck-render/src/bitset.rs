use std::marker::PhantomData;

use rayon::prelude::*;

pub const BITS_PER_WORD: usize = 32;

/// Marker for per-splat selection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection;

/// Marker for per-splat deletion state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deletion;

/// One bit per splat, packed into `u32` words.
///
/// The kind parameter keeps selection and deletion state from being mixed up.
/// Bits past `len` in the last word are always zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitset<K> {
    words: Vec<u32>,
    len: usize,
    _kind: PhantomData<K>,
}

pub type SelectionBits = Bitset<Selection>;
pub type DeletionBits = Bitset<Deletion>;

impl<K> Bitset<K> {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(BITS_PER_WORD)],
            len,
            _kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "Bit {index} out of range {}", self.len);
        self.words[index / BITS_PER_WORD] & (1 << (index % BITS_PER_WORD)) != 0
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "Bit {index} out of range {}", self.len);
        let mask = 1 << (index % BITS_PER_WORD);
        let word = &mut self.words[index / BITS_PER_WORD];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn count_ones(&self) -> usize {
        self.words.par_iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    /// Recompute every bit in parallel, one word per invocation. `kernel` gets
    /// the splat index and the current bit and returns the new bit.
    pub fn par_update(&mut self, kernel: impl Fn(usize, bool) -> bool + Sync + Send) {
        let len = self.len;
        self.words
            .par_iter_mut()
            .enumerate()
            .for_each(|(word_index, word)| {
                let base = word_index * BITS_PER_WORD;
                let mut result = 0u32;
                for bit in 0..BITS_PER_WORD.min(len - base) {
                    let current = *word & (1 << bit) != 0;
                    if kernel(base + bit, current) {
                        result |= 1 << bit;
                    }
                }
                *word = result;
            });
    }

    /// Same bits for the first `min(old, new)` splats, cleared past them.
    pub fn resized(&self, len: usize) -> Self {
        let mut resized = Self::new(len);
        let keep_words = resized.words.len().min(self.words.len());
        resized.words[..keep_words].copy_from_slice(&self.words[..keep_words]);
        resized.mask_tail();
        resized
    }

    /// Set `self |= other` for bitsets of the same length.
    pub fn union_with<O>(&mut self, other: &Bitset<O>) {
        assert_eq!(self.len, other.len, "Bitset lengths differ");
        self.words
            .par_iter_mut()
            .zip(other.words.par_iter())
            .for_each(|(a, b)| *a |= *b);
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                (0..BITS_PER_WORD)
                    .filter(move |bit| word & (1 << bit) != 0)
                    .map(move |bit| word_index * BITS_PER_WORD + bit)
            })
    }

    fn mask_tail(&mut self) {
        let used = self.len % BITS_PER_WORD;
        if used != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u32 << used) - 1;
        }
    }
}

#[cfg(all(test, not(target_family = "wasm")))]
mod tests {
    use super::{DeletionBits, SelectionBits};

    #[test]
    fn set_and_get() {
        let mut bits = SelectionBits::new(70);
        bits.set(0, true);
        bits.set(33, true);
        bits.set(69, true);
        assert!(bits.get(33));
        assert!(!bits.get(34));
        assert_eq!(bits.count_ones(), 3);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), [0, 33, 69]);
        bits.set(33, false);
        assert_eq!(bits.count_ones(), 2);
    }

    #[test]
    fn update_leaves_tail_clear() {
        let mut bits = SelectionBits::new(40);
        bits.par_update(|_, _| true);
        assert_eq!(bits.count_ones(), 40);
        assert_eq!(bits.words()[1], 0xFF);
        bits.par_update(|i, bit| !bit || i == 0);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), [0]);
    }

    #[test]
    fn resize_preserves_prefix() {
        let mut bits = DeletionBits::new(100);
        bits.set(5, true);
        bits.set(90, true);
        let shrunk = bits.resized(64);
        assert_eq!(shrunk.iter_ones().collect::<Vec<_>>(), [5]);
        let shrunk = bits.resized(10);
        assert_eq!(shrunk.words()[0], 1 << 5);
        let grown = bits.resized(200);
        assert_eq!(grown.iter_ones().collect::<Vec<_>>(), [5, 90]);
    }

    #[test]
    fn union_across_kinds() {
        let mut deleted = DeletionBits::new(50);
        deleted.set(1, true);
        let mut selected = SelectionBits::new(50);
        selected.set(2, true);
        selected.set(49, true);
        deleted.union_with(&selected);
        assert_eq!(deleted.iter_ones().collect::<Vec<_>>(), [1, 2, 49]);
    }
}
