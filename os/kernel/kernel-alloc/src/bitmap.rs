//! # Block Bitmap
//!
//! One bit per block, packed into 32-bit words. Bit `i % 32` of word `i / 32`
//! tracks block `i`; a set bit means the block is in use.
//!
//! The bitmap does not own its storage. During early boot the words live in
//! physical memory right above the kernel image; in tests they live in a
//! plain buffer.

const WORD_BITS: u32 = u32::BITS;

/// A fixed-length bit set over borrowed word storage.
pub struct BlockBitmap<'a> {
    words: &'a mut [u32],
    len: u32,
}

impl<'a> BlockBitmap<'a> {
    /// Number of words needed to track `len` blocks.
    #[inline]
    #[must_use]
    pub const fn words_for(len: u32) -> usize {
        len.div_ceil(WORD_BITS) as usize
    }

    /// Wrap `words` as a bitmap of `len` bits, marking every bit as used.
    ///
    /// Returns `None` if `words` is too short for `len` bits.
    pub fn new_all_used(words: &'a mut [u32], len: u32) -> Option<Self> {
        let needed = Self::words_for(len);
        let words = words.get_mut(..needed)?;
        words.fill(u32::MAX);
        Some(Self { words, len })
    }

    /// Number of tracked bits.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing words.
    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u32] {
        self.words
    }

    #[inline]
    #[must_use]
    pub fn is_set(&self, bit: u32) -> bool {
        debug_assert!(bit < self.len);
        self.words[(bit / WORD_BITS) as usize] & (1 << (bit % WORD_BITS)) != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u32) {
        debug_assert!(bit < self.len);
        self.words[(bit / WORD_BITS) as usize] |= 1 << (bit % WORD_BITS);
    }

    #[inline]
    pub fn clear(&mut self, bit: u32) {
        debug_assert!(bit < self.len);
        self.words[(bit / WORD_BITS) as usize] &= !(1 << (bit % WORD_BITS));
    }

    /// Set every bit in `[start, end)`, clamped to the bitmap length.
    pub fn set_range(&mut self, start: u32, end: u32) {
        for bit in start..end.min(self.len) {
            self.set(bit);
        }
    }

    /// Clear every bit in `[start, end)`, clamped to the bitmap length.
    pub fn clear_range(&mut self, start: u32, end: u32) {
        for bit in start..end.min(self.len) {
            self.clear(bit);
        }
    }

    /// Index of the lowest clear bit (first fit).
    ///
    /// Fully used words are skipped without looking at individual bits.
    #[must_use]
    pub fn first_clear(&self) -> Option<u32> {
        for (w, &word) in (0u32..).zip(self.words.iter()) {
            if word == u32::MAX {
                continue;
            }
            let bit = w * WORD_BITS + (!word).trailing_zeros();
            // Padding bits in the last word are kept set, but be strict anyway.
            return (bit < self.len).then_some(bit);
        }
        None
    }

    /// Start of the lowest run of `count` consecutive clear bits (first fit).
    ///
    /// This is a linear scan with no run-length index.
    #[must_use]
    pub fn first_clear_run(&self, count: u32) -> Option<u32> {
        if count == 0 || count > self.len {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        let mut bit = 0;
        while bit < self.len {
            let word = self.words[(bit / WORD_BITS) as usize];
            if bit % WORD_BITS == 0 && word == u32::MAX {
                run_len = 0;
                bit += WORD_BITS;
                continue;
            }

            if word & (1 << (bit % WORD_BITS)) == 0 {
                if run_len == 0 {
                    run_start = bit;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
            bit += 1;
        }
        None
    }

    /// Number of clear bits.
    #[must_use]
    pub fn count_clear(&self) -> u32 {
        let full = (self.len / WORD_BITS) as usize;
        let clear: u32 = self.words[..full].iter().map(|w| w.count_zeros()).sum();
        // Padding bits past `len` never count.
        match self.len % WORD_BITS {
            0 => clear,
            tail => clear + (!self.words[full] & ((1 << tail) - 1)).count_ones(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_is_fully_used() {
        let mut words = [0u32; 2];
        let bm = BlockBitmap::new_all_used(&mut words, 40).unwrap();
        assert_eq!(bm.count_clear(), 0);
        assert_eq!(bm.first_clear(), None);
    }

    #[test]
    fn too_small_storage_is_rejected() {
        let mut words = [0u32; 1];
        assert!(BlockBitmap::new_all_used(&mut words, 33).is_none());
    }

    #[test]
    fn first_clear_skips_full_words() {
        let mut words = [0u32; 3];
        let mut bm = BlockBitmap::new_all_used(&mut words, 96).unwrap();
        bm.clear(70);
        bm.clear(71);
        assert_eq!(bm.first_clear(), Some(70));
        bm.clear(5);
        assert_eq!(bm.first_clear(), Some(5));
    }

    #[test]
    fn padding_bits_are_never_reported_free() {
        let mut words = [0u32; 1];
        let mut bm = BlockBitmap::new_all_used(&mut words, 10).unwrap();
        assert_eq!(bm.first_clear(), None);
        bm.clear_range(0, 64);
        assert_eq!(bm.count_clear(), 10);
        assert_eq!(bm.first_clear_run(11), None);
        assert_eq!(bm.first_clear_run(10), Some(0));
    }

    #[test]
    fn count_clear_spans_full_and_partial_words() {
        let mut words = [0u32; 2];
        let mut bm = BlockBitmap::new_all_used(&mut words, 40).unwrap();
        bm.clear_range(30, 40);
        assert_eq!(bm.count_clear(), 10);
        bm.set(31);
        bm.set(39);
        assert_eq!(bm.count_clear(), 8);
        bm.clear_range(0, 40);
        assert_eq!(bm.count_clear(), 40);
    }

    #[test]
    fn runs_span_word_boundaries() {
        let mut words = [0u32; 2];
        let mut bm = BlockBitmap::new_all_used(&mut words, 64).unwrap();
        bm.clear_range(30, 36);
        assert_eq!(bm.first_clear_run(6), Some(30));
        assert_eq!(bm.first_clear_run(7), None);
    }

    #[test]
    fn first_fit_prefers_the_lowest_sufficient_run() {
        let mut words = [0u32; 1];
        let mut bm = BlockBitmap::new_all_used(&mut words, 32).unwrap();
        bm.clear_range(2, 4); // run of 2
        bm.clear_range(10, 14); // run of 4
        bm.clear_range(20, 28); // run of 8
        assert_eq!(bm.first_clear_run(2), Some(2));
        assert_eq!(bm.first_clear_run(3), Some(10));
        assert_eq!(bm.first_clear_run(5), Some(20));
        assert_eq!(bm.first_clear_run(0), None);
    }
}
