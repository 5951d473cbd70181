//! Growable bit set keyed by offset from a page's minimum sequence number
//!
//! Bits are stored in `u64` words. The bitmap grows on demand when a bit past
//! the current end is set, so a head page can keep accepting elements without
//! pre-sizing. Reads past the end are simply `false`.

/// Type alias for the underlying word type.
type Word = u64;

/// Number of bits in a [Word].
const BITS_PER_WORD: usize = Word::BITS as usize;

/// Acknowledgment set for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckBitmap {
    words: Vec<Word>,
}

impl AckBitmap {
    /// Creates an empty bitmap.
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates an empty bitmap with room for `bits` bits before growing.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(Self::word_count(bits)),
        }
    }

    /// Creates a bitmap with the first `len` bits set.
    ///
    /// This is how a recovered page rebuilds its durable acknowledged prefix.
    pub fn with_prefix(len: usize) -> Self {
        let mut bitmap = Self::with_capacity(len);
        bitmap.set_prefix(len);
        bitmap
    }

    #[inline]
    fn word_count(bits: usize) -> usize {
        bits.div_ceil(BITS_PER_WORD)
    }

    #[inline]
    fn locate(index: usize) -> (usize, Word) {
        (index / BITS_PER_WORD, 1 << (index % BITS_PER_WORD))
    }

    fn grow_to(&mut self, bits: usize) {
        let needed = Self::word_count(bits);
        if needed > self.words.len() {
            self.words.resize(needed, 0);
        }
    }

    /// Returns true if bit `index` is set.
    pub fn is_set(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Sets bit `index`, growing the bitmap if needed.
    ///
    /// Returns true if the bit was previously clear.
    pub fn set(&mut self, index: usize) -> bool {
        self.grow_to(index + 1);
        let (word, mask) = Self::locate(index);
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    /// Sets every bit in `[0, len)`.
    pub fn set_prefix(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.grow_to(len);

        let full_words = len / BITS_PER_WORD;
        for word in &mut self.words[..full_words] {
            *word = Word::MAX;
        }

        let remainder = len % BITS_PER_WORD;
        if remainder > 0 {
            self.words[full_words] |= (1 << remainder) - 1;
        }
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the index of the first clear bit at or after `from`.
    ///
    /// Bits past the allocated end are clear, so this always returns a value.
    pub fn next_clear(&self, from: usize) -> usize {
        let mut word_index = from / BITS_PER_WORD;
        if word_index >= self.words.len() {
            return from;
        }

        // Treat bits below `from` in the first word as set so they are skipped.
        let below = (1 << (from % BITS_PER_WORD)) - 1;
        let mut inverted = !(self.words[word_index] | below);

        loop {
            if inverted != 0 {
                return word_index * BITS_PER_WORD + inverted.trailing_zeros() as usize;
            }
            word_index += 1;
            match self.words.get(word_index) {
                Some(word) => inverted = !word,
                None => return word_index * BITS_PER_WORD,
            }
        }
    }

    /// Returns true if every bit in `[0, len)` is set.
    pub fn is_prefix_set(&self, len: usize) -> bool {
        self.next_clear(0) >= len
    }
}
