//! Lock-free atomic bitsets backing the node store's `bitmap1` (region ownership), `bitmap2`
//! (slot occupied / GC mark), and `bitmapc` (custom-leaf slot) of §3.2.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct AtomicBitset {
    words: Vec<AtomicU64>,
}

impl AtomicBitset {
    pub fn new(bits: u64) -> AtomicBitset {
        let words = ((bits + 63) / 64).max(1) as usize;
        AtomicBitset {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    pub fn get(&self, bit: u64) -> bool {
        let (word, mask) = Self::locate(bit);
        self.words[word].load(Ordering::Acquire) & mask != 0
    }

    #[inline]
    pub fn set(&self, bit: u64, order: Ordering) {
        let (word, mask) = Self::locate(bit);
        self.words[word].fetch_or(mask, order);
    }

    #[inline]
    pub fn clear(&self, bit: u64, order: Ordering) {
        let (word, mask) = Self::locate(bit);
        self.words[word].fetch_and(!mask, order);
    }

    /// Atomically set the bit and report whether *this* call was the one to set it (CAS-style
    /// idempotent mark, §4.2 "Marking is recursive and parallel; re-marking is idempotent via
    /// CAS").
    #[inline]
    pub fn set_if_clear(&self, bit: u64) -> bool {
        let (word, mask) = Self::locate(bit);
        let previous = self.words[word].fetch_or(mask, Ordering::AcqRel);
        previous & mask == 0
    }

    /// Clear every word in parallel-safe fashion (used by GC phase 1, "clear hashes").
    pub fn clear_all(&self) {
        for word in &self.words {
            word.store(0, Ordering::Relaxed);
        }
    }

    pub fn bit_capacity(&self) -> u64 {
        self.words.len() as u64 * 64
    }

    /// Scan for any word with a free bit starting at `from_word`, wrapping around. Used by the
    /// region allocator to find an unclaimed 512-slot region (§4.2 "Region claiming").
    pub fn find_and_set_free_bit(&self, from_word: usize) -> Option<u64> {
        let n = self.words.len();
        if n == 0 {
            return None;
        }
        for i in 0..n {
            let idx = (from_word + i) % n;
            loop {
                let current = self.words[idx].load(Ordering::Acquire);
                if current == u64::MAX {
                    break;
                }
                let free_bit = (!current).trailing_zeros();
                let mask = 1u64 << free_bit;
                let previous = self.words[idx].fetch_or(mask, Ordering::AcqRel);
                if previous & mask == 0 {
                    return Some(idx as u64 * 64 + free_bit as u64);
                }
                // Someone else grabbed it between load and fetch_or; retry this word.
            }
        }
        None
    }

    #[inline]
    fn locate(bit: u64) -> (usize, u64) {
        ((bit / 64) as usize, 1u64 << (bit % 64))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let bs = AtomicBitset::new(200);
        assert!(!bs.get(150));
        bs.set(150, Ordering::Relaxed);
        assert!(bs.get(150));
        bs.clear(150, Ordering::Relaxed);
        assert!(!bs.get(150));
    }

    #[test]
    fn set_if_clear_reports_first_setter_only() {
        let bs = AtomicBitset::new(64);
        assert!(bs.set_if_clear(3));
        assert!(!bs.set_if_clear(3));
    }

    #[test]
    fn find_and_set_free_bit_claims_distinct_bits() {
        let bs = AtomicBitset::new(128);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..128 {
            let bit = bs.find_and_set_free_bit(0).expect("bitset should not be exhausted");
            assert!(seen.insert(bit), "bit {} claimed twice", bit);
        }
        assert!(bs.find_and_set_free_bit(0).is_none());
    }
}
