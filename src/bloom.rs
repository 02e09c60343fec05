//! Bloom filter over 64-bit signed integer keys.
//!
//! Sized from `n` (expected entries) and `bpe` (bits per entry): the bit
//! array holds `m = n * bpe` bits, split across `k = ceil(ln(2) * bpe)`
//! independent hash functions, each a [`crate::murmur3`] digest seeded with
//! its own randomly drawn 32-bit seed. Bits are packed into `i64` words,
//! little-endian, bit 0 of word 0 first — this is the exact on-disk layout
//! of a BSSTSegment's filter region (`segment::bsst`).

use crate::error::{Error, Result};
use crate::murmur3::murmur3_x86_32_i64;
use rand::Rng;

const BITS_PER_WORD: usize = 64;

/// A bloom filter over `i64` keys with no false negatives.
pub struct BloomFilter {
    bits: Vec<i64>,
    num_bits: usize,
    seeds: Vec<u32>,
}

impl BloomFilter {
    /// Builds a fresh filter sized for `n` entries at `bpe` bits per entry,
    /// drawing `k` random seeds. Used on the flush/compaction write path.
    pub fn new(n: i64, bpe: i64) -> Result<Self> {
        if n <= 0 {
            return Err(Error::InvalidArgument(
                "bloom filter n must be > 0".to_string(),
            ));
        }
        if bpe <= 0 {
            return Err(Error::InvalidArgument(
                "bloom filter bpe must be > 0".to_string(),
            ));
        }

        let num_bits = (n as usize) * (bpe as usize);
        let num_hashes = ((2f64.ln() * bpe as f64).ceil() as usize).max(1);

        let mut rng = rand::thread_rng();
        let seeds: Vec<u32> = (0..num_hashes).map(|_| rng.gen::<u32>()).collect();

        let num_words = num_bits.div_ceil(BITS_PER_WORD);

        Ok(Self {
            bits: vec![0i64; num_words],
            num_bits,
            seeds,
        })
    }

    /// Reconstructs a filter from its on-disk representation: the packed
    /// bit words, the seeds (stored widened to `i64`, narrowed back here),
    /// and the bit-array length that was used to build it.
    pub fn from_parts(bits: Vec<i64>, num_bits: usize, seeds: Vec<i64>) -> Self {
        Self {
            bits,
            num_bits,
            seeds: seeds.into_iter().map(|s| s as u32).collect(),
        }
    }

    /// Inserts a key, setting its `k` bits.
    pub fn insert(&mut self, key: i64) {
        let seeds = self.seeds.clone();
        for seed in &seeds {
            let idx = self.bit_index(key, *seed);
            self.set_bit(idx);
        }
    }

    /// Tests whether `key` is possibly present. `false` means definitely
    /// absent; `true` means possibly present (subject to false positives).
    pub fn includes(&self, key: i64) -> bool {
        for seed in &self.seeds {
            let idx = self.bit_index(key, *seed);
            if !self.get_bit(idx) {
                return false;
            }
        }
        true
    }

    /// Number of hash functions (`k`).
    pub fn num_hashes(&self) -> usize {
        self.seeds.len()
    }

    /// Number of bits in the array (`m`).
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// The packed bit words, ready to be written to the filter region of a
    /// BSSTSegment.
    pub fn words(&self) -> &[i64] {
        &self.bits
    }

    /// The seeds, widened to `i64` for on-disk storage in the seeds region.
    pub fn seeds_as_i64(&self) -> Vec<i64> {
        self.seeds.iter().map(|s| *s as i64).collect()
    }

    fn bit_index(&self, key: i64, seed: u32) -> usize {
        let hash = murmur3_x86_32_i64(key, seed);
        (hash as usize) % self.num_bits.max(1)
    }

    fn set_bit(&mut self, idx: usize) {
        let word = idx / BITS_PER_WORD;
        let bit = idx % BITS_PER_WORD;
        self.bits[word] |= 1i64 << bit;
    }

    fn get_bit(&self, idx: usize) -> bool {
        let word = idx / BITS_PER_WORD;
        let bit = idx % BITS_PER_WORD;
        (self.bits[word] >> bit) & 1 == 1
    }
}
