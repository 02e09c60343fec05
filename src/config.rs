//! Database construction parameters, generalizing the teacher's
//! `SizeUnit`/`with_capacity_and_rate` constructor chain.

use crate::constants::DEFAULT_BITS_PER_ENTRY;
use crate::segment::Format;

/// Memtable capacity, buffer pool capacity, bloom filter sizing, and
/// storage format for a [`crate::database::Database`].
#[derive(Debug, Clone, Copy)]
pub struct DatabaseConfig {
    /// Maximum entries held in the memtable before a flush is triggered.
    pub memtable_capacity: usize,
    /// Maximum pages cached by the buffer pool.
    pub buffer_pool_capacity: usize,
    /// Bits per entry used when sizing bloom filters for new BSSTSegments.
    pub bits_per_entry: i64,
    /// On-disk storage layout.
    pub format: Format,
}

impl DatabaseConfig {
    pub fn new(memtable_capacity: usize, buffer_pool_capacity: usize, format: Format) -> Self {
        Self {
            memtable_capacity,
            buffer_pool_capacity,
            bits_per_entry: DEFAULT_BITS_PER_ENTRY,
            format,
        }
    }

    /// Overrides the default bloom filter bits-per-entry.
    pub fn with_bits_per_entry(mut self, bits_per_entry: i64) -> Self {
        self.bits_per_entry = bits_per_entry;
        self
    }
}
