//! Fixed layout constants shared by every module that touches disk pages.

/// Size in bytes of one page: the unit of I/O and of buffer-pool caching.
pub const PAGE_SIZE: usize = 4096;

/// Size in bytes of one entry: an 8-byte key followed by an 8-byte value.
pub const ENTRY_SIZE: usize = 16;

/// Maximum number of entries packed into one page.
pub const PAGE_NUM_ENTRIES: usize = PAGE_SIZE / ENTRY_SIZE;

/// Fixed seed used by the buffer pool's hash table (not the bloom filter,
/// whose seeds are drawn at random per segment).
pub const BUFFER_POOL_HASH_SEED: u32 = 1;

/// Default bits-per-entry for bloom filters when a caller doesn't specify one.
pub const DEFAULT_BITS_PER_ENTRY: i64 = 10;

/// Filename of the LSM level map snapshot written on close and consumed on open.
pub const LSM_STATE_FILE_NAME: &str = "lsm_tree_state.txt";
