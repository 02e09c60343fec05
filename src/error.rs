//! Error taxonomy for the storage engine.
//!
//! The engine distinguishes ordinary logical conditions (a missing key, an
//! empty scan) from fatal ones (I/O failure, on-disk corruption). Logical
//! conditions never appear as an `Err`: `get` encodes "not found" as the
//! `-1` sentinel and `scan` as an empty vector. Only [`Error`] variants
//! below can abort an operation.

use thiserror::Error as ThisError;

/// Errors that can abort a database operation.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A caller-supplied argument violates a precondition: `key < 1` in
    /// `get`/`put`/`delete`/`update`, or a bloom filter built with
    /// `n <= 0` or `bpe <= 0`.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Used internally by segment point-lookup helpers to signal "this
    /// segment does not have the key"; never escapes the public API.
    #[error("not found")]
    NotFound,

    /// A file operation (open, read, write, unlink) failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk state violates an invariant: a short read, an out-of-range
    /// bloom filter index, a negative offset, or other structural damage.
    #[error("corruption: {0}")]
    Corruption(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
