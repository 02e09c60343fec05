//! # `intkv`
//!
//! `intkv` is an embedded, ordered key-value store over 64-bit signed
//! integer keys and values. Writes land in an in-memory [`memtable::MemTable`];
//! once it fills, its contents are flushed as an immutable, page-structured
//! [`segment`] file. Three on-disk layouts are supported: a flat
//! [`segment::sorted`] file searched by binary search, a static
//! [`segment::bsst`] B+-tree searched by top-down descent, and a leveled
//! log-structured arrangement of BSST segments with [`compaction`].
//!
//! ## Public API
//!
//! [`database::Database`] is the single entry point: `open`, `put`, `get`,
//! `delete`, `update`, `scan`, `close`, and `set_bufferpool_enabled`. It owns
//! the memtable, the [`buffer_pool::BufferPool`], the flat segment
//! directory consulted by every read regardless of format, and (in LSM mode)
//! the per-level segment map used only for compaction bookkeeping.
//!
//! ## On-disk format
//!
//! Every page is `4096` bytes holding up to `256` fixed `16`-byte
//! `(key, value)` entries, little-endian. `key == 0` is reserved padding;
//! `value == 0` marks a tombstone. See [`constants`] for the exact sizes and
//! [`page`] for the shared page codec both segment formats build on.
//!
//! ## What this crate does not do
//!
//! Single-threaded, no write-ahead log, no crash safety, no compression or
//! encryption, no secondary indexes or transactions. A crash before a clean
//! [`database::Database::close`] may lose the memtable; segments already on
//! disk are immutable and safe.

#![allow(dead_code)]

pub mod bloom;
pub mod buffer_pool;
pub mod compaction;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod memtable;
pub mod murmur3;
pub mod page;
pub mod segment;

pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{Error, Result};
pub use segment::Format;
