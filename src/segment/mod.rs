//! Segment naming, storage format selection, and segment-directory
//! enumeration shared by the flat and B+-tree segment implementations.

pub mod bsst;
pub mod sorted;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::buffer_pool::{self, BufferPool};
use crate::error::Result;
use crate::page;

/// On-disk storage layout a database instance is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Flat sequence of sorted pages, searched by binary search.
    Sorted,
    /// Static B+-tree shaped file, searched by top-down descent.
    Bsst,
    /// Leveled arrangement of BSST segments with compaction.
    Lsm,
}

const SORTED_PREFIX: &str = "SST_";
const BSST_PREFIX: &str = "BSST_";

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Produces a strictly increasing timestamp on every call, even across
/// calls that land within the same clock tick, so that
/// `sort_ascending(names) == order_of_creation(names)` always holds (the
/// invariant the Design Notes require of segment naming).
fn next_timestamp() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().expect("system clock out of range");

    loop {
        let prev = LAST_TIMESTAMP.load(Ordering::SeqCst);
        let next = if now > prev { now } else { prev + 1 };
        if LAST_TIMESTAMP
            .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return next;
        }
    }
}

/// Generates a fresh, monotonically ordered segment file name for the given
/// format (SortedSegment names get `SST_`, BSSTSegment/LSM names get
/// `BSST_`, both end in `.bin`).
pub fn new_segment_name(format: Format) -> String {
    let prefix = match format {
        Format::Sorted => SORTED_PREFIX,
        Format::Bsst | Format::Lsm => BSST_PREFIX,
    };
    format!("{prefix}{:020}.bin", next_timestamp())
}

/// Lists every `.bin` segment file in `dir`, sorted ascending by name (which
/// is also age order: oldest first, newest last).
pub fn list_segments(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".bin") {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Whether `name` is a BSSTSegment (as opposed to a flat SortedSegment).
pub fn is_bsst(name: &str) -> bool {
    name.starts_with(BSST_PREFIX)
}

/// Reads one page at `offset` of `file` (named `segment_name`), consulting
/// and populating `pool` if one is supplied. Shared by both segment reader
/// implementations so the buffer pool's behavior is identical for either
/// storage format.
pub(crate) fn read_page_cached(
    file: &fs::File,
    segment_name: &str,
    offset: u64,
    pool: Option<&mut BufferPool>,
) -> Result<Vec<(i64, i64)>> {
    match pool {
        Some(pool) => {
            let id = buffer_pool::page_id(segment_name, offset);
            if let Some(cached) = pool.lookup(&id) {
                return Ok(cached);
            }
            let entries = page::read_page_at(file, offset)?;
            pool.insert(id, entries.clone());
            Ok(entries)
        }
        None => Ok(page::read_page_at(file, offset)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_strictly_increasing() {
        let a = new_segment_name(Format::Bsst);
        let b = new_segment_name(Format::Bsst);
        assert!(a < b, "{a} should sort before {b}");
    }

    #[test]
    fn prefixes_match_format() {
        assert!(new_segment_name(Format::Sorted).starts_with("SST_"));
        assert!(new_segment_name(Format::Bsst).starts_with("BSST_"));
        assert!(new_segment_name(Format::Lsm).starts_with("BSST_"));
    }
}
