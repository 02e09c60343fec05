//! `SortedSegment`: a flat sequence of sorted, page-aligned leaf pages with
//! no header, searched by page-granularity binary search.

use std::fs::File;
use std::path::Path;

use crate::buffer_pool::BufferPool;
use crate::constants::PAGE_SIZE;
use crate::error::Result;
use crate::page::{self, PageWriter};

/// Writes `entries` (already sorted ascending by key) as a SortedSegment at
/// `path`, packing [`crate::constants::PAGE_NUM_ENTRIES`] per page and
/// zero-padding the final page.
pub fn write(path: &Path, entries: &[(i64, i64)]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = PageWriter::new(file);
    for entry in entries {
        writer.push(*entry)?;
    }
    writer.finish()?;
    Ok(())
}

/// A read handle onto an on-disk SortedSegment.
pub struct SortedSegmentReader {
    file: File,
    name: String,
    file_size: u64,
}

impl SortedSegmentReader {
    pub fn open(path: &Path, name: String) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            name,
            file_size,
        })
    }

    fn num_pages(&self) -> u64 {
        self.file_size / PAGE_SIZE as u64
    }

    fn read_page(&self, page_index: u64, pool: Option<&mut BufferPool>) -> Result<Vec<(i64, i64)>> {
        let offset = page_index * PAGE_SIZE as u64;
        super::read_page_cached(&self.file, &self.name, offset, pool)
    }

    /// Page-granularity binary search for `key`. Returns `Some(value)` if
    /// found (including tombstone `0` values — tombstone interpretation is
    /// the database coordinator's job), `None` if absent from this segment.
    pub fn get(&self, key: i64, mut pool: Option<&mut BufferPool>) -> Result<Option<i64>> {
        if self.num_pages() == 0 {
            return Ok(None);
        }

        let mut lo = 0i64;
        let mut hi = self.num_pages() as i64 - 1;

        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let page = self.read_page(mid as u64, pool.as_deref_mut())?;
            let live = page::live_entries(&page);

            if live.is_empty() {
                hi = mid - 1;
                continue;
            }

            match live.binary_search_by_key(&key, |(k, _)| *k) {
                Ok(idx) => return Ok(Some(live[idx].1)),
                Err(_) => {
                    let last_key = live.last().unwrap().0;
                    if key > last_key {
                        lo = mid + 1;
                    } else {
                        hi = mid - 1;
                    }
                }
            }
        }

        Ok(None)
    }

    /// Sequentially scans leaf pages for `lo <= key <= hi`, emitting entries
    /// ascending by key. Finds the starting page via the same descent as
    /// [`get`](Self::get), then reads forward until a key exceeds `hi` or
    /// the file ends.
    pub fn scan(&self, lo: i64, hi: i64, mut pool: Option<&mut BufferPool>) -> Result<Vec<(i64, i64)>> {
        let mut result = Vec::new();
        let num_pages = self.num_pages();
        if num_pages == 0 {
            return Ok(result);
        }

        let start_page = self.find_start_page(lo, pool.as_deref_mut())?;

        for page_index in start_page..num_pages {
            let page = self.read_page(page_index, pool.as_deref_mut())?;
            let live = page::live_entries(&page);
            let mut done = false;
            for (k, v) in live {
                if *k > hi {
                    done = true;
                    break;
                }
                if *k >= lo {
                    result.push((*k, *v));
                }
            }
            if done || live.len() < crate::constants::PAGE_NUM_ENTRIES {
                break;
            }
        }

        Ok(result)
    }

    /// Finds the first page that could contain `lo`: the last page whose
    /// first live key is `<= lo`, or page 0 if `lo` precedes everything.
    fn find_start_page(&self, lo: i64, mut pool: Option<&mut BufferPool>) -> Result<u64> {
        let num_pages = self.num_pages();
        let mut candidate = 0u64;

        let mut l = 0i64;
        let mut h = num_pages as i64 - 1;
        while l <= h {
            let mid = l + (h - l) / 2;
            let page = self.read_page(mid as u64, pool.as_deref_mut())?;
            let live = page::live_entries(&page);
            if live.is_empty() {
                h = mid - 1;
                continue;
            }
            if live[0].0 <= lo {
                candidate = mid as u64;
                l = mid + 1;
            } else {
                h = mid - 1;
            }
        }

        Ok(candidate)
    }
}
