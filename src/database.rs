//! `Database`: the coordinator that owns the memtable, buffer pool, segment
//! directory and (for LSM) level map, and routes `put`/`get`/`scan`/`delete`/
//! `update`/`close` across them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::buffer_pool::BufferPool;
use crate::compaction::{self, LevelMap};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::segment::bsst::BsstSegmentReader;
use crate::segment::sorted::SortedSegmentReader;
use crate::segment::{self, Format};

/// An open key-value database rooted at a directory on disk.
pub struct Database {
    dir: PathBuf,
    format: Format,
    bits_per_entry: i64,
    memtable: MemTable,
    buffer_pool: BufferPool,
    /// Every on-disk segment, oldest first, regardless of format. This is
    /// the list consulted by `get`/`scan` uniformly; `levels` below is
    /// compaction bookkeeping only and never consulted for reads.
    segments: Vec<String>,
    levels: LevelMap,
}

impl Database {
    /// Opens (creating if necessary) the database rooted at `dir`. In LSM
    /// mode, an existing `lsm_tree_state.txt` is loaded and removed.
    pub fn open(dir: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let levels = if config.format == Format::Lsm {
            compaction::load_level_map(&dir)?
        } else {
            LevelMap::new()
        };
        let segments = segment::list_segments(&dir)?;

        log::debug!(
            "opened database at {} with {} existing segment(s)",
            dir.display(),
            segments.len()
        );

        Ok(Self {
            dir,
            format: config.format,
            bits_per_entry: config.bits_per_entry,
            memtable: MemTable::new(config.memtable_capacity),
            buffer_pool: BufferPool::new(config.buffer_pool_capacity),
            segments,
            levels,
        })
    }

    /// Convenience constructor for `Format::Sorted`.
    pub fn open_sorted(dir: impl AsRef<Path>, memtable_capacity: usize, buffer_pool_capacity: usize) -> Result<Self> {
        Self::open(dir, DatabaseConfig::new(memtable_capacity, buffer_pool_capacity, Format::Sorted))
    }

    /// Convenience constructor for `Format::Bsst`.
    pub fn open_bsst(dir: impl AsRef<Path>, memtable_capacity: usize, buffer_pool_capacity: usize) -> Result<Self> {
        Self::open(dir, DatabaseConfig::new(memtable_capacity, buffer_pool_capacity, Format::Bsst))
    }

    /// Convenience constructor for `Format::Lsm`.
    pub fn open_lsm(dir: impl AsRef<Path>, memtable_capacity: usize, buffer_pool_capacity: usize) -> Result<Self> {
        Self::open(dir, DatabaseConfig::new(memtable_capacity, buffer_pool_capacity, Format::Lsm))
    }

    /// Inserts or overwrites `key` with `value`. Rejects `key == 0`, which is
    /// reserved as page padding and must never appear as a user key.
    pub fn put(&mut self, key: i64, value: i64) -> Result<()> {
        self.reject_reserved_key(key)?;

        self.memtable.put(key, value);
        if self.memtable.is_full() {
            self.flush_memtable()?;
            if self.format == Format::Lsm {
                compaction::compact_fixed_point(&mut self.levels, &self.dir, self.bits_per_entry, &mut self.buffer_pool)?;
                self.segments = segment::list_segments(&self.dir)?;
            }
        }
        Ok(())
    }

    /// Equivalent to `put(key, 0)`.
    pub fn delete(&mut self, key: i64) -> Result<()> {
        self.put(key, 0)
    }

    /// Equivalent to `put(key, value)`.
    pub fn update(&mut self, key: i64, value: i64) -> Result<()> {
        self.put(key, value)
    }

    /// Looks up `key`. `key < 1` and genuinely absent keys both yield the
    /// `-1` not-found sentinel, never an error, per the public API contract.
    pub fn get(&mut self, key: i64) -> Result<i64> {
        if key < 1 {
            return Ok(-1);
        }

        if let Some(value) = self.memtable.get(key) {
            return Ok(if value == 0 { -1 } else { value });
        }

        let dir = self.dir.clone();
        for name in self.segments.iter().rev() {
            let path = dir.join(name);
            let found = if segment::is_bsst(name) {
                let reader = BsstSegmentReader::open(&path, name.clone())?;
                if self.format == Format::Lsm {
                    reader.get_with_bloom(key, Some(&mut self.buffer_pool))?
                } else {
                    reader.get(key, Some(&mut self.buffer_pool))?
                }
            } else {
                let reader = SortedSegmentReader::open(&path, name.clone())?;
                reader.get(key, Some(&mut self.buffer_pool))?
            };

            if let Some(value) = found {
                return Ok(if value == 0 { -1 } else { value });
            }
        }

        Ok(-1)
    }

    /// Returns every live `(key, value)` with `lo <= key <= hi`, ascending by
    /// key. Empty if `lo >= hi`. The most recent write per key wins: the
    /// memtable is consulted first, then segments newest to oldest, with the
    /// first value seen for a key surviving; tombstones are dropped last.
    pub fn scan(&mut self, lo: i64, hi: i64) -> Result<Vec<(i64, i64)>> {
        if lo >= hi {
            return Ok(Vec::new());
        }

        let mut merged: BTreeMap<i64, i64> = BTreeMap::new();
        for (k, v) in self.memtable.scan(lo, hi) {
            merged.entry(k).or_insert(v);
        }

        let dir = self.dir.clone();
        for name in self.segments.clone().iter().rev() {
            let path = dir.join(name);
            let entries = if segment::is_bsst(name) {
                let reader = BsstSegmentReader::open(&path, name.clone())?;
                reader.scan(lo, hi, Some(&mut self.buffer_pool))?
            } else {
                let reader = SortedSegmentReader::open(&path, name.clone())?;
                reader.scan(lo, hi, Some(&mut self.buffer_pool))?
            };
            for (k, v) in entries {
                merged.entry(k).or_insert(v);
            }
        }

        Ok(merged.into_iter().filter(|(_, v)| *v != 0).collect())
    }

    /// Flushes a non-empty memtable, then in LSM mode runs compaction to a
    /// fixed point and persists the level map to `lsm_tree_state.txt`.
    pub fn close(&mut self) -> Result<()> {
        if !self.memtable.is_empty() {
            self.flush_memtable()?;
            if self.format == Format::Lsm {
                compaction::compact_fixed_point(&mut self.levels, &self.dir, self.bits_per_entry, &mut self.buffer_pool)?;
                self.segments = segment::list_segments(&self.dir)?;
            }
        }

        if self.format == Format::Lsm {
            compaction::save_level_map(&self.dir, &self.levels)?;
        }

        Ok(())
    }

    /// Disables (or re-enables) the buffer pool; while disabled, reads
    /// bypass the cache entirely rather than populating or consulting it.
    pub fn set_bufferpool_enabled(&mut self, enabled: bool) {
        self.buffer_pool.set_enabled(enabled);
    }

    fn reject_reserved_key(&self, key: i64) -> Result<()> {
        if key == 0 {
            return Err(crate::error::Error::InvalidArgument(
                "key 0 is reserved for page padding and cannot be used as a user key".to_string(),
            ));
        }
        Ok(())
    }

    /// Drains the memtable and writes it as a new segment in the configured
    /// format, then re-derives the segment directory from disk. In LSM mode
    /// the new segment is additionally recorded at level 1; the caller is
    /// responsible for running compaction afterward.
    fn flush_memtable(&mut self) -> Result<()> {
        let entries = self.memtable.drain_sorted();
        if entries.is_empty() {
            return Ok(());
        }

        let name = segment::new_segment_name(self.format);
        let path = self.dir.join(&name);

        match self.format {
            Format::Sorted => segment::sorted::write(&path, &entries)?,
            Format::Bsst | Format::Lsm => segment::bsst::write(&path, &entries, self.bits_per_entry)?,
        }

        log::debug!("flushed {} entries to {name}", entries.len());

        if self.format == Format::Lsm {
            compaction::append_to_level_one(&mut self.levels, name);
        }

        self.segments = segment::list_segments(&self.dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn s1_avl_and_flush() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();

        for (k, v) in [(3, 3), (4, 4), (6, 6), (8, 8), (12, 12), (13, 13), (12, 44), (16, 16), (17, 17), (21, 21)] {
            db.put(k, v).unwrap();
        }

        assert_eq!(db.get(12).unwrap(), 44);
        assert_eq!(db.get(4).unwrap(), 4);
        assert_eq!(db.get(21).unwrap(), 21);
        assert_eq!(
            db.scan(5, 16).unwrap(),
            vec![(6, 6), (8, 8), (12, 44), (13, 13), (16, 16)]
        );
    }

    #[test]
    fn s3_tombstones_survive_flush() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_bsst(dir.path(), 65536, 64).unwrap();

        for i in 1..=65536i64 {
            db.put(i, 10).unwrap();
        }
        for i in 1..=65536i64 {
            db.delete(i).unwrap();
        }
        for i in [1i64, 100, 32768, 65536] {
            assert_eq!(db.get(i).unwrap(), -1);
        }
    }

    #[test]
    fn s4_scan_merges_memtable_and_segments() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();

        for (k, v) in [(3, 3), (4, 4), (6, 6), (8, 8), (12, 12), (13, 13), (12, 44), (16, 16), (17, 17), (21, 21)] {
            db.put(k, v).unwrap();
        }
        db.put(78, 78).unwrap();
        db.put(29, 29).unwrap();
        db.put(4, 4).unwrap();

        assert_eq!(
            db.scan(20, 100).unwrap(),
            vec![(21, 21), (29, 29), (78, 78)]
        );
    }

    #[test]
    fn s5_lsm_compaction_merges_to_one_segment() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_lsm(dir.path(), 5, 32).unwrap();

        for (k, v) in [(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)] {
            db.put(k, v).unwrap();
        }
        for (k, v) in [(2, 2), (4, 4), (6, 6), (8, 8), (10, 10)] {
            db.put(k, v).unwrap();
        }

        let files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().unwrap().ends_with(".bin"))
            .collect();
        assert_eq!(files.len(), 1);

        assert_eq!(db.get(4).unwrap(), 4);
        assert_eq!(db.get(9).unwrap(), 9);
        assert_eq!(
            db.scan(1, 5).unwrap(),
            vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]
        );
    }

    #[test]
    fn rejects_key_zero() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();
        assert!(db.put(0, 1).is_err());
    }

    #[test]
    fn get_below_one_is_not_found_without_error() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();
        assert_eq!(db.get(-5).unwrap(), -1);
    }

    #[test]
    fn close_persists_lsm_state_and_reopen_recovers_levels() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_lsm(dir.path(), 5, 32).unwrap();
        for (k, v) in [(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)] {
            db.put(k, v).unwrap();
        }
        db.put(11, 11).unwrap();
        db.close().unwrap();

        let mut reopened = Database::open_lsm(dir.path(), 5, 32).unwrap();
        assert_eq!(reopened.get(1).unwrap(), 1);
        assert_eq!(reopened.get(11).unwrap(), 11);
    }
}
