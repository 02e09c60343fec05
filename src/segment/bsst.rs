//! `BSSTSegment`: a static B+-tree-shaped segment file with an embedded
//! bloom filter, built bottom-up and serialized breadth-first.
//!
//! Construction follows the Design Notes' "polymorphic tree nodes" guidance:
//! nodes are a tagged variant (`NodeKind::Leaf` / `NodeKind::Internal`)
//! owned by one construction-scoped arena (a `Vec<TreeNode>`), never raw
//! pointers. The tree is discarded once the segment file is written.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::bloom::BloomFilter;
use crate::buffer_pool::BufferPool;
use crate::constants::{PAGE_NUM_ENTRIES, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::page;

enum NodeKind {
    Leaf(Vec<(i64, i64)>),
    Internal(Vec<usize>),
}

struct TreeNode {
    kind: NodeKind,
    max_key: i64,
}

/// Splits `n` items across `num_parents` groups as evenly as possible: the
/// first `n % num_parents` groups get one extra item. Mirrors the original
/// engine's bottom-up distribution exactly (`base + 1` for the first
/// `extra` parents, `base` for the rest).
fn distribute(n: usize, num_parents: usize) -> Vec<usize> {
    let base = n / num_parents;
    let extra = n % num_parents;
    (0..num_parents)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

fn build_tree(entries: &[(i64, i64)]) -> Result<(Vec<TreeNode>, usize)> {
    if entries.is_empty() {
        return Err(Error::InvalidArgument(
            "cannot build a BSSTSegment from zero entries".to_string(),
        ));
    }

    let mut arena: Vec<TreeNode> = Vec::new();
    let mut level: Vec<usize> = Vec::new();

    for chunk in entries.chunks(PAGE_NUM_ENTRIES) {
        let max_key = chunk.last().unwrap().0;
        let idx = arena.len();
        arena.push(TreeNode {
            kind: NodeKind::Leaf(chunk.to_vec()),
            max_key,
        });
        level.push(idx);
    }

    while level.len() > 1 {
        let num_parents = level.len().div_ceil(PAGE_NUM_ENTRIES);
        let sizes = distribute(level.len(), num_parents);

        let mut next_level = Vec::with_capacity(num_parents);
        let mut pos = 0;
        for size in sizes {
            let children: Vec<usize> = level[pos..pos + size].to_vec();
            let max_key = arena[*children.last().unwrap()].max_key;
            let idx = arena.len();
            arena.push(TreeNode {
                kind: NodeKind::Internal(children),
                max_key,
            });
            next_level.push(idx);
            pos += size;
        }
        level = next_level;
    }

    Ok((arena, level[0]))
}

/// Breadth-first node order starting at `root`: this is also the page
/// visitation order used during serialization, so a node's position in this
/// vector plus one *is* its page number.
fn bfs_order(arena: &[TreeNode], root: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(arena.len());
    let mut queue = VecDeque::new();
    queue.push_back(root);
    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        if let NodeKind::Internal(children) = &arena[idx].kind {
            for &c in children {
                queue.push_back(c);
            }
        }
    }
    order
}

fn pad_len(written: usize) -> usize {
    let rem = written % PAGE_SIZE;
    if rem == 0 {
        0
    } else {
        PAGE_SIZE - rem
    }
}

/// Writes `entries` (sorted ascending by key, non-empty) as a BSSTSegment at
/// `path`, with a bloom filter sized at `bits_per_entry` bits per entry.
pub fn write(path: &Path, entries: &[(i64, i64)], bits_per_entry: i64) -> Result<()> {
    let (arena, root) = build_tree(entries)?;
    let order = bfs_order(&arena, root);

    let mut page_of = vec![0u64; arena.len()];
    for (i, &idx) in order.iter().enumerate() {
        page_of[idx] = (i as u64) + 1;
    }

    let mut file = File::create(path)?;
    file.write_all(&[0u8; PAGE_SIZE])?;
    let mut total_bytes: u64 = PAGE_SIZE as u64;

    let mut entries_offset = 0u64;
    let mut entries_offset_set = false;

    for &idx in &order {
        let page_bytes = match &arena[idx].kind {
            NodeKind::Leaf(es) => {
                if !entries_offset_set {
                    entries_offset = total_bytes;
                    entries_offset_set = true;
                }
                page::pack_page(es)
            }
            NodeKind::Internal(children) => {
                let node_entries: Vec<(i64, i64)> = children
                    .iter()
                    .map(|&c| (arena[c].max_key, (page_of[c] * PAGE_SIZE as u64) as i64))
                    .collect();
                page::pack_page(&node_entries)
            }
        };
        file.write_all(&page_bytes)?;
        total_bytes += PAGE_SIZE as u64;
    }

    let filter_offset = total_bytes;
    let mut bloom = BloomFilter::new(entries.len() as i64, bits_per_entry)?;
    for (key, _) in entries {
        bloom.insert(*key);
    }

    let filter_words = bloom.words().to_vec();
    let filter_bytes: Vec<u8> = filter_words.iter().flat_map(|w| w.to_le_bytes()).collect();
    file.write_all(&filter_bytes)?;
    total_bytes += filter_bytes.len() as u64;
    let pad = pad_len(filter_bytes.len());
    if pad > 0 {
        file.write_all(&vec![0u8; pad])?;
        total_bytes += pad as u64;
    }

    let seeds_offset = total_bytes;
    let seeds = bloom.seeds_as_i64();
    let seeds_bytes: Vec<u8> = seeds.iter().flat_map(|s| s.to_le_bytes()).collect();
    file.write_all(&seeds_bytes)?;
    total_bytes += seeds_bytes.len() as u64;
    let pad = pad_len(seeds_bytes.len());
    if pad > 0 {
        file.write_all(&vec![0u8; pad])?;
        total_bytes += pad as u64;
    }

    let file_size = total_bytes;

    let metadata_fields: [i64; 8] = [
        entries_offset as i64,
        filter_offset as i64,
        seeds_offset as i64,
        bits_per_entry,
        entries.len() as i64,
        filter_words.len() as i64,
        seeds.len() as i64,
        file_size as i64,
    ];

    let mut meta_page = vec![0u8; PAGE_SIZE];
    for (i, v) in metadata_fields.iter().enumerate() {
        meta_page[i * 8..i * 8 + 8].copy_from_slice(&v.to_le_bytes());
    }
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&meta_page)?;

    Ok(())
}

/// The eight fields of a BSSTSegment's page-0 metadata, decoded by
/// reinterpreting the page's first four `(i64, i64)` entries pairwise.
#[derive(Debug, Clone, Copy)]
pub struct BsstMetadata {
    pub entries_offset: u64,
    pub filter_offset: u64,
    pub seeds_offset: u64,
    pub bits_per_entry: i64,
    pub num_entries: i64,
    pub filter_length: i64,
    pub num_seeds: i64,
    pub file_size: u64,
}

impl BsstMetadata {
    fn from_page0(entries: &[(i64, i64)]) -> Result<Self> {
        if entries.len() < 4 {
            return Err(Error::Corruption("page 0 too short to hold metadata".to_string()));
        }
        let metadata = Self {
            entries_offset: entries[0].0 as u64,
            filter_offset: entries[0].1 as u64,
            seeds_offset: entries[1].0 as u64,
            bits_per_entry: entries[1].1,
            num_entries: entries[2].0,
            filter_length: entries[2].1,
            num_seeds: entries[3].0,
            file_size: entries[3].1 as u64,
        };

        if metadata.entries_offset % PAGE_SIZE as u64 != 0
            || metadata.filter_offset % PAGE_SIZE as u64 != 0
            || metadata.seeds_offset % PAGE_SIZE as u64 != 0
            || metadata.file_size % PAGE_SIZE as u64 != 0
        {
            return Err(Error::Corruption(
                "BSSTSegment metadata offsets are not page-aligned".to_string(),
            ));
        }
        if !(metadata.entries_offset < metadata.filter_offset
            && metadata.filter_offset <= metadata.seeds_offset
            && metadata.seeds_offset <= metadata.file_size)
        {
            return Err(Error::Corruption(
                "BSSTSegment metadata offsets are out of order".to_string(),
            ));
        }

        Ok(metadata)
    }
}

/// A read handle onto an on-disk BSSTSegment.
pub struct BsstSegmentReader {
    file: File,
    name: String,
    metadata: BsstMetadata,
}

impl BsstSegmentReader {
    pub fn open(path: &Path, name: String) -> Result<Self> {
        let file = File::open(path)?;
        let actual_len = file.metadata()?.len();
        let page0 = page::read_page_at(&file, 0)?;
        let metadata = BsstMetadata::from_page0(&page0)?;

        if metadata.file_size != actual_len {
            return Err(Error::Corruption(format!(
                "{name}: metadata file_size {} does not match actual length {actual_len}",
                metadata.file_size
            )));
        }

        Ok(Self {
            file,
            name,
            metadata,
        })
    }

    pub fn metadata(&self) -> &BsstMetadata {
        &self.metadata
    }

    fn read_page(&self, offset: u64, pool: Option<&mut BufferPool>) -> Result<Vec<(i64, i64)>> {
        super::read_page_cached(&self.file, &self.name, offset, pool)
    }

    /// Descends from the root (page 1, immediately after metadata) toward
    /// the leaf that would hold `target`, returning that leaf's byte offset.
    /// Returns `Err(Error::NotFound)` if no routing entry covers `target`
    /// (i.e. `target` exceeds every key in the tree).
    fn descend_to_leaf_offset(&self, target: i64, mut pool: Option<&mut BufferPool>) -> Result<u64> {
        let mut offset = PAGE_SIZE as u64;
        loop {
            let page = self.read_page(offset, pool.as_deref_mut())?;
            let live = page::live_entries(&page);

            if offset >= self.metadata.entries_offset {
                return Ok(offset);
            }

            match live.iter().position(|(k, _)| *k >= target) {
                Some(idx) => offset = live[idx].1 as u64,
                None => return Err(Error::NotFound),
            }
        }
    }

    /// Top-down descent point lookup (spec §4.4, BSSTSegment point lookup).
    pub fn get(&self, key: i64, mut pool: Option<&mut BufferPool>) -> Result<Option<i64>> {
        let leaf_offset = match self.descend_to_leaf_offset(key, pool.as_deref_mut()) {
            Ok(offset) => offset,
            Err(Error::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        let page = self.read_page(leaf_offset, pool)?;
        let live = page::live_entries(&page);
        Ok(live
            .binary_search_by_key(&key, |(k, _)| *k)
            .ok()
            .map(|idx| live[idx].1))
    }

    /// Reconstructs the bloom filter from the filter and seeds regions,
    /// reading exactly `filter_length` / `num_seeds` words from their
    /// recorded offsets (never relying on a zero-word sentinel, which a
    /// legitimate all-zero filter word would make ambiguous).
    pub fn load_bloom(&self) -> Result<BloomFilter> {
        let filter_len = (self.metadata.filter_length as usize) * 8;
        let filter_bytes = page::read_exact_at(&self.file, self.metadata.filter_offset, filter_len)?;
        let words: Vec<i64> = filter_bytes
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let seeds_len = (self.metadata.num_seeds as usize) * 8;
        let seeds_bytes = page::read_exact_at(&self.file, self.metadata.seeds_offset, seeds_len)?;
        let seeds: Vec<i64> = seeds_bytes
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let num_bits = (self.metadata.num_entries as usize) * (self.metadata.bits_per_entry as usize);
        Ok(BloomFilter::from_parts(words, num_bits, seeds))
    }

    /// Point lookup gated by the embedded bloom filter: on a filter miss,
    /// returns `Ok(None)` without descending the tree at all. Used in LSM
    /// mode, where most per-level probes are expected to miss.
    pub fn get_with_bloom(&self, key: i64, pool: Option<&mut BufferPool>) -> Result<Option<i64>> {
        let bloom = self.load_bloom()?;
        if !bloom.includes(key) {
            return Ok(None);
        }
        self.get(key, pool)
    }

    /// Scans `[lo, hi]`: descends to the leaf containing `lo`, then reads
    /// leaf pages forward until `hi` is exceeded or the leaf region ends
    /// (bounded by `filter_offset`, the real end of the leaf region — not
    /// `file_size`, which would walk into the filter/seeds bytes).
    pub fn scan(&self, lo: i64, hi: i64, mut pool: Option<&mut BufferPool>) -> Result<Vec<(i64, i64)>> {
        let mut result = Vec::new();

        let mut offset = match self.descend_to_leaf_offset(lo, pool.as_deref_mut()) {
            Ok(offset) => offset,
            Err(Error::NotFound) => return Ok(result),
            Err(e) => return Err(e),
        };

        while offset < self.metadata.filter_offset {
            let page = self.read_page(offset, pool.as_deref_mut())?;
            let live = page::live_entries(&page);

            let mut stop = false;
            for (k, v) in live {
                if *k > hi {
                    stop = true;
                    break;
                }
                if *k >= lo {
                    result.push((*k, *v));
                }
            }
            if stop {
                break;
            }
            offset += PAGE_SIZE as u64;
        }

        Ok(result)
    }

    /// All entries in the segment, in ascending key order, used by
    /// compaction's two-way merge.
    pub fn all_entries(&self) -> Result<Vec<(i64, i64)>> {
        let mut result = Vec::new();
        let mut offset = self.metadata.entries_offset;
        while offset < self.metadata.filter_offset {
            let page = self.read_page(offset, None)?;
            result.extend_from_slice(page::live_entries(&page));
            offset += PAGE_SIZE as u64;
        }
        Ok(result)
    }
}
