//! Page-granularity (de)serialization of entry buffers.
//!
//! Every page on disk, including the BSSTSegment metadata page, is fixed at
//! [`PAGE_SIZE`] bytes and, read back, a uniform sequence of `(i64, i64)`
//! pairs: `PAGE_NUM_ENTRIES` of them, zero-padded past the live entries.
//! This lets the metadata page reuse the same decode path as any other page
//! (`crate::segment::bsst` reinterprets the first four pairs as the eight
//! metadata fields), exactly as the original engine does.

use std::io::{self, Write};

use crate::constants::{ENTRY_SIZE, PAGE_NUM_ENTRIES, PAGE_SIZE};

/// Serializes up to [`PAGE_NUM_ENTRIES`] entries into one zero-padded,
/// page-sized buffer. Panics if `entries.len() > PAGE_NUM_ENTRIES` —
/// callers are responsible for pre-chunking.
pub fn pack_page(entries: &[(i64, i64)]) -> Vec<u8> {
    assert!(entries.len() <= PAGE_NUM_ENTRIES);

    let mut buf = vec![0u8; PAGE_SIZE];
    for (i, (k, v)) in entries.iter().enumerate() {
        let offset = i * ENTRY_SIZE;
        buf[offset..offset + 8].copy_from_slice(&k.to_le_bytes());
        buf[offset + 8..offset + 16].copy_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Writes a packed page to `writer`.
pub fn write_page<W: Write>(writer: &mut W, entries: &[(i64, i64)]) -> io::Result<()> {
    writer.write_all(&pack_page(entries))
}

/// Decodes a raw page-sized buffer into its full `(i64, i64)` entry vector,
/// `PAGE_NUM_ENTRIES` long, trailing zero pairs included. Callers that want
/// only the live prefix should use [`live_entries`].
pub fn unpack_page(buf: &[u8]) -> Vec<(i64, i64)> {
    assert_eq!(buf.len(), PAGE_SIZE);

    let mut entries = Vec::with_capacity(PAGE_NUM_ENTRIES);
    for i in 0..PAGE_NUM_ENTRIES {
        let offset = i * ENTRY_SIZE;
        let k = i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap());
        let v = i64::from_le_bytes(buf[offset + 8..offset + 16].try_into().unwrap());
        entries.push((k, v));
    }
    entries
}

/// Returns the live (non-padding) prefix of a decoded page: entries up to
/// but excluding the first `key == 0` pair, since `0` marks end-of-entries.
pub fn live_entries(entries: &[(i64, i64)]) -> &[(i64, i64)] {
    let end = entries.iter().position(|(k, _)| *k == 0).unwrap_or(entries.len());
    &entries[..end]
}

/// Reads one page at `offset` from `file` and decodes it.
pub fn read_page_at(file: &std::fs::File, offset: u64) -> io::Result<Vec<(i64, i64)>> {
    use std::os::unix::fs::FileExt;

    let mut buf = vec![0u8; PAGE_SIZE];
    file.read_exact_at(&mut buf, offset)?;
    Ok(unpack_page(&buf))
}

/// Reads an arbitrary byte region (used for the filter and seeds regions,
/// which are not page-structured internally).
pub fn read_exact_at(file: &std::fs::File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::os::unix::fs::FileExt;

    let mut buf = vec![0u8; len];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf)
}

/// A streaming page writer: buffers entries and flushes a full page to the
/// underlying writer whenever [`PAGE_NUM_ENTRIES`] accumulate, padding the
/// final partial page on [`finish`](PageWriter::finish).
pub struct PageWriter<W: Write> {
    writer: W,
    pending: Vec<(i64, i64)>,
    pages_written: u64,
}

impl<W: Write> PageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: Vec::with_capacity(PAGE_NUM_ENTRIES),
            pages_written: 0,
        }
    }

    /// Appends one entry, flushing a page if the buffer fills.
    pub fn push(&mut self, entry: (i64, i64)) -> io::Result<()> {
        self.pending.push(entry);
        if self.pending.len() == PAGE_NUM_ENTRIES {
            self.flush_page()?;
        }
        Ok(())
    }

    fn flush_page(&mut self) -> io::Result<()> {
        write_page(&mut self.writer, &self.pending)?;
        self.pending.clear();
        self.pages_written += 1;
        Ok(())
    }

    /// Flushes any partial trailing page (zero-padded) and returns the
    /// total number of pages written.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        if !self.pending.is_empty() {
            self.flush_page()?;
        }
        Ok((self.writer, self.pages_written))
    }
}
