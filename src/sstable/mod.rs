//! # SSTable module
//!
//! An immutable, on-disk sorted run identified by a nonnegative integer
//! *generation*. Opened via [`memmap2::Mmap`] for zero-copy random
//! access and forward iteration.
//!
//! ## On-disk layout
//!
//! ```text
//! [ entry 0 ][ entry 1 ] ... [ entry rows-1 ]
//! [ offset 0 (u64 BE) ][ offset 1 (u64 BE) ] ... [ offset rows-1 (u64 BE) ]
//! [ rows (u32 BE) ]
//! ```
//!
//! Each entry is:
//!
//! ```text
//! u32  key_length
//! u8[] key_bytes
//! i64  timestamp_signed
//! if timestamp_signed > 0:   // live
//!     u32  value_length
//!     u8[] value_bytes
//! // if timestamp_signed < 0, the true timestamp is -timestamp_signed
//! // and no value bytes follow (tombstone)
//! ```
//!
//! All multi-byte integers are big-endian. Entries are stored in
//! strictly ascending key order, which is what makes binary search over
//! the offsets region correct.
//!
//! ## Sub-modules
//!
//! - [`builder`] — atomic `.tmp`-then-rename serialization.
//! - [`iterator`] — the forward cursor returned by [`SSTable::iterator`].

pub mod builder;
pub mod iterator;

#[cfg(test)]
mod tests;

pub use builder::build;
pub use iterator::SSTableIterator;

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use thiserror::Error;
use tracing::warn;

use crate::cell::Cell;
use crate::value::Value;

/// Size in bytes of the footer: a single `u32` row count.
pub(crate) const FOOTER_SIZE: usize = 4;
/// Size in bytes of one entry in the offsets region.
pub(crate) const OFFSET_SIZE: usize = 8;

/// Errors returned by [`SSTable`] operations.
#[derive(Debug, Error)]
pub enum SSTableError {
    /// Raised when mutation is attempted on an SSTable view — SSTables
    /// are immutable by construction.
    #[error("SSTable is immutable; mutation is not supported")]
    NotSupported,

    /// Unexpected failure of a read, write, rename, or directory listing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A per-file problem detected during open: bad file name, file
    /// too short to hold a footer, or a footer row count inconsistent
    /// with the file's size.
    #[error("malformed SSTable: {0}")]
    Malformed(String),
}

/// An immutable, memory-mapped, on-disk sorted run.
///
/// Entries are accessed by binary search over the offsets region
/// (see [`SSTable::lower_bound`]) or scanned forward from a starting
/// point with [`SSTable::iterator`]. [`SSTable::upsert`] and
/// [`SSTable::remove`] exist only to satisfy a uniform read/write
/// surface alongside [`crate::memtable::MemTable`]; both always
/// return [`SSTableError::NotSupported`] since an on-disk run is
/// never mutated in place.
pub struct SSTable {
    generation: u64,
    file: Option<File>,
    mmap: Option<Mmap>,
    rows: u32,
}

impl SSTable {
    /// Opens the SSTable at `path`, identified by `generation`.
    ///
    /// Validates that the file is large enough to hold a footer and
    /// that the footer's row count is consistent with the file's size;
    /// either condition failing yields [`SSTableError::Malformed`].
    pub fn open(path: impl AsRef<Path>, generation: u64) -> Result<Self, SSTableError> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < FOOTER_SIZE {
            return Err(SSTableError::Malformed(format!(
                "{}: file too small to hold a footer ({} bytes)",
                path.as_ref().display(),
                mmap.len()
            )));
        }

        let rows = u32::from_be_bytes(mmap[mmap.len() - FOOTER_SIZE..].try_into().unwrap());
        let offsets_region_size = rows as usize * OFFSET_SIZE;
        if mmap.len() < FOOTER_SIZE + offsets_region_size {
            return Err(SSTableError::Malformed(format!(
                "{}: footer row count {} inconsistent with file size {}",
                path.as_ref().display(),
                rows,
                mmap.len()
            )));
        }

        Ok(Self {
            generation,
            file: Some(file),
            mmap: Some(mmap),
            rows,
        })
    }

    /// The generation identifying this SSTable.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The number of entries stored in this SSTable.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    fn mmap(&self) -> Result<&Mmap, SSTableError> {
        self.mmap
            .as_ref()
            .ok_or_else(|| SSTableError::Malformed("SSTable was closed".to_string()))
    }

    /// Absolute file offset at which row `i` starts.
    fn offset_of(&self, i: u32) -> Result<u64, SSTableError> {
        let mmap = self.mmap()?;
        let pos = mmap.len() - FOOTER_SIZE - OFFSET_SIZE * (self.rows as usize - i as usize);
        let bytes: [u8; 8] = mmap[pos..pos + OFFSET_SIZE]
            .try_into()
            .map_err(|_| SSTableError::Malformed("truncated offsets region".to_string()))?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Reads only the key of row `i`, without decoding its value — the
    /// cheap path used by [`lower_bound`](Self::lower_bound).
    fn key_at(&self, i: u32) -> Result<&[u8], SSTableError> {
        let mmap = self.mmap()?;
        let start = self.offset_of(i)? as usize;
        let key_len = read_u32(mmap, start)? as usize;
        let key_start = start + 4;
        mmap.get(key_start..key_start + key_len)
            .ok_or_else(|| SSTableError::Malformed(format!("row {i}: truncated key")))
    }

    /// Decodes the full entry at row `i` into a [`Cell`].
    fn cell_at(&self, i: u32) -> Result<Cell, SSTableError> {
        let mmap = self.mmap()?;
        let start = self.offset_of(i)? as usize;

        let key_len = read_u32(mmap, start)? as usize;
        let key_start = start + 4;
        let key = mmap
            .get(key_start..key_start + key_len)
            .ok_or_else(|| SSTableError::Malformed(format!("row {i}: truncated key")))?
            .to_vec();

        let ts_start = key_start + key_len;
        let ts_signed = read_i64(mmap, ts_start)?;

        let value = match ts_signed.cmp(&0) {
            std::cmp::Ordering::Greater => {
                let value_len_start = ts_start + 8;
                let value_len = read_u32(mmap, value_len_start)? as usize;
                let value_start = value_len_start + 4;
                let payload = mmap
                    .get(value_start..value_start + value_len)
                    .ok_or_else(|| SSTableError::Malformed(format!("row {i}: truncated value")))?
                    .to_vec();
                Value::live(ts_signed as u64, payload)
            }
            std::cmp::Ordering::Less => Value::tombstone((-ts_signed) as u64),
            std::cmp::Ordering::Equal => {
                return Err(SSTableError::Malformed(format!(
                    "row {i}: timestamp must be nonzero"
                )));
            }
        };

        Ok(Cell::new(key, value))
    }

    /// Binary search for the lower bound of `from`: on an exact match,
    /// returns that row's index; otherwise returns the index of the
    /// first row whose key is strictly greater than `from`, or
    /// [`rows`](Self::rows) if every key is smaller.
    pub fn lower_bound(&self, from: &[u8]) -> Result<u32, SSTableError> {
        let mut lo: u32 = 0;
        let mut hi: u32 = self.rows;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_key = self.key_at(mid)?;
            if mid_key < from {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// A forward cursor over entries starting at the binary-search
    /// result for `from` and advancing sequentially to [`rows`](Self::rows).
    pub fn iterator(&self, from: &[u8]) -> Result<SSTableIterator<'_>, SSTableError> {
        let start = self.lower_bound(from)?;
        Ok(SSTableIterator::new(self, start))
    }

    /// Releases the mapped memory and the underlying file handle.
    ///
    /// This is the only release path: dropping an `SSTable` without
    /// calling `close` still frees these resources, but callers relying
    /// on deterministic release timing (matching other handles owned
    /// by [`crate::engine::LsmDao`]) should call this explicitly.
    pub fn close(&mut self) -> Result<(), SSTableError> {
        self.mmap = None;
        self.file = None;
        Ok(())
    }

    /// Always fails: an SSTable is an immutable on-disk run, so
    /// mutation belongs on the memtable instead.
    pub fn upsert(&mut self, _key: Vec<u8>, _payload: Vec<u8>) -> Result<(), SSTableError> {
        Err(SSTableError::NotSupported)
    }

    /// Always fails: an SSTable is an immutable on-disk run, so
    /// mutation belongs on the memtable instead.
    pub fn remove(&mut self, _key: Vec<u8>) -> Result<(), SSTableError> {
        Err(SSTableError::NotSupported)
    }
}

fn read_u32(mmap: &[u8], at: usize) -> Result<u32, SSTableError> {
    let bytes: [u8; 4] = mmap
        .get(at..at + 4)
        .ok_or_else(|| SSTableError::Malformed("truncated length prefix".to_string()))?
        .try_into()
        .unwrap();
    Ok(u32::from_be_bytes(bytes))
}

fn read_i64(mmap: &[u8], at: usize) -> Result<i64, SSTableError> {
    let bytes: [u8; 8] = mmap
        .get(at..at + 8)
        .ok_or_else(|| SSTableError::Malformed("truncated timestamp".to_string()))?
        .try_into()
        .unwrap();
    Ok(i64::from_be_bytes(bytes))
}

/// Parses a file name matching `^(0|[1-9][0-9]*)\.dat$` into its
/// generation number. Returns `None` for any other name, including
/// `.tmp` files (stale writes from an interrupted flush) and anything
/// that isn't a plain nonnegative integer.
pub fn parse_generation(file_name: &str) -> Option<u64> {
    let digits = file_name.strip_suffix(".dat")?;
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Opens every recognized `{gen}.dat` file in `dir`, logging and
/// skipping any that are malformed or fail to open — per the spec this
/// must never fail the caller's `open`.
pub fn scan_directory(dir: impl AsRef<Path>) -> io::Result<Vec<SSTable>> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(generation) = parse_generation(file_name) else {
            continue;
        };
        match SSTable::open(entry.path(), generation) {
            Ok(table) => tables.push(table),
            Err(err) => {
                warn!(file = file_name, error = %err, "skipping unreadable SSTable on open");
            }
        }
    }
    Ok(tables)
}
