//! # LsmDao — the top-level engine
//!
//! Routes writes into the [`MemTable`], triggers a flush to a new
//! [`SSTable`] generation once the buffer crosses
//! [`LsmDaoConfig::flush_threshold`], and merges the memtable with
//! every on-disk generation on read.
//!
//! ## Concurrency model
//!
//! Single-threaded, not internally synchronized: callers must
//! serialize operations on a given `LsmDao`. No locks are taken
//! anywhere in this module — that is a deliberate simplification over
//! heavier multi-writer engines, matching the single-writer contract
//! this engine commits to.
//!
//! ## Generations
//!
//! Every on-disk run is identified by a nonnegative integer
//! generation; `next_generation` is always strictly greater than the
//! largest generation present, except transiently during
//! [`LsmDao::compact`].

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{info, trace};

use crate::cell::Cell;
use crate::memtable::{Clock, MemTable, MemTableError};
use crate::merge::{self, CellSource};
use crate::record::Record;
use crate::sstable::{self, SSTable, SSTableError};

/// Errors surfaced at the `LsmDao` boundary, wrapping every
/// subsystem's error type.
#[derive(Debug, Error)]
pub enum LsmError {
    /// Error originating from the memtable subsystem.
    #[error("memtable error: {0}")]
    MemTable(#[from] MemTableError),

    /// Error originating from the SSTable subsystem.
    #[error("SSTable error: {0}")]
    SSTable(#[from] SSTableError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration passed to [`LsmDao::open`].
pub struct LsmDaoConfig {
    /// The memtable is flushed once its tracked `size_in_bytes`
    /// strictly exceeds this many bytes.
    pub flush_threshold: usize,
}

/// The embedded LSM key-value store.
pub struct LsmDao {
    storage_dir: PathBuf,
    flush_threshold: usize,
    memtable: MemTable,
    ss_tables: BTreeMap<u64, SSTable>,
    next_generation: u64,
    clock: Clock,
}

impl LsmDao {
    /// Opens the store rooted at `storage_dir`, recovering whatever
    /// SSTable generations are present.
    ///
    /// Scans `storage_dir` for files matching `^(0|[1-9][0-9]*)\.dat$`;
    /// malformed names or unreadable files are logged and skipped
    /// rather than failing the open (see [`sstable::scan_directory`]).
    /// `next_generation` is set to one past the largest generation
    /// found, or zero if none exist.
    pub fn open(storage_dir: impl AsRef<Path>, config: LsmDaoConfig) -> Result<Self, LsmError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        info!(
            path = %storage_dir.display(),
            flush_threshold = config.flush_threshold,
            "opening LsmDao"
        );

        let tables = sstable::scan_directory(&storage_dir)?;
        let mut ss_tables = BTreeMap::new();
        let mut max_generation: Option<u64> = None;
        for table in tables {
            let generation = table.generation();
            max_generation = Some(max_generation.map_or(generation, |m| m.max(generation)));
            ss_tables.insert(generation, table);
        }
        let next_generation = max_generation.map_or(0, |g| g + 1);

        let clock = default_clock();
        Ok(Self {
            storage_dir,
            flush_threshold: config.flush_threshold,
            memtable: MemTable::new(Arc::clone(&clock)),
            ss_tables,
            next_generation,
            clock,
        })
    }

    /// Opens the store using an injected clock, for deterministic tests.
    pub fn open_with_clock(
        storage_dir: impl AsRef<Path>,
        config: LsmDaoConfig,
        clock: Clock,
    ) -> Result<Self, LsmError> {
        let mut dao = Self::open(storage_dir, config)?;
        dao.clock = Arc::clone(&clock);
        dao.memtable = MemTable::new(clock);
        Ok(dao)
    }

    /// Inserts or replaces `key`'s payload, flushing if the memtable
    /// now exceeds the configured threshold.
    pub fn upsert(&mut self, key: Vec<u8>, payload: Vec<u8>) -> Result<(), LsmError> {
        trace!(key_len = key.len(), "upsert");
        self.memtable.upsert(key, payload)?;
        self.maybe_flush()
    }

    /// Installs a tombstone for `key`, flushing if the memtable now
    /// exceeds the configured threshold.
    pub fn remove(&mut self, key: Vec<u8>) -> Result<(), LsmError> {
        trace!(key_len = key.len(), "remove");
        self.memtable.remove(key)?;
        self.maybe_flush()
    }

    fn maybe_flush(&mut self) -> Result<(), LsmError> {
        if self.memtable.size_in_bytes() > self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Serializes the memtable to a new SSTable generation and
    /// replaces it with an empty one.
    ///
    /// The target is written to `{next_generation}.tmp` and published
    /// with a single atomic rename to `{next_generation}.dat` — no
    /// partial file is ever visible under the `.dat` suffix.
    pub fn flush(&mut self) -> Result<(), LsmError> {
        let cells: Vec<Cell> = self.memtable.iterator(b"").collect();
        let rows = cells.len() as u32;
        info!(generation = self.next_generation, rows, "flushing memtable");

        let final_path = self.storage_dir.join(format!("{}.dat", self.next_generation));
        sstable::build(&final_path, cells.into_iter(), rows)?;

        let table = SSTable::open(&final_path, self.next_generation)?;
        self.ss_tables.insert(self.next_generation, table);
        self.memtable = MemTable::new(Arc::clone(&self.clock));
        self.next_generation += 1;
        Ok(())
    }

    /// Returns a snapshot iterator over the current live view, starting
    /// at the first key greater than or equal to `from`.
    ///
    /// Internally this merges `memtable.iterator(from)` with every
    /// SSTable's `iterator(from)` in descending generation order,
    /// collapses duplicate keys to the freshest entry, drops
    /// tombstones, and yields the survivors as [`Record`]s. The
    /// snapshot is fixed at construction time; later writes on this
    /// `LsmDao` are not reflected in an iterator already in hand.
    pub fn iterator(&self, from: &[u8]) -> Result<LsmIterator<'_>, LsmError> {
        let mut sources: Vec<Box<dyn CellSource + '_>> = Vec::with_capacity(1 + self.ss_tables.len());
        sources.push(Box::new(self.memtable.iterator(from)));
        for table in self.ss_tables.values().rev() {
            sources.push(Box::new(table.iterator(from)?));
        }
        let records = merge::merge_to_records(sources)?;
        Ok(LsmIterator { inner: Box::new(records) })
    }

    /// Merges the memtable and every SSTable generation into a single
    /// new generation, then discards everything that merge replaces.
    ///
    /// Writes the full **merged-and-collapsed live view** — duplicate
    /// keys collapsed to the freshest entry, with tombstones dropped
    /// since nothing remains underneath this single resulting
    /// generation for them to still shadow. (A naive implementation
    /// that serializes only the memtable and discards the SSTables
    /// would silently lose any key that lived solely on disk; this
    /// engine never does that.)
    pub fn compact(&mut self) -> Result<(), LsmError> {
        info!(
            generations = self.ss_tables.len(),
            next_generation = self.next_generation,
            "compacting"
        );

        let memtable_cells: Vec<Cell> = self.memtable.iterator(b"").collect();
        let mut sstable_cells: Vec<Vec<Cell>> = Vec::with_capacity(self.ss_tables.len());
        for table in self.ss_tables.values().rev() {
            let cells = table
                .iterator(b"")?
                .collect::<Result<Vec<Cell>, SSTableError>>()?;
            sstable_cells.push(cells);
        }

        let mut sources: Vec<Box<dyn CellSource>> = Vec::with_capacity(1 + sstable_cells.len());
        sources.push(Box::new(memtable_cells.into_iter()));
        sources.extend(
            sstable_cells
                .into_iter()
                .map(|cells| Box::new(cells.into_iter()) as Box<dyn CellSource>),
        );

        let live: Vec<Cell> = merge::collapse(sources)?
            .filter(|cell| !matches!(cell, Ok(c) if c.value.is_removed()))
            .collect::<Result<Vec<Cell>, SSTableError>>()?;
        let rows = live.len() as u32;

        let compacted_path = self.storage_dir.join(format!("{}.dat", self.next_generation));
        sstable::build(&compacted_path, live.into_iter(), rows)?;

        let old_generations: Vec<u64> = self.ss_tables.keys().copied().collect();
        for (_, mut table) in std::mem::take(&mut self.ss_tables) {
            table.close()?;
        }
        for generation in old_generations {
            fs::remove_file(self.storage_dir.join(format!("{generation}.dat")))?;
        }

        let final_path = self.storage_dir.join("0.dat");
        fs::rename(&compacted_path, &final_path)?;

        let table = SSTable::open(&final_path, 0)?;
        self.ss_tables.insert(0, table);
        self.next_generation = 1;
        self.memtable = MemTable::new(Arc::clone(&self.clock));

        info!(rows, "compaction complete");
        Ok(())
    }

    /// Flushes the memtable if nonempty, then releases every SSTable's
    /// file handle. The only release path for those handles.
    pub fn close(&mut self) -> Result<(), LsmError> {
        info!("closing LsmDao");
        if self.memtable.size() > 0 {
            self.flush()?;
        }
        let mut first_error = None;
        for table in self.ss_tables.values_mut() {
            if let Err(err) = table.close() {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// The number of on-disk SSTable generations currently live.
    pub fn sstable_count(&self) -> usize {
        self.ss_tables.len()
    }
}

fn default_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    })
}

/// The merged, collapsed, tombstone-filtered snapshot returned by
/// [`LsmDao::iterator`].
///
/// Yields `Ok(Record)` for each live key in ascending order. If a
/// source errors mid-scan, that error is yielded once and the
/// iterator is exhausted afterward; every `Record` already returned
/// remains valid.
pub struct LsmIterator<'a> {
    inner: Box<dyn Iterator<Item = Result<Record, SSTableError>> + 'a>,
}

impl<'a> Iterator for LsmIterator<'a> {
    type Item = Result<Record, LsmError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| r.map_err(LsmError::from))
    }
}
