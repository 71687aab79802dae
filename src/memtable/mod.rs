//! # MemTable module
//!
//! The in-memory write buffer sitting in front of the on-disk
//! [`crate::sstable::SSTable`] runs.
//!
//! ## Design invariants
//!
//! - Entries are kept in an ordered map so [`MemTable::iterator`] can
//!   yield Cells in ascending key order without sorting at read time.
//! - `size_in_bytes` is maintained incrementally on every write and is
//!   never recomputed from scratch — see the accounting rules on
//!   [`MemTable::upsert`] and [`MemTable::remove`].
//! - A key's prior entry (live or tombstone) is always fully replaced;
//!   the memtable never stores more than one version per key.


use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::cell::Cell;
use crate::value::Value;

/// Errors raised by [`MemTable`] operations.
#[derive(Debug, Error)]
pub enum MemTableError {
    /// The memtable is a pure in-memory structure; it has no failure
    /// modes of its own. Kept so callers composing `MemTable` with
    /// [`crate::sstable::SSTable`] behind a common error type don't
    /// need a separate `Result<_, Infallible>` path.
    #[error("internal memtable error: {0}")]
    Internal(String),
}

/// The clock used to timestamp writes: a zero-argument supplier of
/// milliseconds since an arbitrary but monotonically nondecreasing
/// origin. Injected so tests can control timestamp ordering precisely.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The in-memory, ordered write buffer.
///
/// Holds at most one [`Value`] per key (live or tombstone) and a
/// running byte count used by [`crate::engine::LsmDao`] to decide when
/// to flush.
pub struct MemTable {
    entries: BTreeMap<Vec<u8>, Value>,
    size_in_bytes: usize,
    clock: Clock,
}

impl MemTable {
    /// Builds an empty memtable using the given clock for write timestamps.
    pub fn new(clock: Clock) -> Self {
        Self {
            entries: BTreeMap::new(),
            size_in_bytes: 0,
            clock,
        }
    }

    /// Inserts or replaces `key`'s value with `payload`, timestamped now.
    ///
    /// Size delta: a new key adds `len(key) + len(payload)`; replacing a
    /// live entry adds `len(payload) - len(prev.payload)`; replacing a
    /// tombstone adds `len(payload)`.
    pub fn upsert(&mut self, key: Vec<u8>, payload: Vec<u8>) -> Result<(), MemTableError> {
        let timestamp = (self.clock)();
        trace!(key_len = key.len(), payload_len = payload.len(), timestamp, "memtable upsert");
        let new_value = Value::live(timestamp, payload);
        self.apply(key, new_value);
        Ok(())
    }

    /// Installs a tombstone for `key`, timestamped now.
    ///
    /// Size delta: a new key adds `len(key)`; replacing a live entry
    /// subtracts `len(prev.payload)`; replacing a tombstone is a no-op.
    pub fn remove(&mut self, key: Vec<u8>) -> Result<(), MemTableError> {
        let timestamp = (self.clock)();
        trace!(key_len = key.len(), timestamp, "memtable remove");
        let new_value = Value::tombstone(timestamp);
        self.apply(key, new_value);
        Ok(())
    }

    fn apply(&mut self, key: Vec<u8>, new_value: Value) {
        let new_len = new_value.accounted_len();
        match self.entries.insert(key.clone(), new_value) {
            Some(prev) => {
                let prev_len = prev.accounted_len();
                self.size_in_bytes = self.size_in_bytes + new_len - prev_len;
            }
            None => {
                self.size_in_bytes += key.len() + new_len;
            }
        }
    }

    /// Yields Cells in ascending key order, starting at the first key
    /// greater than or equal to `from`. Obtaining a new iterator at any
    /// point restarts the scan from a fresh snapshot of the current state.
    pub fn iterator(&self, from: &[u8]) -> impl Iterator<Item = Cell> + '_ {
        self.entries
            .range(from.to_vec()..)
            .map(|(key, value)| Cell::new(key.clone(), value.clone()))
    }

    /// The running byte count: see accounting rules on [`upsert`](Self::upsert)
    /// and [`remove`](Self::remove).
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// The number of entries currently held (live or tombstone).
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// No-op: the memtable is a pure in-memory buffer and may simply be
    /// dropped. Kept for symmetry with [`crate::sstable::SSTable::close`].
    pub fn close(&mut self) -> Result<(), MemTableError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn fixed_clock(timestamp: u64) -> Clock {
    Arc::new(move || timestamp)
}

#[cfg(test)]
pub(crate) fn counting_clock() -> Clock {
    use std::sync::atomic::{AtomicU64, Ordering};
    let counter = Arc::new(AtomicU64::new(1));
    Arc::new(move || counter.fetch_add(1, Ordering::Relaxed))
}
