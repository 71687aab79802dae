//! # lsm-dao
//!
//! An embeddable, ordered key-value store built on a **Log-Structured
//! Merge-Tree (LSM-tree)**. Single-process, single-writer, synchronous.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      LsmDao                           │
//! │  ┌────────────┐        ┌──────────────────────────┐  │
//! │  │  MemTable   │        │  SSTables (on disk)       │  │
//! │  │  (buffer)   │ flush  │  gen 0, gen 1, ... gen N   │  │
//! │  │             ├───────►│  newest generation wins    │  │
//! │  └─────┬───────┘        └─────────────┬────────────┘  │
//! │        │                              │               │
//! │        └──────────────┬───────────────┘               │
//! │                  Merge operator                       │
//! │          (k-way merge, collapse-equals,                │
//! │           tombstone filter, project to Record)         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | `LsmDao` — open, upsert, remove, iterator, flush, compact, close |
//! | [`memtable`] | In-memory write buffer with byte-accurate size accounting |
//! | [`sstable`] | Immutable, on-disk sorted run: binary layout, binary search, iteration |
//! | [`merge`] | K-way merge + collapse-equals + tombstone filter |
//! | [`value`] | Tagged, timestamped payload (live or tombstone) |
//! | [`cell`] | `(key, Value)` pair used on the merge path |
//! | [`record`] | `(key, payload)` — the external, tombstone-free view |
//!
//! ## Guarantees
//!
//! - **Read-your-writes**: a scan observes every write that completed
//!   before the scan was constructed.
//! - **Atomic publish**: an SSTable is only ever visible on disk once
//!   fully written — flush and compaction write to a `.tmp` path and
//!   `rename` into place.
//! - **Tombstone semantics**: deletions are markers, not removals; they
//!   are dropped only once no older generation can still be shadowed by
//!   them (i.e. at full compaction).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lsm_dao::engine::{LsmDao, LsmDaoConfig};
//!
//! let config = LsmDaoConfig { flush_threshold: 4096 };
//! let mut dao = LsmDao::open("/tmp/my_store", config).unwrap();
//!
//! dao.upsert(b"hello".to_vec(), b"world".to_vec()).unwrap();
//! let first = dao.iterator(b"").unwrap().next().transpose().unwrap();
//! assert_eq!(
//!     first.map(|r| r.payload),
//!     Some(b"world".to_vec())
//! );
//!
//! dao.remove(b"hello".to_vec()).unwrap();
//! dao.close().unwrap();
//! ```

pub mod cell;
pub mod engine;
pub mod memtable;
pub mod merge;
pub mod record;
pub mod sstable;
pub mod value;
