//! `Record` — the external, tombstone-free view of a stored entry.
//!
//! This is what [`crate::engine::LsmDao::iterator`] yields: callers never
//! see [`crate::value::Value`] or its tombstone variant directly, only
//! live key/payload pairs.

/// A key paired with its stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The key.
    pub key: Vec<u8>,
    /// The stored bytes.
    pub payload: Vec<u8>,
}

impl Record {
    /// Builds a record.
    pub fn new(key: Vec<u8>, payload: Vec<u8>) -> Self {
        Self { key, payload }
    }
}
