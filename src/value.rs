//! A tagged, timestamped payload: either a live value or a tombstone.
//!
//! The on-disk encoding (see [`crate::sstable`]) reuses the sign bit of
//! the stored timestamp to distinguish the two cases, which is why a
//! zero timestamp is forbidden here: it would be indistinguishable from
//! a negative (tombstone-tagged) one.

/// A live payload or a deletion marker, tagged with the millisecond
/// timestamp of the write that produced it.
///
/// Timestamps break ties between entries sharing a key: the entry with
/// the larger timestamp is the fresher one. See [`crate::cell::Cell`]
/// for the ordering that relies on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A live entry carrying its payload.
    Live {
        /// Milliseconds from a monotonically nondecreasing clock.
        timestamp: u64,
        /// The stored bytes.
        payload: Vec<u8>,
    },
    /// A deletion marker. Carries no payload.
    Tombstone {
        /// Milliseconds from a monotonically nondecreasing clock.
        timestamp: u64,
    },
}

impl Value {
    /// Builds a live value.
    ///
    /// # Panics
    /// Panics in debug builds if `timestamp == 0` — the engine never
    /// produces a zero timestamp and a caller constructing one directly
    /// has violated the clock contract.
    pub fn live(timestamp: u64, payload: Vec<u8>) -> Self {
        debug_assert!(timestamp > 0, "Value timestamp must be nonzero");
        Value::Live { timestamp, payload }
    }

    /// Builds a tombstone value.
    ///
    /// # Panics
    /// Panics in debug builds if `timestamp == 0`.
    pub fn tombstone(timestamp: u64) -> Self {
        debug_assert!(timestamp > 0, "Value timestamp must be nonzero");
        Value::Tombstone { timestamp }
    }

    /// Whether this value represents a deletion.
    pub fn is_removed(&self) -> bool {
        matches!(self, Value::Tombstone { .. })
    }

    /// The timestamp of the write that produced this value.
    pub fn timestamp(&self) -> u64 {
        match self {
            Value::Live { timestamp, .. } => *timestamp,
            Value::Tombstone { timestamp } => *timestamp,
        }
    }

    /// The payload, if this value is live.
    ///
    /// Returns `None` for a tombstone — callers on the read path never
    /// need to distinguish "tombstone" from "corrupt live value", so
    /// this is a plain `Option` rather than a panic.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Value::Live { payload, .. } => Some(payload),
            Value::Tombstone { .. } => None,
        }
    }

    /// Byte length this value contributes to [`crate::memtable::MemTable`]'s
    /// size accounting: the payload length when live, zero for a tombstone.
    pub(crate) fn accounted_len(&self) -> usize {
        match self {
            Value::Live { payload, .. } => payload.len(),
            Value::Tombstone { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_roundtrips_payload_and_timestamp() {
        let v = Value::live(7, b"hi".to_vec());
        assert!(!v.is_removed());
        assert_eq!(v.timestamp(), 7);
        assert_eq!(v.data(), Some(b"hi".as_slice()));
    }

    #[test]
    fn tombstone_has_no_data() {
        let v = Value::tombstone(3);
        assert!(v.is_removed());
        assert_eq!(v.timestamp(), 3);
        assert_eq!(v.data(), None);
    }

    #[test]
    fn accounted_len_ignores_tombstone() {
        assert_eq!(Value::live(1, vec![1, 2, 3]).accounted_len(), 3);
        assert_eq!(Value::tombstone(1).accounted_len(), 0);
    }
}
