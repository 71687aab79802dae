use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::memtable::Clock;

/// Initializes tracing controlled by `RUST_LOG`. Safe to call many
/// times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A clock returning a fresh, strictly increasing value on every call,
/// so tests never depend on the wall clock.
pub fn counting_clock() -> Clock {
    let counter = Arc::new(AtomicU64::new(1));
    Arc::new(move || counter.fetch_add(1, Ordering::Relaxed))
}

/// A generous threshold that keeps writes entirely in the memtable.
pub const NO_FLUSH_THRESHOLD: usize = 64 * 1024;

/// A threshold low enough that almost every write triggers a flush.
pub const FLUSH_EVERY_WRITE_THRESHOLD: usize = 0;
