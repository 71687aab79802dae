//! K-way merge of sorted [`Cell`] streams, duplicate collapse, and the
//! tombstone filter that projects the result to [`Record`]s.
//!
//! This is the one implementation of the read-path merge algorithm in
//! the crate: both [`crate::engine::LsmDao::iterator`] (which must
//! merge a live memtable cursor with fallible, mmap-backed SSTable
//! cursors) and [`crate::engine::LsmDao::compact`] (which merges
//! already-materialized, infallible `Cell` vectors) drive it through
//! the same [`CellSource`] trait.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::cell::Cell;
use crate::record::Record;
use crate::sstable::SSTableError;

/// A source of [`Cell`]s whose `next_cell` may fail mid-scan.
///
/// Any sorted, infallible `Iterator<Item = Cell>` — a memtable cursor,
/// a `Vec<Cell>::into_iter()` — satisfies this automatically via the
/// blanket impl below. [`crate::sstable::iterator::SSTableIterator`]
/// implements it directly, since decoding a row can surface an I/O or
/// malformed-data error.
pub trait CellSource {
    fn next_cell(&mut self) -> Result<Option<Cell>, SSTableError>;
}

impl<I: Iterator<Item = Cell>> CellSource for I {
    fn next_cell(&mut self) -> Result<Option<Cell>, SSTableError> {
        Ok(Iterator::next(self))
    }
}

/// One source stream's current head, paired with its position in
/// `sources` so the heap can pull the next item from the same stream
/// once this one is popped.
struct HeapEntry {
    cell: Cell,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Cell::COMPARATOR's ordering is ascending; BinaryHeap is a
        // max-heap, so entries are wrapped in Reverse at push time.
        // Here we only need a total order consistent with that.
        self.cell.cmp(&other.cell)
    }
}

/// A sorted iterator over the union of `sources`, ordered by
/// [`Cell`]'s comparator: ascending by key, then descending by
/// timestamp. The source order of the inputs does not affect
/// correctness. If a source errors mid-scan, that error is yielded
/// once and the iterator is exhausted afterward.
pub struct MergeIterator<'a> {
    sources: Vec<Box<dyn CellSource + 'a>>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    failed: bool,
}

impl<'a> MergeIterator<'a> {
    /// Builds a merge iterator over `sources`, conventionally the
    /// memtable's iterator followed by each SSTable's iterator in
    /// descending generation order — so that, on a tie, the freshest
    /// duplicate surfaces naturally.
    pub fn new(mut sources: Vec<Box<dyn CellSource + 'a>>) -> Result<Self, SSTableError> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (index, source) in sources.iter_mut().enumerate() {
            if let Some(cell) = source.next_cell()? {
                heap.push(Reverse(HeapEntry { cell, source: index }));
            }
        }
        Ok(Self { sources, heap, failed: false })
    }
}

impl Iterator for MergeIterator<'_> {
    type Item = Result<Cell, SSTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Reverse(HeapEntry { cell, source }) = self.heap.pop()?;
        match self.sources[source].next_cell() {
            Ok(Some(next_cell)) => {
                self.heap.push(Reverse(HeapEntry { cell: next_cell, source }));
            }
            Ok(None) => {}
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        }
        Some(Ok(cell))
    }
}

/// Runs the k-way merge over `sources` and collapses consecutive
/// Cells sharing a key down to the first (freshest, by the
/// comparator's tie-break) — the "collapse-equals" step. Tombstones
/// are preserved. Errors from the underlying sources pass through
/// unfiltered.
pub fn collapse<'a>(
    sources: Vec<Box<dyn CellSource + 'a>>,
) -> Result<impl Iterator<Item = Result<Cell, SSTableError>> + 'a, SSTableError> {
    let mut last_key: Option<Vec<u8>> = None;
    let merged = MergeIterator::new(sources)?;
    Ok(merged.filter(move |item| match item {
        Ok(cell) => {
            if last_key.as_deref() == Some(cell.key.as_slice()) {
                false
            } else {
                last_key = Some(cell.key.clone());
                true
            }
        }
        Err(_) => true,
    }))
}

/// Merges `sources`, collapses duplicates, drops tombstones, and
/// projects every surviving Cell to a [`Record`] — the full read path
/// used by [`crate::engine::LsmDao::iterator`].
pub fn merge_to_records<'a>(
    sources: Vec<Box<dyn CellSource + 'a>>,
) -> Result<impl Iterator<Item = Result<Record, SSTableError>> + 'a, SSTableError> {
    Ok(collapse(sources)?.filter_map(|item| match item {
        Ok(cell) if cell.value.is_removed() => None,
        Ok(cell) => Some(Ok(cell.into_record())),
        Err(err) => Some(Err(err)),
    }))
}
