//! Forward cursor over an [`SSTable`](super::SSTable)'s entries.

use crate::cell::Cell;
use crate::merge::CellSource;

use super::{SSTable, SSTableError};

/// Yields [`Cell`]s from a starting row to the end of the table, each
/// `next()` decoding one entry via the offsets table.
pub struct SSTableIterator<'a> {
    table: &'a SSTable,
    next_row: u32,
    failed: bool,
}

impl<'a> SSTableIterator<'a> {
    pub(super) fn new(table: &'a SSTable, start_row: u32) -> Self {
        Self {
            table,
            next_row: start_row,
            failed: false,
        }
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<Cell, SSTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_row >= self.table.rows() {
            return None;
        }
        let result = self.table.cell_at(self.next_row);
        self.next_row += 1;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

impl CellSource for SSTableIterator<'_> {
    fn next_cell(&mut self) -> Result<Option<Cell>, SSTableError> {
        match Iterator::next(self) {
            None => Ok(None),
            Some(Ok(cell)) => Ok(Some(cell)),
            Some(Err(err)) => Err(err),
        }
    }
}
