//! Serialization of a sorted [`Cell`] stream into the on-disk SSTable
//! format, published atomically.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::cell::Cell;
use crate::value::Value;

use super::SSTableError;

/// Writes `cells` (which the caller guarantees are in strictly
/// ascending key order and number exactly `rows`) to `final_path`.
///
/// The file is first written in full to a sibling `.tmp` path, flushed
/// and synced, then published with a single atomic `rename` — the
/// only way a reader can observe `final_path` is after the whole file
/// exists under that name. No partial file is ever visible with the
/// `.dat` suffix.
pub fn build(
    final_path: impl AsRef<Path>,
    cells: impl Iterator<Item = Cell>,
    rows: u32,
) -> Result<(), SSTableError> {
    let final_path = final_path.as_ref();
    let tmp_path = final_path.with_extension("tmp");

    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);

    let mut offsets = Vec::with_capacity(rows as usize);
    let mut offset: u64 = 0;

    for cell in cells {
        offsets.push(offset);
        offset += write_entry(&mut writer, &cell)?;
    }

    for offset in &offsets {
        writer.write_all(&offset.to_be_bytes())?;
    }
    writer.write_all(&rows.to_be_bytes())?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, final_path)?;

    info!(
        path = %final_path.display(),
        rows,
        "published SSTable"
    );
    Ok(())
}

/// Writes a single entry and returns the number of bytes written.
fn write_entry(writer: &mut impl Write, cell: &Cell) -> Result<u64, SSTableError> {
    let key_len = cell.key.len() as u32;
    writer.write_all(&key_len.to_be_bytes())?;
    writer.write_all(&cell.key)?;

    let mut written = 4u64 + cell.key.len() as u64 + 8;

    match &cell.value {
        Value::Live { timestamp, payload } => {
            let ts_signed = *timestamp as i64;
            writer.write_all(&ts_signed.to_be_bytes())?;
            let value_len = payload.len() as u32;
            writer.write_all(&value_len.to_be_bytes())?;
            writer.write_all(payload)?;
            written += 4 + payload.len() as u64;
        }
        Value::Tombstone { timestamp } => {
            let ts_signed = -(*timestamp as i64);
            writer.write_all(&ts_signed.to_be_bytes())?;
        }
    }

    Ok(written)
}
