//! Balances file reading and writing.

use crate::snapshot::{AddressBalance, SnapshotError};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Serialize `value` as two-space indented JSON and move it over `path`.
///
/// The document is staged in a temporary file beside the destination, so
/// readers only ever see a complete file.
pub fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), SnapshotError>
where
    T: Serialize + ?Sized,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(|e| SnapshotError::io(path, e))?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| SnapshotError::from_json(path, e))?;
        writer.flush().map_err(|e| SnapshotError::io(path, e))?;
    }

    staged.persist(path).map_err(|e| SnapshotError::io(path, e.error))?;
    Ok(())
}

/// Write the first `top_n` ranked balances to `path`, returning how many were written
pub fn write_top_balances(
    ranked: &[AddressBalance],
    top_n: usize,
    path: &Path,
) -> Result<usize, SnapshotError> {
    let top = &ranked[..ranked.len().min(top_n)];
    write_json_atomic(path, top)?;

    info!("Wrote {} balances to {}", top.len(), path.display());
    Ok(top.len())
}

/// Load a balances file written by [`write_top_balances`]
pub fn read_balances(path: &Path) -> Result<Vec<AddressBalance>, SnapshotError> {
    let file = File::open(path).map_err(|e| SnapshotError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| SnapshotError::from_json(path, e))
}
