//! Atomic file replacement shared by the CSV ledger and the session state.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with the bytes produced by `write`
///
/// Atomically writes by:
/// 1. Writing to a temp file in the same directory (under an exclusive lock)
/// 2. Syncing to disk
/// 3. Renaming over the original
///
/// A failure at any step leaves the previous file untouched.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;

    // Serialize concurrent writers
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
