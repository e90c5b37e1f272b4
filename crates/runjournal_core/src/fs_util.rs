//! Durable file write helpers shared by the store and projection snapshots.
//!
//! # Invariants
//! - Readers observe either the previous or the new file content, never a
//!   partial write: content goes to a uniquely named temp file in the same
//!   directory, is fsynced, then renamed over the target.
//! - Concurrent writers to one path never share a temp file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `bytes` to `path` via temp file, fsync, and rename.
///
/// Creates missing parent directories.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    fsync_dir(parent)
}

/// Reads a file, mapping "not found" to `None`.
pub fn read_if_exists(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    fs::OpenOptions::new().read(true).open(dir)?.sync_all()
}

// Directory handles cannot be fsynced on every platform.
#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
