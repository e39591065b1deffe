//! Filesystem primitives for the cleaner.
//!
//! Thin wrappers over `tokio::fs` with the error mapping the cleaner wants:
//! "already gone" is success for every destructive operation, because a
//! previous pass (or a concurrent one) may have removed things first.

use crate::error::{ErrorKind, Result};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

pub(crate) async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|meta| meta.is_dir()).unwrap_or(false)
}

pub(crate) async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Recursively delete a directory. A missing directory is not an error.
pub(crate) async fn remove_dir_recursive(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
        Err(err) => Err(exn::Exn::from(ErrorKind::Io(err))),
    }
}

/// Delete a single file. A missing file is not an error.
pub(crate) async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
        Err(err) => Err(exn::Exn::from(ErrorKind::Io(err))),
    }
}

/// Delete everything *inside* a directory, keeping the directory itself.
///
/// This is the DeleteCache recovery action: blobs, the index database, and
/// whatever `-wal`/`-shm`/`-journal` companions SQLite left behind all live
/// directly under the cache root, so emptying it resets the cache.
pub(crate) async fn wipe_dir_contents(path: &Path) -> Result<()> {
    let mut entries = fs::read_dir(path).await.map_err(ErrorKind::Io)?;
    while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
        let target = entry.path();
        // Entries can vanish while the walk is in flight: SQLite unlinks
        // the `-wal`/`-shm` companions on connection teardown. Don't stat
        // first (the answer could be stale by the time it's used); try the
        // file shape, fall back to the directory shape, and let both treat
        // "already gone" as done.
        match fs::remove_file(&target).await {
            Ok(()) => {},
            Err(err) if err.kind() == IoErrorKind::NotFound => {},
            Err(_) => remove_dir_recursive(&target).await?,
        }
    }
    Ok(())
}

/// List the entry paths of a directory, non-recursively.
///
/// A missing directory yields an empty list, consistent with how the blob
/// directory may legitimately not exist yet.
pub(crate) async fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(exn::Exn::from(ErrorKind::Io(err))),
    };
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
        paths.push(entry.path());
    }
    Ok(paths)
}
