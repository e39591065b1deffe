//! On-disk layout of a cache root.
//!
//! A cache root contains exactly two things: the index database (plus the
//! `-wal`/`-shm`/`-journal` companions SQLite manages on its own) and a flat
//! `files/` directory of opaque blobs. Each blob is named by the 16-hex-digit
//! lowercase encoding of its `FileEntry` id, so file names and database ids
//! can be mapped onto each other without opening the files.

use std::path::{Path, PathBuf};

/// File name of the index database inside the cache root.
pub const DB_FILE_NAME: &str = "index.db";
/// Directory name of the blob store inside the cache root.
pub const BLOBS_DIR_NAME: &str = "files";

/// Path layout under a single cache root.
#[derive(Clone, Debug)]
pub struct CacheLayout {
    root: PathBuf,
}
impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE_NAME)
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR_NAME)
    }

    /// Absolute path of the blob for a file entry id.
    pub fn blob_path(&self, id: i64) -> PathBuf {
        self.blobs_dir().join(blob_name(id))
    }
}

/// Encode a file entry id as its on-disk blob file name.
///
/// Ids are 64-bit; the name is always exactly 16 lowercase hex digits
/// (e.g. id 42 -> `000000000000002a`).
pub fn blob_name(id: i64) -> String {
    format!("{:016x}", id as u64)
}

/// Decode a blob file name back into a file entry id.
///
/// Strict: anything that is not exactly 16 lowercase hex digits is `None`.
/// The reconciliation step treats such files as orphans, so being lenient
/// here would only protect junk from cleanup.
pub fn parse_blob_name(name: &str) -> Option<i64> {
    if name.len() != 16 || !name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    u64::from_str_radix(name, 16).ok().map(|id| id as i64)
}
