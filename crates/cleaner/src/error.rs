//! Cleaner Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Callers never see raw storage-engine errors: every fallible step inside a
//! pass decides on its own recovery action (wipe, partial wipe, or defer)
//! first, then surfaces one of these coarse categories.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A cleaner error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cleaner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The cache root directory does not exist. An environment error, not
    /// something the cleaner fixes; no cleanup is attempted.
    #[display("cache root missing: {}", _0.display())]
    RootMissing(#[error(not(source))] PathBuf),
    /// The index database could not be opened; the cache was wiped.
    #[display("index database could not be opened")]
    OpenFailed,
    /// The index database failed its integrity scan; the cache was wiped.
    #[display("index database is corrupt")]
    IntegrityFailed,
    /// A session query failed on a database that opened fine; treated the
    /// same as corruption, the cache was wiped.
    #[display("session query failed")]
    QueryFailed,
    /// Deleting a stale session failed; partial cleanup state is not
    /// trustworthy, so the cache was wiped.
    #[display("stale session could not be expired")]
    ExpiryDeleteFailed,
    /// The cleaner could not claim its own session; the cache was wiped.
    #[display("cleaner session could not be opened")]
    SessionInsertFailed,
    /// The cleaner's session could not be marked closed.
    #[display("cleaner session could not be closed")]
    SessionCloseFailed,
    /// Underlying I/O error during filesystem reconciliation or cleanup.
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Most failures end with the cache already wiped, so the next pass
    /// starts from a blank slate and will succeed trivially.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RootMissing(_))
    }
}
