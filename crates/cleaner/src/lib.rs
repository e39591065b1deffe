//! Session-oriented, crash-tolerant garbage collector for the APK cache.
//!
//! The cache is a directory containing an SQLite index (`index.db`, owned by
//! the `apkcache-db` crate) and a flat `files/` directory of opaque blobs.
//! This crate keeps the two consistent: it expires sessions abandoned by
//! crashed writers, deletes blob files no entry references, and, whenever
//! the index itself cannot be trusted, discards the whole cache rather than
//! attempt a partial repair.
//!
//! A pass is stateless and safe to schedule periodically; if a writer is
//! active it backs off and reports success without touching anything.

mod cleaner;
pub mod error;
mod fs;
pub mod layout;

pub use crate::cleaner::{CLEANER_SOURCE, Cleaner, MAX_SESSION_AGE, Outcome};
pub use crate::layout::CacheLayout;
