//! SQLite database layer for the APK cache index.
//!
//! This crate owns the `index.db` file that sits next to the cache's blob
//! directory. It records two entity types:
//! - **Sessions**: time-bounded claims on the cache, one per writer (or
//!   cleaner) activity window. The session table doubles as the cache's
//!   advisory mutual-exclusion primitive.
//! - **FileEntries**: one row per cached blob, owned by the session that
//!   streamed it in. Deleting a session cascades to its entries, so a
//!   crashed writer's half-finished work disappears in one statement.
//!
//! The database is bookkeeping, not the source of truth for blob bytes; if
//! it is corrupt the only safe recovery is discarding the whole cache, which
//! is the cleaner crate's job.

mod db;
mod entries;
pub mod error;
mod models;
mod sessions;

pub use crate::db::Database;
pub use crate::entries::FileEntryStore;
pub use crate::models::{FileEntry, NewFileEntry, Session, SessionStatus};
pub use crate::sessions::SessionStore;
