//! The GC pass over one cache root.
//!
//! A pass is a single synchronous sweep with no state carried between
//! passes; every decision is re-derived from the database and the
//! filesystem each time. Concurrency only exists *across* processes
//! (another cleaner, or a writer streaming packages in), and is coordinated
//! entirely through the session table: whoever holds an OPEN session owns
//! the cache, and an OPEN session older than [`MAX_SESSION_AGE`] belonged
//! to a process that crashed and can be reclaimed.
//!
//! Every detected anomaly maps onto the most conservative recovery: wipe
//! and start over. Partial repair of a content cache risks silently serving
//! stale or truncated packages, so the only surgical deletions are
//! individually-stale session rows and individually-orphaned blob files.

use crate::error::{ErrorKind, Result};
use crate::fs;
use crate::layout::{self, CacheLayout};
use apkcache_db::{Database, FileEntryStore, SessionStatus, SessionStore};
use exn::ResultExt;
use std::collections::HashSet;
use std::path::PathBuf;
use time::{Duration, UtcDateTime};

/// An OPEN session older than this is presumed abandoned and gets expired.
pub const MAX_SESSION_AGE: Duration = Duration::minutes(10);
/// `sessions.source` value for sessions opened by the cleaner itself.
pub const CLEANER_SOURCE: &str = "cache_cleaner";

/// How a successful pass ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The pass ran to completion, including filesystem reconciliation
    /// (or a partial/full wipe where that was the correct action).
    Cleaned,
    /// Another session was still OPEN after expiry, so a writer may be
    /// mid-write; the pass touched no files and backed off.
    Deferred,
}

/// Recovery decision produced by the database survey.
///
/// One variant per recovery action, matched exhaustively in [`Cleaner::run`]
/// so the policy stays explicit: proceed, back off, discard the blobs, or
/// discard everything.
enum Verdict {
    /// No other session is active; the id is the cleaner's own OPEN session.
    Proceed(i64),
    /// A live writer holds an OPEN session.
    Defer,
    /// The database is valid but has never been populated (no `sessions`
    /// table); the blobs are unreferenced by definition.
    WipeBlobs,
    /// The database cannot be trusted; wipe the whole cache root.
    WipeAll(ErrorKind),
}

/// One-shot garbage collector for a cache root.
///
/// Holds no cross-pass state; construct, [`run`](Self::run), drop.
#[derive(Debug)]
pub struct Cleaner {
    layout: CacheLayout,
    max_session_age: Duration,
}

impl Cleaner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { layout: CacheLayout::new(root.into()), max_session_age: MAX_SESSION_AGE }
    }

    /// Override the staleness threshold (policy/testing hook).
    pub fn with_max_session_age(mut self, age: Duration) -> Self {
        self.max_session_age = age;
        self
    }

    /// Run one GC pass.
    ///
    /// Returns the terminal outcome, or an error after the recovery action
    /// for that failure (usually a best-effort wipe) has already been
    /// attempted.
    pub async fn run(&self) -> Result<Outcome> {
        let root = self.layout.root();
        if !fs::dir_exists(root).await {
            exn::bail!(ErrorKind::RootMissing(root.to_path_buf()));
        }

        if !fs::path_exists(&self.layout.db_path()).await {
            // Without an index there is no way to tell which blobs are
            // referenced; discarding them all is the only safe action.
            tracing::info!("no index database, discarding blob directory");
            fs::remove_dir_recursive(&self.layout.blobs_dir()).await?;
            return Ok(Outcome::Cleaned);
        }

        let db = match Database::open_existing(self.layout.db_path()).await {
            Ok(db) => db,
            Err(error) => {
                // An unopenable database is indistinguishable from a
                // corrupted one.
                tracing::warn!(?error, "index database will not open, wiping cache");
                self.wipe_all_best_effort().await;
                exn::bail!(ErrorKind::OpenFailed);
            },
        };

        match self.survey(&db).await {
            Verdict::Proceed(session_id) => {
                let sessions = SessionStore::from(&db);
                let reconciled = self.reconcile(&db).await;
                let closed = sessions.update_status(session_id, SessionStatus::Closed).await;
                db.close().await;
                reconciled?;
                closed.or_raise(|| ErrorKind::SessionCloseFailed)?;
                Ok(Outcome::Cleaned)
            },
            Verdict::Defer => {
                db.close().await;
                tracing::info!("another session is active, deferring this pass");
                Ok(Outcome::Deferred)
            },
            Verdict::WipeBlobs => {
                db.close().await;
                tracing::info!("index database is empty, discarding blob directory");
                fs::remove_dir_recursive(&self.layout.blobs_dir()).await?;
                Ok(Outcome::Cleaned)
            },
            Verdict::WipeAll(kind) => {
                db.close().await;
                tracing::warn!(%kind, "untrustworthy cache state, wiping cache");
                self.wipe_all_best_effort().await;
                Err(exn::Exn::from(kind))
            },
        }
    }

    /// Database survey: integrity, schema presence, stale-session expiry,
    /// and the claim on the exclusive writer slot.
    async fn survey(&self, db: &Database) -> Verdict {
        if !db.integrity_check().await {
            return Verdict::WipeAll(ErrorKind::IntegrityFailed);
        }
        // A freshly-created empty database file has no schema at all. Not an
        // anomaly: keep the (empty) database, discard just the blobs.
        match db.table_exists("sessions").await {
            Ok(true) => {},
            Ok(false) => return Verdict::WipeBlobs,
            Err(error) => {
                tracing::warn!(?error, "schema lookup failed");
                return Verdict::WipeAll(ErrorKind::QueryFailed);
            },
        }

        let sessions = SessionStore::from(db);
        let all = match sessions.list().await {
            Ok(all) => all,
            Err(error) => {
                tracing::warn!(?error, "session listing failed");
                return Verdict::WipeAll(ErrorKind::QueryFailed);
            },
        };

        let now = UtcDateTime::now();
        for session in all.iter().filter(|s| s.status == SessionStatus::Open) {
            let age = now - session.timestamp;
            if age < Duration::ZERO {
                // Clock skew, or a racy writer that grabbed its timestamp a
                // moment after we grabbed ours. Conservatively still valid.
                tracing::warn!(id = session.id, source = %session.source, "session from the future, leaving it alone");
            } else if age > self.max_session_age {
                tracing::info!(id = session.id, source = %session.source, "expiring stale session");
                if let Err(error) = sessions.delete(session.id).await {
                    tracing::warn!(?error, id = session.id, "failed to expire stale session");
                    return Verdict::WipeAll(ErrorKind::ExpiryDeleteFailed);
                }
            }
        }

        // Re-scan after expiry: any surviving OPEN session is a live writer
        // and the filesystem must not be touched under it.
        let remaining = match sessions.list().await {
            Ok(remaining) => remaining,
            Err(error) => {
                tracing::warn!(?error, "session listing failed");
                return Verdict::WipeAll(ErrorKind::QueryFailed);
            },
        };
        if remaining.iter().any(|s| s.status == SessionStatus::Open) {
            return Verdict::Defer;
        }

        // Claim the exclusive writer slot. Advisory only: between the scan
        // above and this insert, another process can slip in its own OPEN
        // session. Known race, accepted; closing it would need a UNIQUE
        // partial index or an external lock, and every writer would have to
        // agree on it.
        match sessions.insert(CLEANER_SOURCE, now, SessionStatus::Open).await {
            Ok(id) => Verdict::Proceed(id),
            Err(error) => {
                tracing::warn!(?error, "failed to open cleaner session");
                Verdict::WipeAll(ErrorKind::SessionInsertFailed)
            },
        }
    }

    /// Restore the 1:1 correspondence between blob files and file entries.
    ///
    /// Deletes on-disk files with no matching row (including files whose
    /// names don't decode to an entry id at all). Rows whose files are
    /// missing are left for the eviction policy to notice on next access.
    async fn reconcile(&self, db: &Database) -> Result<()> {
        let ids: HashSet<i64> = FileEntryStore::from(db)
            .list_ids()
            .await
            .or_raise(|| ErrorKind::QueryFailed)?
            .into_iter()
            .collect();

        let mut orphans = 0u64;
        for path in fs::list_dir(&self.layout.blobs_dir()).await? {
            let referenced = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(layout::parse_blob_name)
                .is_some_and(|id| ids.contains(&id));
            if referenced {
                continue;
            }
            tracing::info!(path = %path.display(), "removing orphaned cache file");
            if fs::dir_exists(&path).await {
                fs::remove_dir_recursive(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
            orphans += 1;
        }
        if orphans > 0 {
            tracing::info!(orphans, "reconciliation removed orphaned files");
        }
        Ok(())
    }

    /// DeleteCache: empty the cache root. Best-effort, the caller is already
    /// on an escalation path and will report its own failure.
    async fn wipe_all_best_effort(&self) {
        if let Err(error) = fs::wipe_dir_contents(self.layout.root()).await {
            tracing::warn!(?error, "cache wipe incomplete");
        }
    }
}
