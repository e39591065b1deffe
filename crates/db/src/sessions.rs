//! Session store: CRUD over the `sessions` table.
//!
//! The session table doubles as the cache's mutual-exclusion primitive (see
//! the cleaner crate), so the store is deliberately dumb: no caching, no
//! derived state, every call goes straight to the database.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Session, SessionRow, SessionStatus};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

/// Repository for cache-access sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}
impl From<&Database> for SessionStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl SessionStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all sessions.
    ///
    /// Callers scan the full set; ordering is irrelevant. A query failure
    /// (e.g. a missing table) is an error, never an empty list: callers
    /// must treat it like an integrity problem.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(include_str!("../queries/list_sessions.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Session::try_from).collect()
    }

    /// Create a new session row and return the store-assigned id.
    pub async fn insert(
        &self,
        source: &str,
        timestamp: UtcDateTime,
        status: SessionStatus,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_session.sql"))
            .bind(source)
            .bind(timestamp.unix_timestamp())
            .bind(status.as_wire())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    /// Transition a session's status field.
    ///
    /// Returns [`ErrorKind::SessionNotFound`] if no row with `id` exists.
    pub async fn update_status(&self, id: i64, status: SessionStatus) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/update_session_status.sql"))
            .bind(status.as_wire())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::SessionNotFound(id));
        }
        Ok(())
    }

    /// Delete a session row.
    ///
    /// The engine's cascade delete removes dependent file entries atomically
    /// as part of the same statement. A missing row is not an error
    /// (deletion is idempotent).
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_session.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
