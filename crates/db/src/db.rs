//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations, run by [`Database::connect`].
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// The cache has a single active writer at a time (enforced by the session
// protocol), so there's no point in a large pool.
const MAX_CONNECTIONS: u32 = 2;

/// Database connection pool for the APK cache index.
///
/// This is the main entry point for interacting with the cache database.
/// It manages the SQLite connection pool and provides access to the session
/// and file-entry stores.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // This is IMPORTANT to apply the query-based PRAGMAs to EVERY
            // connection (set by max connections) instead of only the
            // first connection returned by the pool.
            .after_connect(|conn, meta| Box::pin(async move {
                Self::apply_pragmas(conn, meta).await
            }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Self { pool })
    }

    /// Connect to the cache database at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    /// This is the entry point for content writers and for tests building
    /// fixtures.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        let db = Self::new(options, None).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Open an existing cache database, without creating it or migrating.
    ///
    /// The cleaner uses this so that a freshly-created empty database file
    /// stays observable (no `sessions` table) instead of being silently
    /// migrated into a valid-looking index. Opening a file that is not a
    /// database fails here with SQLITE_NOTADB.
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(false);
        Self::new(options, None).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // In-memory database must either use the same cache `.shared_cache(true)`,
        // or be limited to one connection. Otherwise parallel connections will
        // see different databases that contain different data.
        let db = Self::new(options, Some(1)).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Enable WAL mode for better concurrent read performance
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Cascade deletes (file_entries -> sessions) depend on this
            .foreign_keys(true)
            // PRAGMA synchronous = NORMAL (balance between safety and speed)
            .synchronous(SqliteSynchronous::Normal)
            // PRAGMA busy_timeout = 1500ms
            // A writer streaming packages in while the cleaner polls session
            // state can produce short SQLITE_BUSY windows even in WAL mode.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// This is called automatically by `connect` and `connect_in_memory`,
    /// but can be called manually if needed.
    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Run SQLite's structural self-consistency scan.
    ///
    /// Returns `false` on *any* detected corruption, including a failure to
    /// run the pragma at all. This is a binary corrupt/not-corrupt signal:
    /// integrity failures are never selectively repaired, the caller nukes
    /// the whole cache instead.
    pub async fn integrity_check(&self) -> bool {
        let result: sqlx::Result<String> =
            sqlx::query_scalar("PRAGMA integrity_check").fetch_one(&self.pool).await;
        match result {
            Ok(verdict) if verdict == "ok" => true,
            Ok(verdict) => {
                tracing::warn!(%verdict, "integrity check reported corruption");
                false
            },
            Err(error) => {
                tracing::warn!(%error, "integrity check could not run");
                false
            },
        }
    }

    /// Check whether a table exists in the schema.
    ///
    /// Used to distinguish a freshly-created empty file from a real database
    /// that happens to contain no sessions.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        Ok(count > 0)
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This is useful for running custom queries or transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
