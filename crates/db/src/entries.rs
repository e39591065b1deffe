//! File entry store: CRUD over the `file_entries` table.
//!
//! Writers insert a row when a blob finishes streaming to disk; the eviction
//! policy reads them back by package identity or by session. The cleaner
//! touches this table only through [`list_ids`](FileEntryStore::list_ids)
//! (filesystem reconciliation) and implicitly via the session cascade.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileEntry, FileEntryRow, NewFileEntry};
use exn::ResultExt;
use sqlx::SqlitePool;

/// Repository for cached-blob metadata.
#[derive(Debug, Clone)]
pub struct FileEntryStore {
    pool: SqlitePool,
}
impl From<&Database> for FileEntryStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl FileEntryStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a file entry and return the store-assigned id.
    ///
    /// The id determines the blob's on-disk file name, so the caller is
    /// expected to write the blob *after* this returns.
    pub async fn insert(&self, entry: &NewFileEntry) -> Result<i64> {
        let size = i64::try_from(entry.size).or_raise(|| ErrorKind::InvalidData("entry size"))?;
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_file_entry.sql"))
            .bind(&entry.package_name)
            .bind(entry.version_code)
            .bind(&entry.kind)
            .bind(&entry.attributes)
            .bind(size)
            .bind(&entry.hash)
            .bind(entry.access_time.unix_timestamp())
            .bind(i64::from(entry.priority))
            .bind(entry.session_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    /// Get all entries for a package identity.
    ///
    /// Multiple rows are legitimate (e.g. split APKs of the same version).
    pub async fn get_by_package(
        &self,
        package_name: &str,
        version_code: i64,
        kind: &str,
    ) -> Result<Vec<FileEntry>> {
        let rows: Vec<FileEntryRow> = sqlx::query_as(include_str!("../queries/get_entries_by_package.sql"))
            .bind(package_name)
            .bind(version_code)
            .bind(kind)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FileEntry::try_from).collect()
    }

    /// List all entries owned by a session.
    pub async fn list_for_session(&self, session_id: i64) -> Result<Vec<FileEntry>> {
        let rows: Vec<FileEntryRow> = sqlx::query_as(include_str!("../queries/list_entries_for_session.sql"))
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FileEntry::try_from).collect()
    }

    /// List the ids of all live entries.
    ///
    /// This is the reconciliation input: every blob file on disk must map
    /// back to exactly one of these ids.
    pub async fn list_ids(&self) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(include_str!("../queries/list_entry_ids.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(ids)
    }

    /// Delete a single entry. A missing row is not an error.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_file_entry.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use crate::sessions::SessionStore;
    use time::UtcDateTime;

    async fn open_session(db: &Database) -> i64 {
        SessionStore::from(db).insert("streaming_agent", UtcDateTime::now(), SessionStatus::Open).await.unwrap()
    }

    fn sample_entry(session_id: i64) -> NewFileEntry {
        NewFileEntry {
            package_name: "org.chromium.arc.testapp".to_string(),
            version_code: 31,
            kind: "apk".to_string(),
            attributes: None,
            size: 4096,
            hash: Some("692ed948ccd76c2230efe90175a519a3".to_string()),
            access_time: UtcDateTime::now(),
            priority: 0,
            session_id,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_by_package() {
        let db = Database::connect_in_memory().await.unwrap();
        let entries = FileEntryStore::from(&db);
        let session_id = open_session(&db).await;
        let id = entries.insert(&sample_entry(session_id)).await.unwrap();
        let found = entries.get_by_package("org.chromium.arc.testapp", 31, "apk").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].size, 4096);
        // Different version code: no match.
        assert!(entries.get_by_package("org.chromium.arc.testapp", 32, "apk").await.unwrap().is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_split_apks_share_identity() {
        let db = Database::connect_in_memory().await.unwrap();
        let entries = FileEntryStore::from(&db);
        let session_id = open_session(&db).await;
        entries.insert(&sample_entry(session_id)).await.unwrap();
        entries.insert(&sample_entry(session_id)).await.unwrap();
        let found = entries.get_by_package("org.chromium.arc.testapp", 31, "apk").await.unwrap();
        assert_eq!(found.len(), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_insert_requires_live_session() {
        let db = Database::connect_in_memory().await.unwrap();
        let entries = FileEntryStore::from(&db);
        // No such session: the foreign key rejects the insert.
        assert!(entries.insert(&sample_entry(424242)).await.is_err());
        db.close().await;
    }

    #[tokio::test]
    async fn test_session_delete_cascades_to_entries() {
        let db = Database::connect_in_memory().await.unwrap();
        let sessions = SessionStore::from(&db);
        let entries = FileEntryStore::from(&db);
        let session_id = open_session(&db).await;
        entries.insert(&sample_entry(session_id)).await.unwrap();
        entries.insert(&sample_entry(session_id)).await.unwrap();
        assert_eq!(entries.list_for_session(session_id).await.unwrap().len(), 2);
        sessions.delete(session_id).await.unwrap();
        assert!(entries.list_for_session(session_id).await.unwrap().is_empty());
        assert!(entries.list_ids().await.unwrap().is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_delete_single_entry() {
        let db = Database::connect_in_memory().await.unwrap();
        let entries = FileEntryStore::from(&db);
        let session_id = open_session(&db).await;
        let id = entries.insert(&sample_entry(session_id)).await.unwrap();
        entries.delete(id).await.unwrap();
        entries.delete(id).await.unwrap();
        assert!(entries.list_ids().await.unwrap().is_empty());
        db.close().await;
    }
}
