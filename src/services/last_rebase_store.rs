//! Last rebase store
//!
//! Durable singleton holding the delay (in seconds) drawn by the previous
//! cycle. Absence is valid and means no cycle has completed yet.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use std::path::{Path, PathBuf};

use crate::entities::{last_rebase, prelude::*};

/// Error types for the persistence layer
#[derive(Debug)]
pub enum StoreError {
    DatabaseError(String),
    IoError(String),
    CorruptRecord(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            StoreError::IoError(msg) => write!(f, "IO error: {}", msg),
            StoreError::CorruptRecord(msg) => write!(f, "Corrupt record: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait LastRebaseStore: Send + Sync {
    async fn get(&self) -> Result<Option<u64>, StoreError>;

    /// Overwrite the singleton
    async fn set(&self, seconds: u64) -> Result<(), StoreError>;
}

/// LastRebaseStore backed by the last_rebase table
pub struct DbLastRebaseStore {
    db: DatabaseConnection,
}

impl DbLastRebaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn current(&self) -> Result<Option<last_rebase::Model>, StoreError> {
        LastRebase::find()
            .order_by_asc(last_rebase::Column::Id)
            .one(&self.db)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query last_rebase: {}", e)))
    }
}

#[async_trait]
impl LastRebaseStore for DbLastRebaseStore {
    async fn get(&self) -> Result<Option<u64>, StoreError> {
        let Some(record) = self.current().await? else {
            return Ok(None);
        };

        record
            .seconds
            .map(|seconds| {
                u64::try_from(seconds).map_err(|_| {
                    StoreError::CorruptRecord(format!("last_rebase.seconds is negative: {}", seconds))
                })
            })
            .transpose()
    }

    async fn set(&self, seconds: u64) -> Result<(), StoreError> {
        let seconds = i32::try_from(seconds).map_err(|_| {
            StoreError::CorruptRecord(format!("{} seconds does not fit last_rebase.seconds", seconds))
        })?;

        match self.current().await? {
            Some(record) => {
                let mut active_model: last_rebase::ActiveModel = record.into();
                active_model.seconds = Set(Some(seconds));
                active_model.update(&self.db).await.map_err(|e| {
                    StoreError::DatabaseError(format!("Failed to update last_rebase: {}", e))
                })?;
            }
            None => {
                let new_record = last_rebase::ActiveModel {
                    seconds: Set(Some(seconds)),
                    ..Default::default()
                };
                new_record.insert(&self.db).await.map_err(|e| {
                    StoreError::DatabaseError(format!("Failed to insert last_rebase: {}", e))
                })?;
            }
        }

        tracing::debug!(seconds = seconds, "Stored last rebase seconds");
        Ok(())
    }
}

/// LastRebaseStore backed by a plain text file holding one integer
pub struct FileLastRebaseStore {
    path: PathBuf,
}

impl FileLastRebaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LastRebaseStore for FileLastRebaseStore {
    async fn get(&self) -> Result<Option<u64>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::IoError(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        trimmed.parse::<u64>().map(Some).map_err(|e| {
            StoreError::CorruptRecord(format!("{} holds '{}': {}", self.path.display(), trimmed, e))
        })
    }

    async fn set(&self, seconds: u64) -> Result<(), StoreError> {
        let temp = self.temp_path();

        tokio::fs::write(&temp, seconds.to_string())
            .await
            .map_err(|e| StoreError::IoError(format!("Failed to write {}: {}", temp.display(), e)))?;

        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            StoreError::IoError(format!(
                "Failed to move {} to {}: {}",
                temp.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), seconds = seconds, "Stored last rebase seconds");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn row(id: i32, seconds: Option<i32>) -> last_rebase::Model {
        last_rebase::Model { id, seconds }
    }

    fn statements(store: DbLastRebaseStore) -> Vec<String> {
        store
            .db
            .into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().iter().map(|s| s.sql.clone()).collect::<Vec<_>>())
            .collect()
    }

    #[tokio::test]
    async fn test_db_store_get_absent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<last_rebase::Model>::new()])
            .into_connection();
        let store = DbLastRebaseStore::new(db);

        assert_eq!(store.get().await.unwrap(), None);

        let sql = statements(store);
        assert_eq!(sql.len(), 1);
        assert!(sql[0].contains(r#""id" ASC"#), "{}", sql[0]);
    }

    #[tokio::test]
    async fn test_db_store_get_existing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(1, Some(43_210))]])
            .into_connection();
        let store = DbLastRebaseStore::new(db);

        assert_eq!(store.get().await.unwrap(), Some(43_210));
    }

    #[tokio::test]
    async fn test_db_store_negative_seconds_is_corrupt() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(1, Some(-5))]])
            .into_connection();
        let store = DbLastRebaseStore::new(db);

        assert!(matches!(store.get().await, Err(StoreError::CorruptRecord(_))));
    }

    #[tokio::test]
    async fn test_db_store_set_inserts_when_empty() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<last_rebase::Model>::new()])
            .append_query_results([vec![row(1, Some(42))]])
            .into_connection();
        let store = DbLastRebaseStore::new(db);

        store.set(42).await.unwrap();

        let sql = statements(store);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("SELECT"), "{}", sql[0]);
        assert!(sql[1].starts_with("INSERT INTO \"last_rebase\""), "{}", sql[1]);
    }

    #[tokio::test]
    async fn test_db_store_set_updates_first_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(1, Some(10))]])
            .append_query_results([vec![row(1, Some(42))]])
            .into_connection();
        let store = DbLastRebaseStore::new(db);

        store.set(42).await.unwrap();

        let sql = statements(store);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains(r#""id" ASC"#), "{}", sql[0]);
        assert!(sql[1].starts_with("UPDATE \"last_rebase\""), "{}", sql[1]);
        assert!(sql[1].contains(r#""id" = "#), "{}", sql[1]);
    }

    #[tokio::test]
    async fn test_db_store_set_rejects_oversized_seconds() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = DbLastRebaseStore::new(db);

        assert!(matches!(
            store.set(u64::from(u32::MAX)).await,
            Err(StoreError::CorruptRecord(_))
        ));
        assert!(statements(store).is_empty());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLastRebaseStore::new(dir.path().join("last_rebase"));
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLastRebaseStore::new(dir.path().join("last_rebase"));

        store.set(43_210).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(43_210));

        store.set(7).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(7));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_rebase");
        std::fs::write(&path, "yesterday").unwrap();

        let store = FileLastRebaseStore::new(&path);
        assert!(matches!(store.get().await, Err(StoreError::CorruptRecord(_))));
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::DatabaseError("test".to_string());
        assert!(err.to_string().contains("Database error"));
    }
}
