//! State Store (C2) backends.
//!
//! `StateBackend<D>` is the persistence seam behind the single-writer
//! critical section in [`crate::Store`]: `load` returns the last persisted
//! snapshot plus its version, and `save` writes a new snapshot only if the
//! caller's `expected_version` still matches what's on disk, returning
//! `StoreError::Conflict` otherwise. Two implementations are provided: a
//! JSON file with atomic rename (single-node / dev), and a SQLite table
//! guarded by a `WHERE version = ?` compare-and-swap (the teacher's
//! runtime-tokio-native-tls + sqlite feature set).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::error::StoreError;

#[async_trait]
pub trait StateBackend<D>: Send + Sync
where
    D: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Option<(D, u64)>, StoreError>;

    /// Persist `data` as the new snapshot if `expected_version` matches the
    /// backend's current version (0 means "no snapshot exists yet").
    /// Returns the new version on success.
    async fn save(&self, data: &D, expected_version: u64) -> Result<u64, StoreError>;
}

#[derive(Serialize, serde::Deserialize)]
struct Envelope<D> {
    version: u64,
    data: D,
}

/// Single JSON file, written via temp-file-then-rename so a crash never
/// leaves a half-written snapshot on disk.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl<D> StateBackend<D> for JsonFileBackend
where
    D: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Option<(D, u64)>, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Ok(None);
            }
            let bytes = std::fs::read(&path)?;
            let envelope: Envelope<D> = serde_json::from_slice(&bytes)?;
            Ok(Some((envelope.data, envelope.version)))
        })
        .await
        .expect("blocking load task panicked")
    }

    async fn save(&self, data: &D, expected_version: u64) -> Result<u64, StoreError>
    where
        D: Serialize,
    {
        let path = self.path.clone();
        let current_version = match <Self as StateBackend<D>>::load(self).await? {
            Some((_, version)) => version,
            None => 0,
        };
        if current_version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: current_version,
            });
        }
        let new_version = current_version + 1;
        let bytes = serde_json::to_vec_pretty(&serde_json::json!({
            "version": new_version,
            "data": data,
        }))?;

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp_path = path.with_extension("tmp");
            std::fs::write(&tmp_path, &bytes)?;
            std::fs::rename(&tmp_path, &path)?;
            Ok::<_, std::io::Error>(())
        })
        .await
        .expect("blocking save task panicked")?;

        Ok(new_version)
    }
}

/// Single-row SQLite table guarded by optimistic concurrency on `version`.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS state_snapshot (\
                id INTEGER PRIMARY KEY CHECK (id = 1), \
                version INTEGER NOT NULL, \
                data TEXT NOT NULL\
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl<D> StateBackend<D> for SqliteBackend
where
    D: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Option<(D, u64)>, StoreError> {
        let row = sqlx::query("SELECT version, data FROM state_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let version: i64 = row.try_get("version")?;
                let data: String = row.try_get("data")?;
                let data: D = serde_json::from_str(&data)?;
                Ok(Some((data, version as u64)))
            }
        }
    }

    async fn save(&self, data: &D, expected_version: u64) -> Result<u64, StoreError> {
        let new_version = expected_version + 1;
        let json = serde_json::to_string(data)?;

        if expected_version == 0 {
            let result = sqlx::query(
                "INSERT INTO state_snapshot (id, version, data) VALUES (1, ?, ?) \
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(new_version as i64)
            .bind(&json)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                let (_, actual) = <Self as StateBackend<D>>::load(self)
                    .await?
                    .expect("row must exist after failed insert");
                return Err(StoreError::Conflict {
                    expected: expected_version,
                    actual,
                });
            }
            return Ok(new_version);
        }

        let result = sqlx::query(
            "UPDATE state_snapshot SET version = ?, data = ? WHERE id = 1 AND version = ?",
        )
        .bind(new_version as i64)
        .bind(&json)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let actual = match <Self as StateBackend<D>>::load(self).await? {
                Some((_, version)) => version,
                None => 0,
            };
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual,
            });
        }

        Ok(new_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    struct Doc {
        counter: u64,
    }

    #[tokio::test]
    async fn json_backend_round_trips_and_detects_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("state.json"));

        assert!(StateBackend::<Doc>::load(&backend).await.unwrap().is_none());

        let v1 = backend.save(&Doc { counter: 1 }, 0).await.unwrap();
        assert_eq!(v1, 1);

        let (loaded, version) = StateBackend::<Doc>::load(&backend)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, Doc { counter: 1 });
        assert_eq!(version, 1);

        // Stale expected_version is rejected.
        let err = backend.save(&Doc { counter: 2 }, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let v2 = backend.save(&Doc { counter: 2 }, 1).await.unwrap();
        assert_eq!(v2, 2);
    }

    #[tokio::test]
    async fn sqlite_backend_round_trips_and_detects_conflict() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();

        assert!(StateBackend::<Doc>::load(&backend).await.unwrap().is_none());

        let v1 = backend.save(&Doc { counter: 1 }, 0).await.unwrap();
        assert_eq!(v1, 1);

        let err = backend.save(&Doc { counter: 9 }, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let v2 = backend.save(&Doc { counter: 2 }, 1).await.unwrap();
        assert_eq!(v2, 2);
    }
}
