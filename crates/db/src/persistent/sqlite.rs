//! SQLite implementation of [`SnapshotDb`]. Snapshots are opaque blobs keyed by namespace and
//! height.

use std::future::Future;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use super::{config::DbConfig, errors::StorageError};
use crate::{errors::DbResult, snapshot::SnapshotDb};

/// A [`SnapshotDb`] backed by a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
    config: DbConfig,
}

impl SqliteDb {
    /// Wraps `pool`, creating the snapshot table if it does not exist yet.
    pub async fn new(pool: SqlitePool, config: DbConfig) -> DbResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                namespace TEXT NOT NULL,
                height INTEGER NOT NULL,
                state BLOB NOT NULL,
                PRIMARY KEY (namespace, height)
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(StorageError::from)?;

        Ok(Self { pool, config })
    }

    /// Runs `op`, retrying transient failures as configured.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.max_retry_count() && is_transient(&e) => {
                    attempt += 1;
                    warn!(%what, %attempt, %e, "transient database error, retrying");
                    tokio::time::sleep(self.config.backoff_period()).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => {
            let message = db.message();
            message.contains("locked") || message.contains("busy")
        }
        _ => false,
    }
}

fn to_db_height(height: u64) -> Result<i64, StorageError> {
    i64::try_from(height).map_err(|_| StorageError::InvalidData(format!("height {height}")))
}

fn from_db_height(height: i64) -> Result<u64, StorageError> {
    u64::try_from(height).map_err(|_| StorageError::InvalidData(format!("height {height}")))
}

#[async_trait]
impl SnapshotDb for SqliteDb {
    async fn put_snapshot(&self, namespace: &str, height: u64, state: Vec<u8>) -> DbResult<()> {
        let db_height = to_db_height(height)?;

        self.with_retries("put snapshot", || {
            sqlx::query(
                "INSERT OR REPLACE INTO snapshots (namespace, height, state) VALUES (?, ?, ?)",
            )
            .bind(namespace)
            .bind(db_height)
            .bind(state.as_slice())
            .execute(&self.pool)
        })
        .await?;

        debug!(%namespace, %height, "stored snapshot");

        Ok(())
    }

    async fn get_snapshot(&self, namespace: &str, height: u64) -> DbResult<Option<Vec<u8>>> {
        let db_height = to_db_height(height)?;

        let row = self
            .with_retries("get snapshot", || {
                sqlx::query("SELECT state FROM snapshots WHERE namespace = ? AND height = ?")
                    .bind(namespace)
                    .bind(db_height)
                    .fetch_optional(&self.pool)
            })
            .await?;

        let state = row
            .map(|row| row.try_get::<Vec<u8>, _>("state"))
            .transpose()
            .map_err(StorageError::from)?;

        Ok(state)
    }

    async fn latest_snapshot(&self, namespace: &str) -> DbResult<Option<(u64, Vec<u8>)>> {
        let row = self
            .with_retries("latest snapshot", || {
                sqlx::query(
                    "SELECT height, state FROM snapshots WHERE namespace = ? \
                     ORDER BY height DESC LIMIT 1",
                )
                .bind(namespace)
                .fetch_optional(&self.pool)
            })
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let height: i64 = row.try_get("height").map_err(StorageError::from)?;
        let state: Vec<u8> = row.try_get("state").map_err(StorageError::from)?;

        Ok(Some((from_db_height(height)?, state)))
    }

    async fn prune_below(&self, namespace: &str, height: u64) -> DbResult<u64> {
        let db_height = to_db_height(height)?;

        let result = self
            .with_retries("prune snapshots", || {
                sqlx::query("DELETE FROM snapshots WHERE namespace = ? AND height < ?")
                    .bind(namespace)
                    .bind(db_height)
                    .execute(&self.pool)
            })
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    use super::*;
    use crate::snapshot::{load, load_latest, save};

    async fn memory_db() -> SqliteDb {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteDb::new(pool, DbConfig::default().with_max_retry_count(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn snapshots_round_trip() {
        let db = memory_db().await;

        save(&db, "coordinator", 1, &vec![1u64, 2, 3]).await.unwrap();
        save(&db, "coordinator", 2, &vec![4u64]).await.unwrap();
        save(&db, "coordinator", 2, &vec![5u64]).await.unwrap();

        let first: Option<Vec<u64>> = load(&db, "coordinator", 1).await.unwrap();
        assert_eq!(first, Some(vec![1, 2, 3]));

        let latest: Option<(u64, Vec<u64>)> = load_latest(&db, "coordinator").await.unwrap();
        assert_eq!(latest, Some((2, vec![5])));

        let none: Option<Vec<u64>> = load(&db, "consumer/osmo", 1).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn prune_deletes_older_snapshots() {
        let db = memory_db().await;
        for height in 10..15 {
            db.put_snapshot("coordinator", height, vec![0]).await.unwrap();
        }

        assert_eq!(db.prune_below("coordinator", 13).await.unwrap(), 3);
        assert!(db.get_snapshot("coordinator", 12).await.unwrap().is_none());
        assert!(db.get_snapshot("coordinator", 13).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn snapshots_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("snapshots.db"))
            .create_if_missing(true);

        {
            let pool = SqlitePoolOptions::new()
                .connect_with(options.clone())
                .await
                .unwrap();
            let db = SqliteDb::new(pool.clone(), DbConfig::default()).await.unwrap();
            save(&db, "coordinator", 7, &"state".to_owned()).await.unwrap();
            pool.close().await;
        }

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .unwrap();
        let db = SqliteDb::new(
            pool,
            DbConfig::default().with_backoff_period(Duration::from_millis(1)),
        )
        .await
        .unwrap();
        let latest: Option<(u64, String)> = load_latest(&db, "coordinator").await.unwrap();
        assert_eq!(latest, Some((7, "state".to_owned())));
    }
}
