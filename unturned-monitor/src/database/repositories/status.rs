//! Status history repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::ServerStatusDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::datetime_to_ms;
use crate::database::{DbPool, WritePool};
use crate::domain::Snapshot;

/// Append-only snapshot history.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Add one snapshot to the history.
    async fn append(&self, snapshot: &Snapshot) -> Result<()>;
    /// Most recent snapshot by observation time, then insertion order.
    async fn latest(&self) -> Result<Option<Snapshot>>;
    /// Up to `limit` snapshots, newest first.
    async fn history(&self, limit: u32) -> Result<Vec<Snapshot>>;
    /// Delete snapshots observed before `cutoff`. Returns the number removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx implementation of StatusStore.
pub struct SqlxStatusStore {
    pool: DbPool,
    write_pool: WritePool,
}

impl SqlxStatusStore {
    pub fn new(pool: DbPool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }

    /// Use one pool for reads and writes, as tests with `sqlite::memory:` do.
    pub fn with_single_pool(pool: SqlitePool) -> Self {
        Self {
            write_pool: pool.clone(),
            pool,
        }
    }
}

#[async_trait]
impl StatusStore for SqlxStatusStore {
    async fn append(&self, snapshot: &Snapshot) -> Result<()> {
        let row = ServerStatusDbModel::from_snapshot(snapshot);
        retry_on_sqlite_busy("status_append", || async {
            sqlx::query(
                r#"
                INSERT INTO server_status (
                    observed_at, online, player_count, max_players,
                    map_name, server_name, version, latency_ms, failure_reason
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.observed_at)
            .bind(row.online)
            .bind(row.player_count)
            .bind(row.max_players)
            .bind(&row.map_name)
            .bind(&row.server_name)
            .bind(&row.version)
            .bind(row.latency_ms)
            .bind(&row.failure_reason)
            .execute(&self.write_pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn latest(&self) -> Result<Option<Snapshot>> {
        let row = sqlx::query_as::<_, ServerStatusDbModel>(
            "SELECT * FROM server_status ORDER BY observed_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ServerStatusDbModel::into_snapshot))
    }

    async fn history(&self, limit: u32) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query_as::<_, ServerStatusDbModel>(
            "SELECT * FROM server_status ORDER BY observed_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(ServerStatusDbModel::into_snapshot)
            .collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_ms = datetime_to_ms(cutoff);
        retry_on_sqlite_busy("status_prune", || async {
            let result = sqlx::query("DELETE FROM server_status WHERE observed_at < ?")
                .bind(cutoff_ms)
                .execute(&self.write_pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }
}
