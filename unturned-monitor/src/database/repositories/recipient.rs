//! Recipient repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::RecipientDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::{DbPool, WritePool};
use crate::domain::{Recipient, RecipientKey};
use crate::{Error, Result};

/// Recipient repository trait.
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    async fn get_recipient(&self, key: &RecipientKey) -> Result<Option<Recipient>>;
    /// All recipients, disabled ones included, ordered by id then channel.
    async fn list_recipients(&self) -> Result<Vec<Recipient>>;
    /// Insert or replace the whole record. `created_at` of an existing row is kept.
    async fn upsert_recipient(&self, recipient: &Recipient) -> Result<()>;
}

/// SQLx implementation of RecipientRepository.
pub struct SqlxRecipientRepository {
    pool: DbPool,
    write_pool: WritePool,
}

impl SqlxRecipientRepository {
    pub fn new(pool: DbPool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }

    pub fn with_single_pool(pool: SqlitePool) -> Self {
        Self {
            write_pool: pool.clone(),
            pool,
        }
    }
}

#[async_trait]
impl RecipientRepository for SqlxRecipientRepository {
    async fn get_recipient(&self, key: &RecipientKey) -> Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, RecipientDbModel>(
            "SELECT * FROM recipient WHERE id = ? AND channel = ?",
        )
        .bind(&key.id)
        .bind(key.channel.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Recipient::try_from).transpose()
    }

    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        let rows = sqlx::query_as::<_, RecipientDbModel>(
            "SELECT * FROM recipient ORDER BY id, channel",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Recipient::try_from).collect()
    }

    async fn upsert_recipient(&self, recipient: &Recipient) -> Result<()> {
        if recipient.id.trim().is_empty() {
            return Err(Error::validation("recipient id must not be empty"));
        }

        let row = RecipientDbModel::from(recipient);
        retry_on_sqlite_busy("recipient_upsert", || async {
            sqlx::query(
                r#"
                INSERT INTO recipient (
                    id, channel, wants_online, wants_offline,
                    wants_capacity_warnings, enabled, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id, channel) DO UPDATE SET
                    wants_online = excluded.wants_online,
                    wants_offline = excluded.wants_offline,
                    wants_capacity_warnings = excluded.wants_capacity_warnings,
                    enabled = excluded.enabled,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&row.id)
            .bind(&row.channel)
            .bind(row.wants_online)
            .bind(row.wants_offline)
            .bind(row.wants_capacity_warnings)
            .bind(row.enabled)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.write_pool)
            .await?;
            Ok(())
        })
        .await
    }
}
