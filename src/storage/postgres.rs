use super::records::MessageRecord;
use super::{MessageStorage, StorageError};
use crate::config::StorageConfig;
use crate::domain::message::{Message, MessageId, NewMessage};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

/// PostgreSQL backend. Ids come from an identity column, timestamps from `NOW()`.
#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: DbPool,
}

impl PgStorage {
    /// Initializes the connection pool and runs migrations.
    ///
    /// # Errors
    /// Returns an error if the URL is missing, the connection fails, or migrations fail.
    pub async fn connect(config: &StorageConfig) -> anyhow::Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("postgres backend requires a database URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and runs migrations on it.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn from_pool(pool: DbPool) -> anyhow::Result<Self> {
        sqlx::migrate!("./migrations/postgres").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageStorage for PgStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(level = "debug", skip(self, message))]
    async fn insert_record(&self, message: NewMessage) -> Result<Message, StorageError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r"
            INSERT INTO messages (content, origin, user_agent)
            VALUES ($1, $2, $3)
            RETURNING id, content, created_at, origin, user_agent
            ",
        )
        .bind(message.content.as_str())
        .bind(message.meta.origin)
        .bind(message.meta.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn query_all(&self, limit: Option<i64>) -> Result<Vec<Message>, StorageError> {
        // LIMIT NULL is LIMIT ALL.
        let records = sqlx::query_as::<_, MessageRecord>(
            r"
            SELECT id, content, created_at, origin, user_agent
            FROM messages
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            ",
        )
        .bind(limit.map(|l| l.max(0)))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn query_count(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages").fetch_one(&self.pool).await?;
        Ok(count)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_one(&self, id: MessageId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1").bind(id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_all(&self, reset_sequence: bool) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;
        if reset_sequence {
            sqlx::query("SELECT setval(pg_get_serial_sequence('messages', 'id'), 1, false)")
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
