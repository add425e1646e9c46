use super::{MessageStorage, StorageError};
use crate::config::StorageConfig;
use crate::domain::message::{Message, MessageId, NewMessage};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Row shape for SQLite, which stores `created_at` as unix nanoseconds.
#[derive(Debug, sqlx::FromRow)]
struct SqliteRecord {
    id: i64,
    content: String,
    created_at: i64,
    origin: Option<String>,
    user_agent: Option<String>,
}

impl TryFrom<SqliteRecord> for Message {
    type Error = StorageError;

    fn try_from(record: SqliteRecord) -> Result<Self, Self::Error> {
        let created_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(record.created_at))
            .map_err(|e| StorageError::Corrupt(format!("message {} has invalid timestamp: {e}", record.id)))?;
        Ok(Self {
            id: MessageId(record.id),
            content: record.content,
            created_at,
            origin: record.origin,
            user_agent: record.user_agent,
        })
    }
}

fn to_unix_nanos(at: OffsetDateTime) -> Result<i64, StorageError> {
    i64::try_from(at.unix_timestamp_nanos()).map_err(|_| StorageError::Corrupt(format!("timestamp {at} out of range")))
}

/// Embedded SQLite backend. `AUTOINCREMENT` keeps ids from being reused.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Opens (or creates) the database named by `database_url` and runs migrations.
    ///
    /// # Errors
    /// Returns an error if the URL is missing or invalid, or the database cannot be opened or migrated.
    pub async fn connect(config: &StorageConfig) -> anyhow::Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("sqlite backend requires a database URL"))?;

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every pooled connection to `:memory:` would get its own empty database.
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { config.max_connections })
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and runs migrations on it.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::migrate!("./migrations/sqlite").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn insert_at(&self, message: NewMessage, created_at: OffsetDateTime) -> Result<Message, StorageError> {
        let record = sqlx::query_as::<_, SqliteRecord>(
            r"
            INSERT INTO messages (content, created_at, origin, user_agent)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, content, created_at, origin, user_agent
            ",
        )
        .bind(message.content.as_str())
        .bind(to_unix_nanos(created_at)?)
        .bind(message.meta.origin)
        .bind(message.meta.user_agent)
        .fetch_one(&self.pool)
        .await?;

        record.try_into()
    }
}

#[async_trait]
impl MessageStorage for SqliteStorage {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    #[tracing::instrument(level = "debug", skip(self, message))]
    async fn insert_record(&self, message: NewMessage) -> Result<Message, StorageError> {
        self.insert_at(message, OffsetDateTime::now_utc()).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn query_all(&self, limit: Option<i64>) -> Result<Vec<Message>, StorageError> {
        // SQLite treats a negative LIMIT as unbounded.
        let records = sqlx::query_as::<_, SqliteRecord>(
            r"
            SELECT id, content, created_at, origin, user_agent
            FROM messages
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            ",
        )
        .bind(limit.map_or(-1, |l| l.max(0)))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn query_count(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages").fetch_one(&self.pool).await?;
        Ok(count)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_one(&self, id: MessageId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?1").bind(id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_all(&self, reset_sequence: bool) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;
        if reset_sequence {
            sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'messages'").execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
