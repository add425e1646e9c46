use crate::config::{StorageBackend, StorageConfig};
use crate::domain::message::{Message, MessageId, NewMessage};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod retry;
pub mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use postgres::PgStorage;
pub use retry::{RetryPolicy, RetryingStorage};
pub use sqlite::SqliteStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Whether the fault is plausibly gone on a second attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            Self::Database(sqlx::Error::Database(e)) => {
                // 08xxx: connection exception, 57P0x: operator intervention (admin shutdown, etc.)
                e.code().is_some_and(|code| code.starts_with("08") || code.starts_with("57P0"))
            }
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// The persistence collaborator behind the message service.
///
/// Implementations own id assignment and `created_at` stamping, and must make
/// `insert_record` atomic: a failed insert leaves nothing visible to readers.
#[async_trait]
pub trait MessageStorage: Send + Sync + fmt::Debug + 'static {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    async fn insert_record(&self, message: NewMessage) -> Result<Message, StorageError>;

    /// Returns records newest first (`created_at` desc, then `id` desc).
    /// `None` returns every record.
    async fn query_all(&self, limit: Option<i64>) -> Result<Vec<Message>, StorageError>;

    async fn query_count(&self) -> Result<i64, StorageError>;

    /// Returns whether a record was removed.
    async fn delete_one(&self, id: MessageId) -> Result<bool, StorageError>;

    /// Removes every record and returns how many were removed. With `reset_sequence`
    /// the next inserted record gets id 1.
    async fn delete_all(&self, reset_sequence: bool) -> Result<u64, StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;
}

/// Opens the configured backend and wraps it in the read retry policy.
///
/// # Errors
/// Returns an error if the backend cannot be opened or migrated.
pub async fn open(config: &StorageConfig) -> anyhow::Result<Arc<dyn MessageStorage>> {
    let storage: Arc<dyn MessageStorage> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::File => Arc::new(FileStorage::open(&config.messages_dir).await?),
        StorageBackend::Sqlite => Arc::new(SqliteStorage::connect(config).await?),
        StorageBackend::Postgres => Arc::new(PgStorage::connect(config).await?),
    };

    tracing::info!(backend = storage.backend(), "message storage ready");

    if config.retry_attempts == 0 {
        return Ok(storage);
    }

    Ok(Arc::new(RetryingStorage::new(storage, RetryPolicy::from_config(config))))
}

/// Applies a list limit to an already-sorted vector.
pub(crate) fn apply_limit(messages: &mut Vec<Message>, limit: Option<i64>) {
    if let Some(limit) = limit {
        messages.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    }
}
