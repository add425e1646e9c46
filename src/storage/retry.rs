use super::{MessageStorage, StorageError};
use crate::config::StorageConfig;
use crate::domain::message::{Message, MessageId, NewMessage};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            min_delay: Duration::from_millis(config.min_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Retries reads and pings on transient faults with bounded exponential backoff.
///
/// Writes are passed through untouched: a retried insert could store the
/// message twice, and a retried delete could misreport whether it removed anything.
#[derive(Debug)]
pub struct RetryingStorage {
    inner: Arc<dyn MessageStorage>,
    policy: RetryPolicy,
}

impl RetryingStorage {
    #[must_use]
    pub fn new(inner: Arc<dyn MessageStorage>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn log_retry(operation: &'static str) -> impl FnMut(&StorageError, Duration) {
        move |e, delay| {
            tracing::warn!(error = %e, operation, delay_ms = %delay.as_millis(), "Transient storage fault, retrying");
        }
    }
}

#[async_trait]
impl MessageStorage for RetryingStorage {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn insert_record(&self, message: NewMessage) -> Result<Message, StorageError> {
        self.inner.insert_record(message).await
    }

    async fn query_all(&self, limit: Option<i64>) -> Result<Vec<Message>, StorageError> {
        (|| self.inner.query_all(limit))
            .retry(self.policy.backoff())
            .when(StorageError::is_transient)
            .notify(Self::log_retry("query_all"))
            .await
    }

    async fn query_count(&self) -> Result<i64, StorageError> {
        (|| self.inner.query_count())
            .retry(self.policy.backoff())
            .when(StorageError::is_transient)
            .notify(Self::log_retry("query_count"))
            .await
    }

    async fn delete_one(&self, id: MessageId) -> Result<bool, StorageError> {
        self.inner.delete_one(id).await
    }

    async fn delete_all(&self, reset_sequence: bool) -> Result<u64, StorageError> {
        self.inner.delete_all(reset_sequence).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        (|| self.inner.ping())
            .retry(self.policy.backoff())
            .when(StorageError::is_transient)
            .notify(Self::log_retry("ping"))
            .await
    }
}
