use crate::config::MessagingConfig;
use crate::domain::message::{ClientMeta, Message, MessageContent, MessageId, NewMessage};
use crate::error::{AppError, Result};
use crate::storage::MessageStorage;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) created_total: Counter<u64>,
    pub(crate) deleted_total: Counter<u64>,
    pub(crate) list_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("msgdrop-server");
        Self {
            created_total: meter
                .u64_counter("msgdrop_messages_created_total")
                .with_description("Total message insert attempts by outcome")
                .build(),
            deleted_total: meter
                .u64_counter("msgdrop_messages_deleted_total")
                .with_description("Total messages removed")
                .build(),
            list_size: meter
                .u64_histogram("msgdrop_message_list_size")
                .with_description("Number of messages returned by a single list call")
                .build(),
        }
    }
}

/// The message store contract: create, list, count and delete.
#[derive(Clone, Debug)]
pub struct MessageService {
    storage: Arc<dyn MessageStorage>,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(storage: Arc<dyn MessageStorage>, config: MessagingConfig) -> Self {
        Self { storage, config, metrics: Metrics::new() }
    }

    /// Stores a new message and returns the stored record.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the content is empty after trimming.
    /// Returns `AppError::Storage` if the write fails.
    #[tracing::instrument(err(level = "warn"), skip(self, content, meta), fields(backend = self.storage.backend()))]
    pub async fn create(&self, content: &str, meta: ClientMeta) -> Result<Message> {
        let content = MessageContent::parse(content)?;

        match self.storage.insert_record(NewMessage { content, meta }).await {
            Ok(message) => {
                tracing::info!(id = %message.id, "Message stored");
                self.metrics.created_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(message)
            }
            Err(e) => {
                self.metrics.created_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e.into())
            }
        }
    }

    /// Lists messages newest first. The limit is capped at the configured maximum,
    /// which also applies when no limit is given.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if `limit` is negative.
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<Message>> {
        let limit = match limit {
            Some(l) if l < 0 => return Err(AppError::Validation("limit must not be negative".to_string())),
            Some(l) => l.min(self.config.list_max_limit),
            None => self.config.list_max_limit,
        };

        let messages = self.storage.query_all(Some(limit)).await?;
        self.metrics.list_size.record(messages.len() as u64, &[]);
        Ok(messages)
    }

    /// Returns the number of stored messages.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn count(&self) -> Result<i64> {
        Ok(self.storage.query_count().await?)
    }

    /// Deletes a single message. Returns `false` if no message had that id.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the deletion fails.
    #[tracing::instrument(err(level = "warn"), skip(self, id), fields(id = %id))]
    pub async fn delete_by_id(&self, id: MessageId) -> Result<bool> {
        let removed = self.storage.delete_one(id).await?;
        if removed {
            tracing::info!("Message deleted");
            self.metrics.deleted_total.add(1, &[KeyValue::new("scope", "single")]);
        }
        Ok(removed)
    }

    /// Deletes every message once `confirmed` is set. Returns how many were removed.
    ///
    /// # Errors
    /// Returns `AppError::Validation` unless `confirmed` is true.
    /// Returns `AppError::Storage` if the deletion fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_all(&self, confirmed: bool) -> Result<u64> {
        if !confirmed {
            return Err(AppError::Validation("confirmation required".to_string()));
        }

        let removed = self.storage.delete_all(self.config.reset_sequence_on_clear).await?;
        tracing::warn!(removed, reset_sequence = self.config.reset_sequence_on_clear, "All messages deleted");
        self.metrics.deleted_total.add(removed, &[KeyValue::new("scope", "all")]);
        Ok(removed)
    }
}
