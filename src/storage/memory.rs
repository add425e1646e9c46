use super::{MessageStorage, StorageError, apply_limit};
use crate::domain::message::{Message, MessageId, NewMessage};
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    messages: BTreeMap<MessageId, Message>,
}

/// Process-local backend. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStorage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_record(&self, message: NewMessage) -> Result<Message, StorageError> {
        let mut state = self.state.write().await;
        state.last_id += 1;

        let record = Message {
            id: MessageId(state.last_id),
            content: message.content.into_inner(),
            created_at: OffsetDateTime::now_utc(),
            origin: message.meta.origin,
            user_agent: message.meta.user_agent,
        };
        state.messages.insert(record.id, record.clone());

        Ok(record)
    }

    async fn query_all(&self, limit: Option<i64>) -> Result<Vec<Message>, StorageError> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state.messages.values().cloned().collect();
        messages.sort_by(Message::newest_first);
        apply_limit(&mut messages, limit);
        Ok(messages)
    }

    async fn query_count(&self) -> Result<i64, StorageError> {
        let state = self.state.read().await;
        i64::try_from(state.messages.len()).map_err(|_| StorageError::Corrupt("record count overflow".into()))
    }

    async fn delete_one(&self, id: MessageId) -> Result<bool, StorageError> {
        Ok(self.state.write().await.messages.remove(&id).is_some())
    }

    async fn delete_all(&self, reset_sequence: bool) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let removed = state.messages.len() as u64;
        state.messages.clear();
        if reset_sequence {
            state.last_id = 0;
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
