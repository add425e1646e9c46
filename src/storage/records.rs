use crate::domain::message::{Message, MessageId};
use time::OffsetDateTime;

/// Row shape for the Postgres backend.
#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: i64,
    pub(crate) content: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) origin: Option<String>,
    pub(crate) user_agent: Option<String>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: MessageId(record.id),
            content: record.content,
            created_at: record.created_at,
            origin: record.origin,
            user_agent: record.user_agent,
        }
    }
}
