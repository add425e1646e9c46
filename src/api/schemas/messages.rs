use crate::domain::message::Message;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(alias = "content")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self { id: message.id.0, content: message.content, created_at: message.created_at }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub success: bool,
    pub message: MessageResponse,
    /// Character count of the stored content.
    pub length: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Vec<MessageResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteMessageResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub success: bool,
    pub deleted: u64,
}
