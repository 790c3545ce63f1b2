use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// A row in the `chat_histories` table. Append-only.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatHistory {
    pub id: i64,
    pub chat_session_id: i64,
    pub user_id: i64,
    pub message: String,
    pub sender: Sender,
    /// Images, error flag, persona, timestamps.
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ChatHistory {
    /// `true` for AI turns that carry a canned error reply.
    pub fn is_error_reply(&self) -> bool {
        self.sender == Sender::Ai
            && self
                .metadata
                .get("error")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
    }
}
