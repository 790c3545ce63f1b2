use std::future::Future;

use chrono::Utc;

use super::{Sender, SqliteStore, dao::ChatHistory, from_db_time, parse_enum, to_db_time};

#[derive(Debug, Clone)]
pub struct NewHistory {
    pub chat_session_id: i64,
    pub user_id: i64,
    pub message: String,
    pub sender: Sender,
    pub metadata: serde_json::Value,
}

pub trait HistoryStore: Send + Sync + 'static {
    fn append_history(
        &self,
        entry: NewHistory,
    ) -> impl Future<Output = Result<ChatHistory, sqlx::Error>> + Send;
    /// Every turn of a session in creation order.
    fn list_history(
        &self,
        session_id: i64,
    ) -> impl Future<Output = Result<Vec<ChatHistory>, sqlx::Error>> + Send;
    fn count_history(&self, session_id: i64) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

impl HistoryStore for SqliteStore {
    async fn append_history(&self, entry: NewHistory) -> Result<ChatHistory, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO chat_histories (chat_session_id, user_id, message, sender, metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(entry.chat_session_id)
        .bind(entry.user_id)
        .bind(&entry.message)
        .bind(entry.sender.as_ref())
        .bind(entry.metadata.to_string())
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;

        Ok(ChatHistory {
            id: result.last_insert_rowid(),
            chat_session_id: entry.chat_session_id,
            user_id: entry.user_id,
            message: entry.message,
            sender: entry.sender,
            metadata: entry.metadata,
            created_at: now,
        })
    }

    async fn list_history(&self, session_id: i64) -> Result<Vec<ChatHistory>, sqlx::Error> {
        let rows: Vec<(i64, i64, i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, chat_session_id, user_id, message, sender, metadata, created_at \
             FROM chat_histories WHERE chat_session_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, chat_session_id, user_id, message, sender, metadata, created_at)| ChatHistory {
                id,
                chat_session_id,
                user_id,
                message,
                sender: parse_enum(&sender, "chat_histories.sender", Sender::User),
                metadata: serde_json::from_str(&metadata).unwrap_or_else(|e| {
                    tracing::warn!(history_id = id, error = %e, "invalid metadata JSON in chat history");
                    serde_json::Value::Object(Default::default())
                }),
                created_at: from_db_time(&created_at, "chat_histories.created_at"),
            })
            .collect())
    }

    async fn count_history(&self, session_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_histories WHERE chat_session_id = ?1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
