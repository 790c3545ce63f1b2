use std::future::Future;

use chrono::Utc;

use super::{SqliteStore, dao::User, to_db_time};

/// Bearer tokens; only the SHA-256 digest of a token is ever stored.
pub trait TokenStore: Send + Sync + 'static {
    fn insert_token(
        &self,
        token_hash: &str,
        user_id: i64,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Resolve a token digest to its user and bump `last_used_at`.
    fn user_for_token(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;
    fn revoke_token(&self, token_hash: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl TokenStore for SqliteStore {
    async fn insert_token(&self, token_hash: &str, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO api_tokens (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(to_db_time(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM api_tokens WHERE token_hash = ?1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        let Some((user_id,)) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE api_tokens SET last_used_at = ?1 WHERE token_hash = ?2")
            .bind(to_db_time(Utc::now()))
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        super::UserStore::get_user(self, user_id).await
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM api_tokens WHERE token_hash = ?1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
