use std::future::Future;

use chrono::{DateTime, Utc};

use super::{
    ChatType, Role, SqliteStore, dao::ChatSession, from_db_time, parse_enum, parse_json_list,
    to_db_time,
};
use crate::persona::Persona;

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub title: String,
    pub chat_type: ChatType,
    pub persona: Option<Persona>,
}

pub trait SessionStore: Send + Sync + 'static {
    fn create_session(
        &self,
        session: NewSession,
    ) -> impl Future<Output = Result<ChatSession, sqlx::Error>> + Send;
    fn get_session(&self, id: i64) -> impl Future<Output = Result<Option<ChatSession>, sqlx::Error>> + Send;
    /// Sessions owned by `user_id`, most recent activity first.
    fn list_owned_sessions(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ChatSession>, sqlx::Error>> + Send;
    /// Shared sessions owned by anyone other than `user_id`.
    fn list_foreign_shared_sessions(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ChatSession>, sqlx::Error>> + Send;
    /// `true` when `user_id` already has a session titled `title` (other than `except_id`).
    fn title_taken(
        &self,
        user_id: i64,
        title: &str,
        except_id: Option<i64>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn update_session_details(
        &self,
        id: i64,
        title: &str,
        is_shared: bool,
        shared_with_roles: &[Role],
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Last-write-wins bump of `last_activity_at`.
    fn touch_session(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn delete_session(&self, id: i64) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    title: String,
    chat_type: String,
    persona: Option<String>,
    is_shared: bool,
    shared_with_roles: String,
    last_activity_at: String,
    created_at: String,
    updated_at: String,
}

impl From<SessionRow> for ChatSession {
    fn from(row: SessionRow) -> Self {
        let shared_with_roles = parse_json_list(&row.shared_with_roles, "chat_sessions.shared_with_roles")
            .iter()
            .filter_map(|r| r.parse::<Role>().ok())
            .collect();
        ChatSession {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            chat_type: parse_enum(&row.chat_type, "chat_sessions.chat_type", ChatType::Global),
            persona: row.persona.and_then(|p| p.parse().ok()),
            is_shared: row.is_shared,
            shared_with_roles,
            last_activity_at: from_db_time(&row.last_activity_at, "chat_sessions.last_activity_at"),
            created_at: from_db_time(&row.created_at, "chat_sessions.created_at"),
            updated_at: from_db_time(&row.updated_at, "chat_sessions.updated_at"),
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, title, chat_type, persona, is_shared, \
     shared_with_roles, last_activity_at, created_at, updated_at";

fn roles_json(roles: &[Role]) -> String {
    let names: Vec<&str> = roles.iter().map(|r| r.as_ref()).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_owned())
}

impl SessionStore for SqliteStore {
    async fn create_session(&self, session: NewSession) -> Result<ChatSession, sqlx::Error> {
        let now = Utc::now();
        let stamp = to_db_time(now);
        let result = sqlx::query(
            "INSERT INTO chat_sessions \
             (user_id, title, chat_type, persona, is_shared, shared_with_roles, last_activity_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 0, '[]', ?5, ?5, ?5)",
        )
        .bind(session.user_id)
        .bind(&session.title)
        .bind(session.chat_type.as_ref())
        .bind(session.persona.map(|p| p.as_ref().to_owned()))
        .bind(&stamp)
        .execute(&self.pool)
        .await?;

        Ok(ChatSession {
            id: result.last_insert_rowid(),
            user_id: session.user_id,
            title: session.title,
            chat_type: session.chat_type,
            persona: session.persona,
            is_shared: false,
            shared_with_roles: Vec::new(),
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_session(&self, id: i64) -> Result<Option<ChatSession>, sqlx::Error> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ChatSession::from))
    }

    async fn list_owned_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>, sqlx::Error> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = ?1 \
             ORDER BY last_activity_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChatSession::from).collect())
    }

    async fn list_foreign_shared_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>, sqlx::Error> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE is_shared = 1 AND user_id != ?1 \
             ORDER BY last_activity_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChatSession::from).collect())
    }

    async fn title_taken(
        &self,
        user_id: i64,
        title: &str,
        except_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_sessions WHERE user_id = ?1 AND title = ?2 \
             AND (?3 IS NULL OR id != ?3)",
        )
        .bind(user_id)
        .bind(title)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn update_session_details(
        &self,
        id: i64,
        title: &str,
        is_shared: bool,
        shared_with_roles: &[Role],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE chat_sessions SET title = ?1, is_shared = ?2, shared_with_roles = ?3, \
             updated_at = ?4 WHERE id = ?5",
        )
        .bind(title)
        .bind(is_shared)
        .bind(roles_json(shared_with_roles))
        .bind(to_db_time(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_session(&self, id: i64, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let stamp = to_db_time(at);
        sqlx::query("UPDATE chat_sessions SET last_activity_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(&stamp)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM chat_sessions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{NewUser, UserStore};

    async fn store_with_owner() -> (SqliteStore, i64) {
        let store = SqliteStore::in_memory().await.unwrap();
        let owner = store
            .insert_user(NewUser {
                name: "Eka".into(),
                email: "eka@example.com".into(),
                password_hash: "x".into(),
                role: Role::Engineer,
            })
            .await
            .unwrap();
        (store, owner.id)
    }

    #[tokio::test]
    async fn shared_roles_persist_as_json() {
        let (store, owner) = store_with_owner().await;
        let session = store
            .create_session(NewSession {
                user_id: owner,
                title: "Rencana".into(),
                chat_type: ChatType::Persona,
                persona: Some(Persona::Engineer),
            })
            .await
            .unwrap();

        store
            .update_session_details(session.id, "Rencana", true, &[Role::Engineer, Role::Esr])
            .await
            .unwrap();

        let fetched = store.get_session(session.id).await.unwrap().unwrap();
        assert!(fetched.is_shared);
        assert_eq!(fetched.shared_with_roles, vec![Role::Engineer, Role::Esr]);
        assert_eq!(fetched.persona, Some(Persona::Engineer));
    }

    #[tokio::test]
    async fn title_is_unique_per_owner() {
        let (store, owner) = store_with_owner().await;
        let s = store
            .create_session(NewSession {
                user_id: owner,
                title: "Chat Global".into(),
                chat_type: ChatType::Global,
                persona: None,
            })
            .await
            .unwrap();
        assert!(store.title_taken(owner, "Chat Global", None).await.unwrap());
        assert!(!store.title_taken(owner, "Chat Global", Some(s.id)).await.unwrap());
        assert!(!store.title_taken(owner + 1, "Chat Global", None).await.unwrap());
    }
}
