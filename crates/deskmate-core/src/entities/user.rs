use std::future::Future;

use chrono::Utc;

use super::{SqliteStore, dao::User, from_db_time, parse_enum, to_db_time, Role};

/// Insert/update payload for a user row; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

pub trait UserStore: Send + Sync + 'static {
    fn insert_user(&self, user: NewUser) -> impl Future<Output = Result<User, sqlx::Error>> + Send;
    fn get_user(&self, id: i64) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;
    /// `true` when another user (not `except_id`) already owns `email`.
    fn email_taken(
        &self,
        email: &str,
        except_id: Option<i64>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<(Vec<User>, i64), sqlx::Error>> + Send;
    fn count_users(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
    /// Updates every column; `password_hash = None` keeps the stored hash.
    fn update_user(
        &self,
        id: i64,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn delete_user(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: parse_enum(&row.role, "users.role", Role::User),
            created_at: from_db_time(&row.created_at, "users.created_at"),
            updated_at: from_db_time(&row.updated_at, "users.updated_at"),
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

impl UserStore for SqliteStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        let stamp = to_db_time(now);
        let result = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_ref())
        .bind(&stamp)
        .execute(&self.pool)
        .await?;
        Ok(User {
            id: result.last_insert_rowid(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE \
             AND (?2 IS NULL OR id != ?2)",
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE ?1 IS NULL OR name LIKE ?1 OR email LIKE ?1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ?1 IS NULL OR name LIKE ?1 OR email LIKE ?1 \
             ORDER BY name ASC, id ASC LIMIT ?2 OFFSET ?3"
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    async fn count_users(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_user(
        &self,
        id: i64,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> Result<(), sqlx::Error> {
        let updated_at = to_db_time(Utc::now());
        sqlx::query(
            "UPDATE users SET name = ?1, email = ?2, \
             password_hash = COALESCE(?3, password_hash), role = ?4, updated_at = ?5 \
             WHERE id = ?6",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_ref())
        .bind(&updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: "Budi".into(),
            email: email.into(),
            password_hash: "x".into(),
            role,
        }
    }

    #[tokio::test]
    async fn email_uniqueness_excludes_self() {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store.insert_user(new_user("budi@example.com", Role::Engineer)).await.unwrap();

        assert!(store.email_taken("BUDI@example.com", None).await.unwrap());
        assert!(!store.email_taken("budi@example.com", Some(user.id)).await.unwrap());
    }

    #[tokio::test]
    async fn update_keeps_password_when_not_given() {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store.insert_user(new_user("a@example.com", Role::User)).await.unwrap();
        store
            .update_user(user.id, "Ani", "a@example.com", None, Role::Drafter)
            .await
            .unwrap();
        let fetched = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Ani");
        assert_eq!(fetched.role, Role::Drafter);
        assert_eq!(fetched.password_hash, "x");
    }

    #[tokio::test]
    async fn search_filters_by_name_or_email() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_user(new_user("budi@example.com", Role::User)).await.unwrap();
        store
            .insert_user(NewUser { name: "Citra".into(), ..new_user("citra@corp.id", Role::Esr) })
            .await
            .unwrap();

        let (users, total) = store.list_users(Some("corp"), 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].name, "Citra");

        let (_, all) = store.list_users(None, 10, 0).await.unwrap();
        assert_eq!(all, 2);
    }
}
