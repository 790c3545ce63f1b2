//! User management for the admin surface.

use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::hash_password;
use crate::entities::{NewUser, Role, SqliteStore, User, UserStore};
use crate::error::{CoreError, CoreResult, FieldErrors};
use crate::pagination::{Page, PageRequest};

pub const SELF_DELETE_DENIED: &str = "Anda tidak dapat menghapus akun Anda sendiri.";
const EMAIL_TAKEN: &str = "Email sudah digunakan.";

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 255, message = "Nama wajib diisi (maksimal 255 karakter)."))]
    pub name: String,
    #[validate(email(message = "Format email tidak valid."), length(max = 255))]
    pub email: String,
    #[validate(length(min = 8, message = "Kata sandi minimal 8 karakter."))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 255, message = "Nama wajib diisi (maksimal 255 karakter)."))]
    pub name: String,
    #[validate(email(message = "Format email tidak valid."), length(max = 255))]
    pub email: String,
    /// Omit or send empty to keep the current password.
    #[validate(length(min = 8, message = "Kata sandi minimal 8 karakter."))]
    pub password: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl UserQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest { page: self.page, per_page: self.per_page }
    }
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone, Debug)]
pub struct UserService {
    store: SqliteStore,
}

impl UserService {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: &UserQuery) -> CoreResult<Page<User>> {
        let page = query.page_request();
        let (users, total) = self
            .store
            .list_users(query.search.as_deref(), page.limit(), page.offset())
            .await?;
        Ok(Page::new(users, page, total))
    }

    pub async fn get(&self, id: i64) -> CoreResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {id}")))
    }

    pub async fn create(&self, mut input: CreateUserInput) -> CoreResult<User> {
        input.email = normalize_email(&input.email);
        input.validate()?;
        let email = input.email.clone();
        if self.store.email_taken(&email, None).await? {
            return Err(CoreError::Validation(FieldErrors::single("email", EMAIL_TAKEN)));
        }

        let user = self
            .store
            .insert_user(NewUser {
                name: input.name.trim().to_owned(),
                email,
                password_hash: hash_password(&input.password)?,
                role: input.role,
            })
            .await
            .map_err(|e| CoreError::unique_field(e, "email", EMAIL_TAKEN))?;
        info!(user_id = user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn update(&self, id: i64, mut input: UpdateUserInput) -> CoreResult<User> {
        // An empty password field in a form means "unchanged".
        if input.password.as_deref().is_some_and(str::is_empty) {
            input.password = None;
        }
        input.email = normalize_email(&input.email);
        input.validate()?;
        self.get(id).await?;

        let email = input.email.clone();
        if self.store.email_taken(&email, Some(id)).await? {
            return Err(CoreError::Validation(FieldErrors::single("email", EMAIL_TAKEN)));
        }

        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        self.store
            .update_user(id, input.name.trim(), &email, password_hash.as_deref(), input.role)
            .await
            .map_err(|e| CoreError::unique_field(e, "email", EMAIL_TAKEN))?;
        info!(user_id = id, role = %input.role, password_changed = password_hash.is_some(), "user updated");
        self.get(id).await
    }

    pub async fn delete(&self, actor: &User, id: i64) -> CoreResult<()> {
        if actor.id == id {
            return Err(CoreError::Forbidden(SELF_DELETE_DENIED.to_owned()));
        }
        if !self.store.delete_user(id).await? {
            return Err(CoreError::NotFound(format!("user {id}")));
        }
        info!(user_id = id, actor_id = actor.id, "user deleted");
        Ok(())
    }

    /// Seed a superadmin when the user table is empty. Returns the new user, if any.
    pub async fn seed_superadmin(&self, name: &str, email: &str, password: &str) -> CoreResult<Option<User>> {
        if self.store.count_users().await? > 0 {
            return Ok(None);
        }
        let user = self
            .create(CreateUserInput {
                name: name.to_owned(),
                email: email.to_owned(),
                password: password.to_owned(),
                role: Role::Superadmin,
            })
            .await?;
        Ok(Some(user))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn service() -> UserService {
        UserService::new(SqliteStore::in_memory().await.unwrap())
    }

    fn input(email: &str) -> CreateUserInput {
        CreateUserInput {
            name: "Rina".into(),
            email: email.into(),
            password: "password-aman".into(),
            role: Role::Drafter,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_short_password() {
        let svc = service().await;
        svc.create(input("rina@example.com")).await.unwrap();

        let dup = svc.create(input("rina@example.com")).await;
        assert!(matches!(dup, Err(CoreError::Validation(ref e)) if e.contains("email")));

        let short = svc
            .create(CreateUserInput { password: "pendek".into(), ..input("lain@example.com") })
            .await;
        assert!(matches!(short, Err(CoreError::Validation(ref e)) if e.contains("password")));

        let bad_email = svc.create(input("bukan-email")).await;
        assert!(matches!(bad_email, Err(CoreError::Validation(ref e)) if e.contains("email")));
    }

    #[tokio::test]
    async fn emails_are_stored_normalized() {
        let svc = service().await;
        let user = svc.create(input("  Rina@Example.COM ")).await.unwrap();
        assert_eq!(user.email, "rina@example.com");

        let dup = svc.create(input("RINA@example.com")).await;
        assert!(matches!(dup, Err(CoreError::Validation(ref e)) if e.0["email"] == [EMAIL_TAKEN]));

        let other = svc.create(input("budi@example.com")).await.unwrap();
        let updated = svc
            .update(
                other.id,
                UpdateUserInput { name: "Budi".into(), email: " Budi.S@Example.com".into(), password: None, role: Role::Drafter },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "budi.s@example.com");
    }

    #[tokio::test]
    async fn concurrent_duplicate_insert_is_a_field_error() {
        let svc = service().await;
        let new_user = || NewUser {
            name: "Rina".into(),
            email: "rina@example.com".into(),
            password_hash: "x".into(),
            role: Role::Drafter,
        };
        // Both writers passed the availability check; the second insert hits the constraint.
        svc.store.insert_user(new_user()).await.unwrap();
        let err = svc
            .store
            .insert_user(new_user())
            .await
            .map_err(|e| CoreError::unique_field(e, "email", EMAIL_TAKEN))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref e) if e.0["email"] == [EMAIL_TAKEN]));
    }

    #[tokio::test]
    async fn update_may_keep_own_email_and_password() {
        let svc = service().await;
        let user = svc.create(input("rina@example.com")).await.unwrap();
        let updated = svc
            .update(
                user.id,
                UpdateUserInput {
                    name: "Rina S".into(),
                    email: "rina@example.com".into(),
                    password: Some(String::new()),
                    role: Role::Esr,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Esr);
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn cannot_delete_self() {
        let svc = service().await;
        let admin = svc
            .create(CreateUserInput { role: Role::Admin, ..input("admin@example.com") })
            .await
            .unwrap();
        let other = svc.create(input("x@example.com")).await.unwrap();

        assert!(matches!(svc.delete(&admin, admin.id).await, Err(CoreError::Forbidden(_))));
        svc.delete(&admin, other.id).await.unwrap();
        assert!(matches!(svc.get(other.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn seed_only_runs_on_empty_table() {
        let svc = service().await;
        let seeded = svc.seed_superadmin("Root", "root@example.com", "rootroot").await.unwrap();
        assert_eq!(seeded.map(|u| u.role), Some(Role::Superadmin));
        assert!(svc.seed_superadmin("Root", "root2@example.com", "rootroot").await.unwrap().is_none());
    }
}
