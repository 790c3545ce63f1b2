//! Password hashing and bearer-token sessions.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{SqliteStore, TokenStore, User, UserStore};
use crate::error::{CoreError, CoreResult, FieldErrors};

pub const INVALID_CREDENTIALS: &str = "Email atau kata sandi salah.";

/// Result of a successful login. `token` is shown to the client exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginGrant {
    pub token: String,
    pub user: User,
}

pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| CoreError::Internal(format!("salt: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CoreError::Internal(format!("password hash: {e}")))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

/// Hex SHA-256 of a bearer token; the only form that is persisted.
pub fn token_digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub async fn login(store: &SqliteStore, email: &str, password: &str) -> CoreResult<LoginGrant> {
    let user = store
        .find_user_by_email(email.trim())
        .await?
        .filter(|u| verify_password(password, &u.password_hash))
        .ok_or_else(|| {
            info!(email = %email, "login rejected");
            CoreError::Validation(FieldErrors::single("email", INVALID_CREDENTIALS))
        })?;

    let token = new_token();
    store.insert_token(&token_digest(&token), user.id).await?;
    info!(user_id = user.id, "login succeeded");
    Ok(LoginGrant { token, user })
}

/// Resolve a raw bearer token to its user.
pub async fn authenticate(store: &SqliteStore, token: &str) -> CoreResult<User> {
    store
        .user_for_token(&token_digest(token))
        .await?
        .ok_or(CoreError::Unauthenticated)
}

pub async fn logout(store: &SqliteStore, token: &str) -> CoreResult<()> {
    store.revoke_token(&token_digest(token)).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{NewUser, Role};

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("rahasia123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("rahasia123", &hash));
        assert!(!verify_password("rahasia124", &hash));
        assert!(!verify_password("rahasia123", "not-a-hash"));
    }

    #[test]
    fn token_digest_is_stable_hex() {
        let d = token_digest("abc");
        assert_eq!(d.len(), 64);
        assert_eq!(d, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[tokio::test]
    async fn login_then_authenticate_then_logout() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert_user(NewUser {
                name: "Dewi".into(),
                email: "dewi@example.com".into(),
                password_hash: hash_password("kunci-rahasia").unwrap(),
                role: Role::Esr,
            })
            .await
            .unwrap();

        assert!(matches!(
            login(&store, "dewi@example.com", "salah").await,
            Err(CoreError::Validation(ref e)) if e.contains("email")
        ));

        let grant = login(&store, "dewi@example.com", "kunci-rahasia").await.unwrap();
        let user = authenticate(&store, &grant.token).await.unwrap();
        assert_eq!(user.email, "dewi@example.com");

        logout(&store, &grant.token).await.unwrap();
        assert!(authenticate(&store, &grant.token).await.is_err());
    }
}
