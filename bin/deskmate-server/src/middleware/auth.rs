//! Bearer-token authentication and role gates.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use deskmate_core::auth;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::extract::{BearerToken, CurrentUser};
use crate::state::AppState;

pub const ADMIN_ONLY: &str = "Halaman ini hanya dapat diakses oleh admin.";

fn bearer(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Resolve the bearer token to a user and attach [`CurrentUser`].
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer(&req).ok_or(ServerError::Unauthenticated)?;
    let user = auth::authenticate(&state.store, &token).await?;
    debug!(user_id = user.id, role = %user.role, "request authenticated");

    req.extensions_mut().insert(CurrentUser(user));
    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}

/// Reject non-admin callers. Must run inside [`require_auth`].
pub async fn require_admin(CurrentUser(user): CurrentUser, req: Request, next: Next) -> Result<Response, ServerError> {
    if !user.role.is_admin() {
        warn!(user_id = user.id, role = %user.role, path = %req.uri().path(), "admin route denied");
        return Err(ServerError::Forbidden(ADMIN_ONLY.to_owned()));
    }
    Ok(next.run(req).await)
}
