//! Login, logout and the current user.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use deskmate_core::auth::{self, LoginGrant};
use deskmate_core::entities::User;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{AppJson, BearerToken, CurrentUser};
use crate::schemas::auth::LoginRequest;
use crate::schemas::common::MessageResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(login, logout, me),
    components(schemas(LoginRequest, LoginGrant, User, MessageResponse))
)]
pub struct AuthApi;

/// Routes reachable without a token.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new().route("/auth/login", post(login))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginGrant),
        (status = 422, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginGrant>, ServerError> {
    Ok(Json(auth::login(&state.store, &req.email, &req.password).await?))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 200, description = "Token revoked", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>, ServerError> {
    auth::logout(&state.store, &token).await?;
    Ok(Json(MessageResponse { message: "Berhasil keluar.".into() }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
