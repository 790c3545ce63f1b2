//! Changelog read receipts, nested under `/api/changelog-notifications`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use deskmate_core::changelog::UnreadCount;
use deskmate_core::entities::Changelog;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::error::ServerError;
use crate::extract::CurrentUser;
use crate::schemas::common::MessageResponse;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarkAllResponse {
    pub message: String,
    pub marked: u64,
}

#[derive(OpenApi)]
#[openapi(
    paths(unread_count, unread, mark_read, mark_all_read),
    components(schemas(UnreadCount, MarkAllResponse, MessageResponse))
)]
pub struct NotificationsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/unread-count", get(unread_count))
        .route("/unread", get(unread))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
}

#[utoipa::path(
    get,
    path = "/api/changelog-notifications/unread-count",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Published entries the user has not seen", body = UnreadCount))
)]
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UnreadCount>, ServerError> {
    Ok(Json(state.changelog.unread_count(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/changelog-notifications/unread",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Unseen published entries", body = Vec<Changelog>))
)]
pub async fn unread(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Changelog>>, ServerError> {
    Ok(Json(state.changelog.unread(&user).await?))
}

#[utoipa::path(
    post,
    path = "/api/changelog-notifications/{id}/read",
    tag = "notifications",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Changelog id")),
    responses(
        (status = 200, description = "Marked read; repeating is harmless", body = MessageResponse),
        (status = 404, description = "Missing or unpublished entry"),
    )
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ServerError> {
    state.changelog.mark_read(&user, id).await?;
    Ok(Json(MessageResponse { message: "Changelog ditandai sudah dibaca.".into() }))
}

#[utoipa::path(
    post,
    path = "/api/changelog-notifications/read-all",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Every published entry marked read", body = MarkAllResponse))
)]
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MarkAllResponse>, ServerError> {
    let marked = state.changelog.mark_all_read(&user).await?;
    Ok(Json(MarkAllResponse { message: "Semua changelog ditandai sudah dibaca.".into(), marked }))
}
