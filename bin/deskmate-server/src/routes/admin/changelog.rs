use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use deskmate_core::changelog::ChangelogInput;
use deskmate_core::entities::{Changelog, ChangelogType};
use deskmate_core::pagination::{Page, PageRequest};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{AppJson, CurrentUser};
use crate::schemas::common::DeletedResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_changelogs, create_changelog, show_changelog, update_changelog, delete_changelog, toggle_publish),
    components(schemas(ChangelogInput, Changelog, ChangelogType, DeletedResponse))
)]
pub struct AdminChangelogApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/changelog", get(list_changelogs).post(create_changelog))
        .route(
            "/admin/changelog/{id}",
            get(show_changelog).put(update_changelog).delete(delete_changelog),
        )
        .route("/admin/changelog/{id}/toggle-publish", post(toggle_publish))
}

#[utoipa::path(
    get,
    path = "/admin/changelog",
    tag = "admin",
    security(("bearer" = [])),
    params(PageRequest),
    responses(
        (status = 200, description = "Drafts and published entries, newest release first", body = Page<Changelog>),
        (status = 403, description = "Not an admin"),
    )
)]
pub async fn list_changelogs(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Changelog>>, ServerError> {
    Ok(Json(state.changelog.list_all(page).await?))
}

#[utoipa::path(
    post,
    path = "/admin/changelog",
    tag = "admin",
    security(("bearer" = [])),
    request_body = ChangelogInput,
    responses(
        (status = 201, description = "Entry created", body = Changelog),
        (status = 422, description = "Validation failed or version taken"),
    )
)]
pub async fn create_changelog(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<ChangelogInput>,
) -> Result<(StatusCode, Json<Changelog>), ServerError> {
    let created = state.changelog.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/admin/changelog/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Changelog id")),
    responses(
        (status = 200, description = "Entry", body = Changelog),
        (status = 404, description = "No such entry"),
    )
)]
pub async fn show_changelog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Changelog>, ServerError> {
    Ok(Json(state.changelog.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/admin/changelog/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Changelog id")),
    request_body = ChangelogInput,
    responses(
        (status = 200, description = "Entry updated", body = Changelog),
        (status = 404, description = "No such entry"),
        (status = 422, description = "Validation failed or version taken by another entry"),
    )
)]
pub async fn update_changelog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    AppJson(req): AppJson<ChangelogInput>,
) -> Result<Json<Changelog>, ServerError> {
    Ok(Json(state.changelog.update(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/changelog/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Changelog id")),
    responses(
        (status = 200, description = "Entry deleted", body = DeletedResponse),
        (status = 404, description = "No such entry"),
    )
)]
pub async fn delete_changelog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, ServerError> {
    state.changelog.delete(id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

#[utoipa::path(
    post,
    path = "/admin/changelog/{id}/toggle-publish",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Changelog id")),
    responses((status = 200, description = "Publish flag flipped", body = Changelog))
)]
pub async fn toggle_publish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Changelog>, ServerError> {
    Ok(Json(state.changelog.toggle_publish(id).await?))
}
