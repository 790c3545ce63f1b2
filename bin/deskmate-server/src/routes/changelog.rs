//! Published release notes for every signed-in user.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use deskmate_core::entities::Changelog;
use deskmate_core::pagination::{Page, PageRequest};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_published, show_changelog), components(schemas(Changelog)))]
pub struct ChangelogApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/changelog", get(list_published))
        .route("/changelog/{id}", get(show_changelog))
}

#[utoipa::path(
    get,
    path = "/changelog",
    tag = "changelog",
    security(("bearer" = [])),
    params(PageRequest),
    responses((status = 200, description = "Published entries, newest release first", body = Page<Changelog>))
)]
pub async fn list_published(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Changelog>>, ServerError> {
    Ok(Json(state.changelog.list_published(page).await?))
}

#[utoipa::path(
    get,
    path = "/changelog/{id}",
    tag = "changelog",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Changelog id")),
    responses(
        (status = 200, description = "Entry", body = Changelog),
        (status = 404, description = "Missing, or a draft seen by a non-admin"),
    )
)]
pub async fn show_changelog(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Changelog>, ServerError> {
    Ok(Json(state.changelog.show_for(&user, id).await?))
}
