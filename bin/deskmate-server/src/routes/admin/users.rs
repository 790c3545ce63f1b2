use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use deskmate_core::entities::{Role, User};
use deskmate_core::pagination::Page;
use deskmate_core::users::{CreateUserInput, UpdateUserInput, UserQuery};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{AppJson, CurrentUser};
use crate::schemas::common::DeletedResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, show_user, update_user, delete_user),
    components(schemas(CreateUserInput, UpdateUserInput, User, Role, DeletedResponse))
)]
pub struct UsersApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(show_user).put(update_user).delete(delete_user))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer" = [])),
    params(UserQuery),
    responses((status = 200, description = "Users matching `search` on name or email", body = Page<User>))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Page<User>>, ServerError> {
    Ok(Json(state.users.list(&query).await?))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer" = [])),
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 422, description = "Validation failed or email taken"),
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    let user = state.users.create(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "No such user"),
    )
)]
pub async fn show_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ServerError> {
    Ok(Json(state.users.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "User updated; an empty password keeps the old one", body = User),
        (status = 422, description = "Validation failed or email taken"),
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    AppJson(req): AppJson<UpdateUserInput>,
) -> Result<Json<User>, ServerError> {
    Ok(Json(state.users.update(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = DeletedResponse),
        (status = 403, description = "Cannot delete your own account"),
        (status = 404, description = "No such user"),
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, ServerError> {
    state.users.delete(&actor, id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}
