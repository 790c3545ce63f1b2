pub mod changelog;
pub mod users;

use crate::middleware::auth;
use crate::state::AppState;

use axum::{middleware, Router};
use std::sync::Arc;
use utoipa::OpenApi;

/// Changelog CMS (`/admin/changelog`) and user management (`/users`), for
/// admins and superadmins only.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(changelog::router())
        .merge(users::router())
        .route_layer(middleware::from_fn(auth::require_admin))
}

#[derive(OpenApi)]
#[openapi()]
pub struct AdminApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = AdminApi::openapi();
    doc.merge(changelog::AdminChangelogApi::openapi());
    doc.merge(users::UsersApi::openapi());
    doc
}
