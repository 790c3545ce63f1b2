//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, body limit)
//! - Optional OpenAPI document endpoint (disable with `DESK_ENABLE_DOCS=false`)
//! - Public health and login routes
//! - Token-protected chat, changelog, notification and Excel routes
//! - Admin-only changelog CMS and user management

mod admin;
mod auth;
mod changelog;
mod chat;
pub mod doc;
mod excel;
mod health;
mod notifications;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Json, Router};
use tower::ServiceBuilder;

use crate::middleware::{auth as auth_mw, cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .merge(health::router())
        .merge(auth::public_router());

    let protected = Router::new()
        .merge(auth::router())
        .merge(chat::router())
        .merge(changelog::router())
        .nest("/api/changelog-notifications", notifications::router())
        .nest("/excel", excel::router())
        .merge(admin::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_mw::require_auth));

    let mut app = Router::new().merge(public).merge(protected);

    // ── OpenAPI document ──────────────────────────────────────────────────────
    if state.config.enable_docs {
        let api_doc = doc::get_docs();
        app = app.route("/api-docs/openapi.json", get(move || async move { Json(api_doc.clone()) }));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
