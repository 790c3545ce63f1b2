//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors (database, filesystem, workbook) are logged with full
//! detail but only a generic message is returned to the caller.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use deskmate_core::{CoreError, FieldErrors};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const UNAUTHENTICATED: &str = "Sesi login tidak valid atau sudah berakhir.";
const INVALID_INPUT: &str = "Data yang dikirim tidak valid.";

/// All errors that can occur in the deskmate-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Field-level validation failure.
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A processing time budget ran out.
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(fields) => ServerError::Validation(fields),
            CoreError::Forbidden(m) => ServerError::Forbidden(m),
            CoreError::Unauthenticated => ServerError::Unauthenticated,
            CoreError::NotFound(m) => ServerError::NotFound(m),
            CoreError::BadRequest(m) => ServerError::BadRequest(m),
            CoreError::Timeout(m) => ServerError::Timeout(m),
            CoreError::Database(e) => ServerError::Database(e),
            other @ (CoreError::Workbook(_) | CoreError::Io(_) | CoreError::Internal(_)) => {
                ServerError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(r) => ServerError::BadRequest(r.body_text()),
            other => {
                warn!(error = %other.body_text(), "rejected JSON body");
                ServerError::Validation(FieldErrors::single("body", other.body_text()))
            }
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        ServerError::BadRequest(format!("multipart: {}", e.body_text()))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServerError::Validation(fields) => {
                let message = fields.first_message().unwrap_or(INVALID_INPUT).to_owned();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "message": message, "errors": fields }),
                )
            }
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, json!({ "error": UNAUTHENTICATED })),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, json!({ "error": m })),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
            ServerError::Timeout(m) => (StatusCode::REQUEST_TIMEOUT, json!({ "error": m })),

            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_has_field_errors() {
        let (status, body) = body_of(CoreError::Validation(FieldErrors::single("title", "Judul wajib diisi.")).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Judul wajib diisi.");
        assert_eq!(body["errors"]["title"][0], "Judul wajib diisi.");
    }

    #[tokio::test]
    async fn internal_detail_is_hidden() {
        let (status, body) = body_of(CoreError::Internal("/secret/path exploded".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }

    #[tokio::test]
    async fn timeout_maps_to_408() {
        let (status, _) = body_of(CoreError::Timeout("kurangi foto".into()).into()).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }
}
