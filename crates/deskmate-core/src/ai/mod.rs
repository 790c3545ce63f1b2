//! Outbound AI provider adapters.
//!
//! [`AiBackend`] is the seam the chat orchestrator talks to. The production
//! implementation is [`ProviderRouter`], which picks Gemini or OpenAI per
//! persona and forwards to the matching REST client.

pub mod config;
pub mod gemini;
pub mod openai;
pub mod router;

use async_trait::async_trait;
use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;
use utoipa::ToSchema;

use crate::chat::images::MAX_IMAGE_BYTES;
use crate::entities::ChatType;
use crate::persona::Persona;
use crate::remote;

pub use config::{AiConfig, PersonaOverride, Provider, ProviderSettings, Selection};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use router::ProviderRouter;

/// Speaker of a prior turn as seen by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub text: String,
}

/// An image attached to the current message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Uploaded bytes with their MIME type.
    Inline { data: Vec<u8>, mime: String },
    /// External image URL supplied by the user.
    Url(String),
}

#[derive(Debug, Clone)]
pub struct AiRequest {
    pub message: String,
    pub persona: Option<Persona>,
    pub chat_type: ChatType,
    /// Prior turns in order, excluding the current message.
    pub history: Vec<HistoryTurn>,
    pub images: Vec<ImageInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReply {
    pub text: String,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("provider timed out: {0}")]
    Timeout(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("image processing failed: {0}")]
    ImageProcessing(String),

    #[error("token limit exceeded: {0}")]
    TokenLimit(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// User-facing failure category, used to pick the apology template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    ApiFailure,
    ImageProcessing,
    TokenLimit,
}

impl AiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AiError::Timeout(_) => ErrorCategory::Timeout,
            AiError::ImageProcessing(_) => ErrorCategory::ImageProcessing,
            AiError::TokenLimit(_) => ErrorCategory::TokenLimit,
            AiError::Api { .. }
            | AiError::Network(_)
            | AiError::NotConfigured(_)
            | AiError::InvalidResponse(_) => ErrorCategory::ApiFailure,
        }
    }

    /// Map a transport-level failure.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout(e.to_string())
        } else {
            AiError::Network(e.to_string())
        }
    }

    /// Map a non-success HTTP status plus its body.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();
        if status == 408 || status == 504 {
            AiError::Timeout(format!("HTTP {status}"))
        } else if lower.contains("context_length_exceeded")
            || lower.contains("maximum context length")
            || lower.contains("too many tokens")
            || lower.contains("token limit")
        {
            AiError::TokenLimit(truncate(body))
        } else if lower.contains("image") {
            AiError::ImageProcessing(truncate(body))
        } else {
            AiError::Api { status, message: truncate(body) }
        }
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 500;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_owned(),
    }
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn generate(&self, request: &AiRequest) -> Result<AiReply, AiError>;
}

/// Download an external image for providers that only accept inline data.
pub(crate) async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<(Vec<u8>, String), AiError> {
    let fetched = remote::get_capped(client, url, MAX_IMAGE_BYTES, None)
        .await
        .map_err(|e| AiError::ImageProcessing(format!("download {url}: {e}")))?;

    let mime = match fetched.content_type {
        Some(m) if m.starts_with("image/") => m,
        _ => image::guess_format(&fetched.bytes)
            .map(|f| f.to_mime_type().to_owned())
            .map_err(|e| AiError::ImageProcessing(format!("{url} is not an image: {e}")))?,
    };
    Ok((fetched.bytes.to_vec(), mime))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(AiError::from_status(504, ""), AiError::Timeout(_)));
        assert!(matches!(
            AiError::from_status(400, r#"{"error":{"code":"context_length_exceeded"}}"#),
            AiError::TokenLimit(_)
        ));
        assert!(matches!(
            AiError::from_status(400, "Unable to process input image"),
            AiError::ImageProcessing(_)
        ));
        assert!(matches!(
            AiError::from_status(500, "internal"),
            AiError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn every_error_has_a_category() {
        assert_eq!(AiError::Network("x".into()).category(), ErrorCategory::ApiFailure);
        assert_eq!(AiError::NotConfigured("x".into()).category(), ErrorCategory::ApiFailure);
        assert_eq!(AiError::TokenLimit("x".into()).category(), ErrorCategory::TokenLimit);
        assert_eq!(ErrorCategory::ApiFailure.as_ref(), "api_failure");
    }

    #[tokio::test]
    async fn oversized_image_url_is_refused() {
        use crate::remote::test_server;

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let url = test_server::serve(test_server::ok("image/png", &vec![0u8; MAX_IMAGE_BYTES + 1], false)).await;
        let err = fetch_image(&client, &format!("{url}/besar.png")).await.unwrap_err();
        assert!(matches!(err, AiError::ImageProcessing(m) if m.contains("larger than")));

        let url = test_server::serve(test_server::ok("image/png; q=1", b"\x89PNG", true)).await;
        let (bytes, mime) = fetch_image(&client, &format!("{url}/kecil.png")).await.unwrap();
        assert_eq!(bytes, b"\x89PNG");
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        match AiError::from_status(500, &body) {
            AiError::Api { message, .. } => assert!(message.chars().count() <= 501),
            other => panic!("unexpected {other:?}"),
        }
    }
}
