//! Chat sessions and messages.
//!
//! `POST /chat/sessions/{id}/messages` waits for the reply and returns both
//! turns. `POST /chat/sessions/{id}/stream` persists the same two turns but
//! replays the reply as server-sent events, a few words per frame.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use deskmate_core::chat::{
    chunk_reply, ChatService, CreateSessionInput, Exchange, ImageUpload, PendingTurn,
    SendMessageInput, SessionDetail, SessionView, StreamEvent, UpdateSessionInput,
};
use deskmate_core::entities::{ChatHistory, ChatSession};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{AppJson, CurrentUser};
use crate::schemas::chat::SendMessageRequest;
use crate::schemas::common::DeletedResponse;
use crate::state::AppState;

const STREAM_FAILED: &str = "Terjadi kesalahan saat memproses pesan. Silakan coba lagi.";

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sessions,
        create_session,
        show_session,
        update_session,
        delete_session,
        list_messages,
        send_message,
        stream_message,
        session_image,
    ),
    components(schemas(
        CreateSessionInput,
        UpdateSessionInput,
        SendMessageRequest,
        SessionView,
        SessionDetail,
        ChatSession,
        ChatHistory,
        Exchange,
        StreamEvent,
        DeletedResponse,
    ))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/sessions", get(list_sessions).post(create_session))
        .route(
            "/chat/sessions/{id}",
            get(show_session).patch(update_session).delete(delete_session),
        )
        .route("/chat/sessions/{id}/messages", get(list_messages).post(send_message))
        .route("/chat/sessions/{id}/stream", post(stream_message))
        .route("/chat/sessions/{id}/images/{file}", get(session_image))
}

// ── Send body ─────────────────────────────────────────────────────────────────

/// A send request from either a JSON body or a multipart form.
#[derive(Debug)]
pub struct SendForm(pub SendMessageInput);

impl<S: Send + Sync> FromRequest<S> for SendForm {
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let AppJson(body) = AppJson::<SendMessageRequest>::from_request(req, state).await?;
            return Ok(SendForm(SendMessageInput {
                message: body.message,
                images: Vec::new(),
                image_urls: body.image_urls,
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        let mut input = SendMessageInput::default();

        while let Some(field) = multipart.next_field().await? {
            // Accept `images`, `images[]` and `images[0]` alike.
            let name = field.name().unwrap_or_default();
            let base = name.split('[').next().unwrap_or_default().to_owned();
            match base.as_str() {
                "message" => input.message = field.text().await?,
                "image_urls" => {
                    let url = field.text().await?;
                    if !url.trim().is_empty() {
                        input.image_urls.push(url);
                    }
                }
                "images" => {
                    let original_name = field.file_name().unwrap_or("image").to_owned();
                    let mime = field.content_type().unwrap_or("application/octet-stream").to_owned();
                    let data = field.bytes().await?;
                    if !data.is_empty() {
                        input.images.push(ImageUpload { original_name, mime, data });
                    }
                }
                _ => {}
            }
        }
        Ok(SendForm(input))
    }
}

// ── Session handlers ──────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/chat/sessions",
    tag = "chat",
    security(("bearer" = [])),
    responses((status = 200, description = "Own and shared sessions, newest activity first", body = Vec<SessionView>))
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<SessionView>>, ServerError> {
    Ok(Json(state.chat.list_sessions(&user).await?))
}

#[utoipa::path(
    post,
    path = "/chat/sessions",
    tag = "chat",
    security(("bearer" = [])),
    request_body = CreateSessionInput,
    responses(
        (status = 201, description = "Session created", body = ChatSession),
        (status = 403, description = "Persona chat not available for this role"),
        (status = 422, description = "Invalid or duplicate title"),
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<CreateSessionInput>,
) -> Result<(StatusCode, Json<ChatSession>), ServerError> {
    let session = state.chat.create_session(&user, req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    get,
    path = "/chat/sessions/{id}",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session with its messages", body = SessionDetail),
        (status = 403, description = "Not owner and not shared with this role"),
        (status = 404, description = "No such session"),
    )
)]
pub async fn show_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<SessionDetail>, ServerError> {
    Ok(Json(state.chat.show_session(&user, id).await?))
}

#[utoipa::path(
    patch,
    path = "/chat/sessions/{id}",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Session id")),
    request_body = UpdateSessionInput,
    responses(
        (status = 200, description = "Session updated", body = ChatSession),
        (status = 403, description = "Not the owner"),
        (status = 422, description = "Invalid title or role"),
    )
)]
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<UpdateSessionInput>,
) -> Result<Json<ChatSession>, ServerError> {
    Ok(Json(state.chat.update_session(&user, id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/chat/sessions/{id}",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session and its history deleted", body = DeletedResponse),
        (status = 403, description = "Not the owner"),
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, ServerError> {
    state.chat.delete_session(&user, id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

// ── Message handlers ──────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/chat/sessions/{id}/messages",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Session id")),
    responses((status = 200, description = "Messages in order", body = Vec<ChatHistory>))
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ChatHistory>>, ServerError> {
    Ok(Json(state.chat.history(&user, id).await?))
}

#[utoipa::path(
    post,
    path = "/chat/sessions/{id}/messages",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Session id")),
    request_body(content = SendMessageRequest, description = "JSON, or multipart with `images` files"),
    responses(
        (status = 200, description = "User turn and AI turn", body = Exchange),
        (status = 403, description = "Only the owner may send"),
        (status = 422, description = "Empty or invalid message"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    SendForm(input): SendForm,
) -> Result<Json<Exchange>, ServerError> {
    Ok(Json(state.chat.send(&user, id, input).await?))
}

#[utoipa::path(
    post,
    path = "/chat/sessions/{id}/stream",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Session id")),
    request_body(content = SendMessageRequest, description = "JSON, or multipart with `images` files"),
    responses(
        (status = 200, description = "`text/event-stream` of StreamEvent frames", body = StreamEvent),
        (status = 403, description = "Only the owner may send"),
        (status = 422, description = "Empty or invalid message"),
    )
)]
pub async fn stream_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    SendForm(input): SendForm,
) -> Result<Response, ServerError> {
    // Authorization and validation failures are plain HTTP errors; once the
    // user turn is stored every outcome is reported in-stream.
    let pending = state.chat.accept(&user, id, input).await?;

    let (tx, rx) = mpsc::channel::<StreamEvent>(32);
    tokio::spawn(drip(state.chat.clone(), pending, tx, state.config.stream_chunk_delay));

    let stream = ReceiverStream::new(rx).map(|event| {
        let frame = Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data(r#"{"type":"error"}"#));
        Ok::<Event, Infallible>(frame)
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

/// Answer the pending turn, then replay the reply chunk by chunk. The reply
/// is persisted even if the client has gone away.
async fn drip(chat: ChatService, pending: PendingTurn, tx: mpsc::Sender<StreamEvent>, delay: std::time::Duration) {
    let session_id = pending.session.id;
    let start = StreamEvent::Start { session_id, user_message_id: pending.user_message.id };
    let mut connected = tx.send(start).await.is_ok();

    let exchange = match chat.answer(pending).await {
        Ok(exchange) => exchange,
        Err(e) => {
            error!(session_id, error = %e, "failed to persist streamed reply");
            let _ = tx.send(StreamEvent::Error { message: STREAM_FAILED.to_owned(), message_id: None }).await;
            return;
        }
    };

    let reply = exchange.ai_message.message.clone();
    for (idx, content) in chunk_reply(&reply).into_iter().enumerate() {
        if !connected {
            break;
        }
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        connected = tx.send(StreamEvent::Chunk { content }).await.is_ok();
    }
    if !connected {
        info!(session_id, message_id = exchange.ai_message.id, "stream client disconnected");
        return;
    }

    let last = match exchange.error_type {
        None => StreamEvent::Complete { message_id: exchange.ai_message.id, full_response: reply },
        Some(_) => StreamEvent::Error { message: reply, message_id: Some(exchange.ai_message.id) },
    };
    let _ = tx.send(last).await;
}

// ── Images ────────────────────────────────────────────────────────────────────

fn image_mime(file: &str) -> &'static str {
    match file.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[utoipa::path(
    get,
    path = "/chat/sessions/{id}/images/{file}",
    tag = "chat",
    security(("bearer" = [])),
    params(
        ("id" = i64, Path, description = "Session id"),
        ("file" = String, Path, description = "Stored file name"),
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "No such image"),
    )
)]
pub async fn session_image(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((id, file)): Path<(i64, String)>,
) -> Result<Response, ServerError> {
    state.chat.viewable(&user, id).await?;
    let path = state.chat.images().locate(id, &file)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| ServerError::Internal(format!("read image: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, image_mime(&file)),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}
