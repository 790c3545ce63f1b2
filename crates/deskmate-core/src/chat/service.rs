//! Chat session orchestration.
//!
//! Every send persists exactly two turns: the user's message, then either
//! the model's reply or a canned apology. Provider failures never surface
//! as request errors.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use super::images::{validate_uploads, validate_urls, ImageStore, ImageUpload, StoredImage};
use super::templates::error_reply;
use crate::access::{ensure_can_edit, ensure_can_send, ensure_can_view, is_owner};
use crate::ai::{AiBackend, AiError, AiRequest, ErrorCategory, HistoryTurn, ImageInput, TurnRole};
use crate::entities::{
    ChatHistory, ChatSession, ChatType, HistoryStore, NewHistory, NewSession, Role, Sender,
    SessionStore, SqliteStore, User,
};
use crate::error::{CoreError, CoreResult, FieldErrors};
use crate::persona::Persona;

pub const MAX_MESSAGE_CHARS: usize = 10_000;
pub const MAX_TITLE_CHARS: usize = 255;
pub const PERSONA_DENIED: &str =
    "Chat persona hanya tersedia untuk pengguna dengan role engineer, drafter, atau esr.";
const TITLE_TAKEN: &str = "Judul sesi sudah digunakan.";
const EMPTY_MESSAGE: &str = "Pesan, gambar, atau URL gambar wajib diisi.";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSessionInput {
    pub title: String,
    pub chat_type: ChatType,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateSessionInput {
    pub title: Option<String>,
    pub is_shared: Option<bool>,
    /// Role names; defaults to the owner's role when sharing with none given.
    pub shared_with_roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct SendMessageInput {
    pub message: String,
    pub images: Vec<ImageUpload>,
    pub image_urls: Vec<String>,
}

/// A session as listed for a particular viewer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: ChatSession,
    pub is_owner: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: ChatSession,
    pub is_owner: bool,
    pub messages: Vec<ChatHistory>,
}

/// Both turns of one send.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Exchange {
    pub user_message: ChatHistory,
    pub ai_message: ChatHistory,
    /// Set when the AI turn is a canned apology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorCategory>,
}

/// A user turn that has been persisted but not answered yet.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub session: ChatSession,
    pub user: User,
    pub user_message: ChatHistory,
    images: Vec<StoredImage>,
    image_urls: Vec<String>,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn validate_title(title: &str, errors: &mut FieldErrors) {
    let len = title.chars().count();
    if len == 0 {
        errors.add("title", "Judul sesi wajib diisi.");
    } else if len > MAX_TITLE_CHARS {
        errors.add("title", format!("Judul sesi maksimal {MAX_TITLE_CHARS} karakter."));
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: SqliteStore,
    ai: Arc<dyn AiBackend>,
    images: ImageStore,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService").field("images", &self.images).finish_non_exhaustive()
    }
}

impl ChatService {
    pub fn new(store: SqliteStore, ai: Arc<dyn AiBackend>, images: ImageStore) -> Self {
        Self { store, ai, images }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    async fn load(&self, id: i64) -> CoreResult<ChatSession> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("chat session {id}")))
    }

    /// Load a session the viewer is allowed to read.
    pub async fn viewable(&self, user: &User, id: i64) -> CoreResult<ChatSession> {
        let session = self.load(id).await?;
        ensure_can_view(&session, user)?;
        Ok(session)
    }

    // ── sessions ───────────────────────────────────────────────────────────────

    /// Own sessions plus shared sessions visible to the user's role, newest activity first.
    pub async fn list_sessions(&self, user: &User) -> CoreResult<Vec<SessionView>> {
        let mut views: Vec<SessionView> = self
            .store
            .list_owned_sessions(user.id)
            .await?
            .into_iter()
            .map(|session| SessionView { session, is_owner: true })
            .collect();

        views.extend(
            self.store
                .list_foreign_shared_sessions(user.id)
                .await?
                .into_iter()
                .filter(|s| s.shared_with_roles.contains(&user.role))
                .map(|session| SessionView { session, is_owner: false }),
        );

        views.sort_by(|a, b| {
            b.session
                .last_activity_at
                .cmp(&a.session.last_activity_at)
                .then(b.session.id.cmp(&a.session.id))
        });
        Ok(views)
    }

    #[instrument(skip(self, user, input), fields(user_id = user.id, chat_type = %input.chat_type))]
    pub async fn create_session(&self, user: &User, input: CreateSessionInput) -> CoreResult<ChatSession> {
        let title = input.title.trim().to_owned();
        let mut errors = FieldErrors::new();
        validate_title(&title, &mut errors);
        errors.into_result()?;

        let persona = match input.chat_type {
            ChatType::Global => None,
            ChatType::Persona => match Persona::for_role(user.role) {
                Some(p) => Some(p),
                None => {
                    warn!(role = %user.role, "persona chat requested by non-field role");
                    return Err(CoreError::Forbidden(PERSONA_DENIED.to_owned()));
                }
            },
        };

        if self.store.title_taken(user.id, &title, None).await? {
            return Err(CoreError::Validation(FieldErrors::single("title", TITLE_TAKEN)));
        }

        let session = self
            .store
            .create_session(NewSession { user_id: user.id, title, chat_type: input.chat_type, persona })
            .await?;
        info!(session_id = session.id, persona = ?session.persona, "chat session created");
        Ok(session)
    }

    pub async fn show_session(&self, user: &User, id: i64) -> CoreResult<SessionDetail> {
        let session = self.viewable(user, id).await?;
        let messages = self.store.list_history(id).await?;
        Ok(SessionDetail { is_owner: is_owner(&session, user), session, messages })
    }

    pub async fn update_session(&self, user: &User, id: i64, input: UpdateSessionInput) -> CoreResult<ChatSession> {
        let session = self.load(id).await?;
        ensure_can_edit(&session, user)?;

        let mut errors = FieldErrors::new();
        let title = match &input.title {
            Some(t) => {
                let t = t.trim().to_owned();
                validate_title(&t, &mut errors);
                t
            }
            None => session.title.clone(),
        };

        let mut roles = match &input.shared_with_roles {
            Some(names) => {
                let mut parsed = Vec::with_capacity(names.len());
                for name in names {
                    match name.parse::<Role>() {
                        Ok(role) if !parsed.contains(&role) => parsed.push(role),
                        Ok(_) => {}
                        Err(_) => errors.add("shared_with_roles", format!("Role '{name}' tidak dikenal.")),
                    }
                }
                parsed
            }
            None => session.shared_with_roles.clone(),
        };
        errors.into_result()?;

        if title != session.title && self.store.title_taken(user.id, &title, Some(id)).await? {
            return Err(CoreError::Validation(FieldErrors::single("title", TITLE_TAKEN)));
        }

        let is_shared = input.is_shared.unwrap_or(session.is_shared);
        if !is_shared {
            roles.clear();
        } else if roles.is_empty() {
            roles.push(user.role);
        }

        self.store.update_session_details(id, &title, is_shared, &roles).await?;
        info!(session_id = id, is_shared, roles = ?roles, "chat session updated");
        self.load(id).await
    }

    pub async fn delete_session(&self, user: &User, id: i64) -> CoreResult<()> {
        let session = self.load(id).await?;
        ensure_can_edit(&session, user)?;
        self.store.delete_session(id).await?;
        self.images.remove_session(id).await;
        info!(session_id = id, user_id = user.id, "chat session deleted");
        Ok(())
    }

    pub async fn history(&self, user: &User, id: i64) -> CoreResult<Vec<ChatHistory>> {
        self.viewable(user, id).await?;
        Ok(self.store.list_history(id).await?)
    }

    // ── messages ───────────────────────────────────────────────────────────────

    /// Send a message and wait for the reply.
    pub async fn send(&self, user: &User, id: i64, input: SendMessageInput) -> CoreResult<Exchange> {
        let pending = self.accept(user, id, input).await?;
        self.answer(pending).await
    }

    /// Authorize, validate and persist the user turn. Nothing is written
    /// when this returns an error.
    #[instrument(skip(self, user, input), fields(user_id = user.id, session_id = id))]
    pub async fn accept(&self, user: &User, id: i64, input: SendMessageInput) -> CoreResult<PendingTurn> {
        let session = self.load(id).await?;
        ensure_can_send(&session, user)?;

        let message = input.message.trim().to_owned();
        let image_urls: Vec<String> = input
            .image_urls
            .iter()
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .collect();

        let mut errors = FieldErrors::new();
        if message.chars().count() > MAX_MESSAGE_CHARS {
            errors.add("message", format!("Pesan maksimal {MAX_MESSAGE_CHARS} karakter."));
        }
        if message.is_empty() && input.images.is_empty() && image_urls.is_empty() {
            errors.add("message", EMPTY_MESSAGE);
        }
        validate_uploads(&input.images, &mut errors);
        validate_urls(&image_urls, &mut errors);
        errors.into_result()?;

        let mut images = Vec::with_capacity(input.images.len());
        let persisted = self.persist_turn(&session, user, message, &input.images, &image_urls, &mut images).await;
        let user_message = match persisted {
            Ok(message) => message,
            Err(e) => {
                for image in &images {
                    self.images.remove(image).await;
                }
                return Err(e);
            }
        };

        Ok(PendingTurn { session, user: user.clone(), user_message, images, image_urls })
    }

    /// Store uploads and the user turn. `images` collects every file written,
    /// so the caller can remove them if a later step fails.
    async fn persist_turn(
        &self,
        session: &ChatSession,
        user: &User,
        message: String,
        uploads: &[ImageUpload],
        image_urls: &[String],
        images: &mut Vec<StoredImage>,
    ) -> CoreResult<ChatHistory> {
        let id = session.id;
        for upload in uploads {
            images.push(self.images.save(id, upload).await.inspect_err(|e| {
                error!(session_id = id, error = %e, "failed to store chat image");
            })?);
        }

        let user_message = self
            .store
            .append_history(NewHistory {
                chat_session_id: id,
                user_id: user.id,
                message,
                sender: Sender::User,
                metadata: json!({
                    "images": images,
                    "image_urls": image_urls,
                    "persona": session.persona,
                    "sent_at": now_stamp(),
                }),
            })
            .await
            .inspect_err(|e| error!(session_id = id, error = %e, "failed to store user turn"))?;
        Ok(user_message)
    }

    /// Ask the model for a reply to an accepted turn and persist it.
    pub async fn answer(&self, pending: PendingTurn) -> CoreResult<Exchange> {
        let PendingTurn { session, user, user_message, images, image_urls } = pending;
        let persona = session.persona;

        let outcome = match self.build_request(&session, &user_message, &images, &image_urls).await {
            Ok(request) => self.ai.generate(&request).await,
            Err(e) => Err(e),
        };

        let (text, metadata, error_type) = match outcome {
            Ok(reply) => (
                reply.text,
                json!({
                    "persona": persona,
                    "provider": reply.provider,
                    "model": reply.model,
                    "error": false,
                    "generated_at": now_stamp(),
                }),
                None,
            ),
            Err(e) => {
                let category = e.category();
                error!(
                    user_id = user.id,
                    session_id = session.id,
                    persona = ?persona,
                    message_len = user_message.message.chars().count(),
                    images = images.len() + image_urls.len(),
                    category = %category,
                    error = %e,
                    "ai provider call failed"
                );
                (
                    error_reply(category, persona),
                    json!({
                        "persona": persona,
                        "provider": null,
                        "model": null,
                        "error": true,
                        "error_type": category,
                        "generated_at": now_stamp(),
                    }),
                    Some(category),
                )
            }
        };

        let ai_message = self
            .store
            .append_history(NewHistory {
                chat_session_id: session.id,
                user_id: user.id,
                message: text,
                sender: Sender::Ai,
                metadata,
            })
            .await?;
        self.store.touch_session(session.id, Utc::now()).await?;

        info!(
            session_id = session.id,
            user_message_id = user_message.id,
            ai_message_id = ai_message.id,
            failed = error_type.is_some(),
            "chat exchange persisted"
        );
        Ok(Exchange { user_message, ai_message, error_type })
    }

    async fn build_request(
        &self,
        session: &ChatSession,
        current: &ChatHistory,
        images: &[StoredImage],
        image_urls: &[String],
    ) -> Result<AiRequest, AiError> {
        let history = self
            .store
            .list_history(session.id)
            .await
            .map_err(|e| AiError::InvalidResponse(format!("history unavailable: {e}")))?
            .into_iter()
            .filter(|turn| turn.id != current.id && !turn.is_error_reply())
            .map(|turn| HistoryTurn {
                role: match turn.sender {
                    Sender::User => TurnRole::User,
                    Sender::Ai => TurnRole::Assistant,
                },
                text: turn.message,
            })
            .collect();

        let mut inputs = Vec::with_capacity(images.len() + image_urls.len());
        for stored in images {
            let data = self
                .images
                .read(stored)
                .await
                .map_err(|e| AiError::ImageProcessing(format!("{}: {e}", stored.path)))?;
            inputs.push(ImageInput::Inline { data, mime: stored.mime.clone() });
        }
        inputs.extend(image_urls.iter().cloned().map(ImageInput::Url));

        Ok(AiRequest {
            message: current.message.clone(),
            persona: session.persona,
            chat_type: session.chat_type,
            history,
            images: inputs,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ai::AiReply;
    use crate::entities::{NewUser, UserStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed text, or fails, and records every request.
    struct ScriptedAi {
        fail_with: Option<fn() -> AiError>,
        seen: Mutex<Vec<AiRequest>>,
    }

    impl ScriptedAi {
        fn ok() -> Arc<Self> {
            Arc::new(Self { fail_with: None, seen: Mutex::new(Vec::new()) })
        }
        fn failing(f: fn() -> AiError) -> Arc<Self> {
            Arc::new(Self { fail_with: Some(f), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl AiBackend for ScriptedAi {
        async fn generate(&self, request: &AiRequest) -> Result<AiReply, AiError> {
            self.seen.lock().unwrap().push(request.clone());
            match self.fail_with {
                Some(f) => Err(f()),
                None => Ok(AiReply {
                    text: format!("Jawaban untuk: {}", request.message),
                    provider: "scripted".into(),
                    model: "test".into(),
                }),
            }
        }
    }

    struct Fixture {
        svc: ChatService,
        store: SqliteStore,
        _dir: tempfile::TempDir,
    }

    async fn fixture(ai: Arc<dyn AiBackend>) -> Fixture {
        let store = SqliteStore::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let svc = ChatService::new(store.clone(), ai, ImageStore::new(dir.path()));
        Fixture { svc, store, _dir: dir }
    }

    async fn user(store: &SqliteStore, email: &str, role: Role) -> User {
        store
            .insert_user(NewUser { name: email.into(), email: email.into(), password_hash: "x".into(), role })
            .await
            .unwrap()
    }

    fn text(message: &str) -> SendMessageInput {
        SendMessageInput { message: message.into(), ..Default::default() }
    }

    #[tokio::test]
    async fn persona_follows_owner_role() {
        let f = fixture(ScriptedAi::ok()).await;
        let plain = user(&f.store, "user@example.com", Role::User).await;
        let drafter = user(&f.store, "drafter@example.com", Role::Drafter).await;

        let global = f
            .svc
            .create_session(&plain, CreateSessionInput { title: "Chat Global".into(), chat_type: ChatType::Global })
            .await
            .unwrap();
        assert_eq!(global.persona, None);

        let denied = f
            .svc
            .create_session(&plain, CreateSessionInput { title: "Chat Global".into(), chat_type: ChatType::Persona })
            .await;
        assert!(matches!(denied, Err(CoreError::Forbidden(_))));

        let persona = f
            .svc
            .create_session(&drafter, CreateSessionInput { title: "Gambar".into(), chat_type: ChatType::Persona })
            .await
            .unwrap();
        assert_eq!(persona.persona, Some(Persona::Drafter));
    }

    #[tokio::test]
    async fn duplicate_title_is_a_field_error() {
        let f = fixture(ScriptedAi::ok()).await;
        let owner = user(&f.store, "a@example.com", Role::User).await;
        let input = || CreateSessionInput { title: "Sama".into(), chat_type: ChatType::Global };
        f.svc.create_session(&owner, input()).await.unwrap();
        let dup = f.svc.create_session(&owner, input()).await;
        assert!(matches!(dup, Err(CoreError::Validation(ref e)) if e.contains("title")));
    }

    #[tokio::test]
    async fn send_persists_two_turns_and_bumps_activity() {
        let ai = ScriptedAi::ok();
        let f = fixture(ai.clone()).await;
        let owner = user(&f.store, "eng@example.com", Role::Engineer).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "Teknis".into(), chat_type: ChatType::Persona })
            .await
            .unwrap();

        let first = f.svc.send(&owner, session.id, text("Halo")).await.unwrap();
        assert_eq!(first.user_message.sender, Sender::User);
        assert_eq!(first.ai_message.sender, Sender::Ai);
        assert_eq!(first.ai_message.message, "Jawaban untuk: Halo");
        assert_eq!(first.ai_message.metadata["provider"], "scripted");

        f.svc.send(&owner, session.id, text("Lanjut")).await.unwrap();
        assert_eq!(f.store.count_history(session.id).await.unwrap(), 4);

        // The current turn is never part of its own context.
        let seen = ai.seen.lock().unwrap();
        assert!(seen[0].history.is_empty());
        assert_eq!(seen[1].history.len(), 2);
        assert_eq!(seen[1].message, "Lanjut");
        assert_eq!(seen[1].persona, Some(Persona::Engineer));
        drop(seen);

        let after = f.store.get_session(session.id).await.unwrap().unwrap();
        assert!(after.last_activity_at > session.last_activity_at);
    }

    #[tokio::test]
    async fn provider_failure_is_persisted_as_apology() {
        let ai = ScriptedAi::failing(|| AiError::Timeout("slow".into()));
        let f = fixture(ai.clone()).await;
        let owner = user(&f.store, "esr@example.com", Role::Esr).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "Survei".into(), chat_type: ChatType::Persona })
            .await
            .unwrap();

        let exchange = f.svc.send(&owner, session.id, text("Halo")).await.unwrap();
        assert_eq!(exchange.error_type, Some(ErrorCategory::Timeout));
        assert!(exchange.ai_message.message.contains("Asisten ESR"));
        assert_eq!(exchange.ai_message.metadata["error"], true);
        assert_eq!(exchange.ai_message.metadata["error_type"], "timeout");
        assert_eq!(f.store.count_history(session.id).await.unwrap(), 2);

        // Apologies are kept out of later context.
        f.svc.send(&owner, session.id, text("Lagi")).await.unwrap();
        let seen = ai.seen.lock().unwrap();
        assert_eq!(seen[1].history.len(), 1);
        assert_eq!(seen[1].history[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn empty_send_writes_nothing() {
        let f = fixture(ScriptedAi::ok()).await;
        let owner = user(&f.store, "a@example.com", Role::User).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "Kosong".into(), chat_type: ChatType::Global })
            .await
            .unwrap();

        let res = f.svc.send(&owner, session.id, text("   ")).await;
        assert!(matches!(res, Err(CoreError::Validation(ref e)) if e.contains("message")));
        assert_eq!(f.store.count_history(session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shared_session_is_read_only() {
        let f = fixture(ScriptedAi::ok()).await;
        let owner = user(&f.store, "owner@example.com", Role::Engineer).await;
        let peer = user(&f.store, "peer@example.com", Role::Engineer).await;
        let outsider = user(&f.store, "out@example.com", Role::Drafter).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "Bersama".into(), chat_type: ChatType::Global })
            .await
            .unwrap();

        let shared = f
            .svc
            .update_session(&owner, session.id, UpdateSessionInput { is_shared: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(shared.shared_with_roles, vec![Role::Engineer]);

        assert!(f.svc.show_session(&peer, session.id).await.is_ok());
        assert!(matches!(f.svc.show_session(&outsider, session.id).await, Err(CoreError::Forbidden(_))));
        assert!(matches!(
            f.svc.send(&peer, session.id, text("Boleh?")).await,
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            f.svc.delete_session(&peer, session.id).await,
            Err(CoreError::Forbidden(_))
        ));
        assert_eq!(f.store.count_history(session.id).await.unwrap(), 0);

        let listed = f.svc.list_sessions(&peer).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].is_owner);
        assert!(f.svc.list_sessions(&outsider).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_share_role_is_rejected() {
        let f = fixture(ScriptedAi::ok()).await;
        let owner = user(&f.store, "a@example.com", Role::User).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "X".into(), chat_type: ChatType::Global })
            .await
            .unwrap();
        let res = f
            .svc
            .update_session(
                &owner,
                session.id,
                UpdateSessionInput {
                    is_shared: Some(true),
                    shared_with_roles: Some(vec!["pilot".into()]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(res, Err(CoreError::Validation(ref e)) if e.contains("shared_with_roles")));
    }

    #[tokio::test]
    async fn uploaded_images_reach_the_model_inline() {
        let ai = ScriptedAi::ok();
        let f = fixture(ai.clone()).await;
        let owner = user(&f.store, "a@example.com", Role::User).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "Foto".into(), chat_type: ChatType::Global })
            .await
            .unwrap();

        let input = SendMessageInput {
            message: String::new(),
            images: vec![ImageUpload {
                original_name: "a.png".into(),
                mime: "image/png".into(),
                data: bytes::Bytes::from_static(&[1, 2, 3]),
            }],
            image_urls: vec!["https://example.com/b.jpg".into()],
        };
        let exchange = f.svc.send(&owner, session.id, input).await.unwrap();
        assert_eq!(exchange.user_message.metadata["images"][0]["size"], 3);

        let seen = ai.seen.lock().unwrap();
        assert_eq!(
            seen[0].images,
            vec![
                ImageInput::Inline { data: vec![1, 2, 3], mime: "image/png".into() },
                ImageInput::Url("https://example.com/b.jpg".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_turn_leaves_no_image_files() {
        let f = fixture(ScriptedAi::ok()).await;
        let owner = user(&f.store, "a@example.com", Role::User).await;
        let session = f
            .svc
            .create_session(&owner, CreateSessionInput { title: "Foto".into(), chat_type: ChatType::Global })
            .await
            .unwrap();
        sqlx::query("CREATE TRIGGER reject_turns BEFORE INSERT ON chat_histories BEGIN SELECT RAISE(ABORT, 'disk full'); END")
            .execute(f.store.pool())
            .await
            .unwrap();

        let upload = |name: &str| ImageUpload {
            original_name: name.into(),
            mime: "image/png".into(),
            data: bytes::Bytes::from_static(&[1, 2, 3]),
        };
        let input = SendMessageInput { message: "lihat".into(), images: vec![upload("a.png"), upload("b.png")], image_urls: vec![] };
        assert!(matches!(f.svc.accept(&owner, session.id, input).await, Err(CoreError::Database(_))));

        let dir = f._dir.path().join("chat-images").join(session.id.to_string());
        let left = std::fs::read_dir(&dir).map(|entries| entries.count()).unwrap_or(0);
        assert_eq!(left, 0);
        assert!(f.store.list_history(session.id).await.unwrap().is_empty());
    }
}
