//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use deskmate_core::ai::AiBackend;
use deskmate_core::changelog::ChangelogService;
use deskmate_core::chat::{ChatService, ImageStore};
use deskmate_core::entities::SqliteStore;
use deskmate_core::excel::{Layout, PhotoPlacementService};
use deskmate_core::users::UserService;
use deskmate_core::CoreResult;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub store: SqliteStore,
    pub chat: ChatService,
    pub users: UserService,
    pub changelog: ChangelogService,
    pub excel: PhotoPlacementService,
}

impl AppState {
    /// Wire every service over one store. `ai` is injected so tests can
    /// swap in a scripted backend.
    pub fn new(config: Config, store: SqliteStore, ai: Arc<dyn AiBackend>) -> CoreResult<Self> {
        let layout = Layout::load(config.excel_layout.as_deref())?;
        let excel = PhotoPlacementService::new(
            config.excel_template.clone(),
            layout,
            &config.storage_dir,
            config.photo_time_budget,
        )?;
        Ok(Self {
            chat: ChatService::new(store.clone(), ai, ImageStore::new(config.storage_dir.clone())),
            users: UserService::new(store.clone()),
            changelog: ChangelogService::new(store.clone()),
            excel,
            store,
            config: Arc::new(config),
        })
    }
}
