use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::user::Role;
use crate::persona::Persona;

/// Whether a session talks to the generic assistant or to the owner's persona.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatType {
    Global,
    Persona,
}

/// A row in the `chat_sessions` table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub chat_type: ChatType,
    /// Set only for `chat_type = persona`; equals the owner's role at creation.
    pub persona: Option<Persona>,
    pub is_shared: bool,
    pub shared_with_roles: Vec<Role>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
