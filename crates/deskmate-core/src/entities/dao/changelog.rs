use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangelogType {
    Major,
    Minor,
    Patch,
    Hotfix,
}

/// A row in the `changelogs` table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Changelog {
    pub id: i64,
    /// Globally unique release identifier, e.g. `"2.4.1"`.
    pub version: String,
    pub release_date: NaiveDate,
    #[serde(rename = "type")]
    pub change_type: ChangelogType,
    pub title: String,
    pub description: String,
    pub changes: Vec<String>,
    pub technical_notes: Vec<String>,
    pub is_published: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in `user_changelog_views`: user `user_id` has seen `changelog_id`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserChangelogView {
    pub id: i64,
    pub user_id: i64,
    pub changelog_id: i64,
    pub viewed_at: DateTime<Utc>,
}
