//! Persistence layer.
//!
//! Each `*Store` trait describes one aggregate's queries; [`SqliteStore`]
//! implements all of them. Trait methods use `impl Future` in their
//! signatures so no `async-trait` boxing is needed on this hot path.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`)
//! so that lexical order in SQL equals chronological order.

pub mod changelog;
pub mod dao;
pub mod history;
pub mod session;
pub mod token;
pub mod user;

pub use dao::{
    ChatHistory, ChatSession, ChatType, Changelog, ChangelogType, Role, Sender, User,
    UserChangelogView,
};

pub use changelog::{ChangelogStore, ChangelogWrite};
pub use history::{HistoryStore, NewHistory};
pub use session::{NewSession, SessionStore};
pub use token::TokenStore;
pub use user::{NewUser, UserStore};

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// SQLite-backed store for every deskmate aggregate.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://deskmate.db"`, or
    /// `"sqlite::memory:"` for tests. In-memory databases are pinned to a
    /// single connection that never idles out, otherwise each pooled
    /// connection would see its own empty database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options)
                .await?
        };

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Fresh in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query; used by the health check.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ── shared row helpers ─────────────────────────────────────────────────────────

pub(crate) fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}

/// Parse a lowercase enum column, logging and falling back on corrupt rows.
pub(crate) fn parse_enum<T: FromStr>(raw: &str, column: &'static str, fallback: T) -> T {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(raw = %raw, column, "unknown enum value in row; using fallback");
        fallback
    })
}

/// Decode a JSON array column of strings.
pub(crate) fn parse_json_list(raw: &str, column: &'static str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(raw = %raw, column, error = %e, "invalid JSON list in row");
        Vec::new()
    })
}
