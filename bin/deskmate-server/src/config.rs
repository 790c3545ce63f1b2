//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use deskmate_core::ai::AiConfig;

/// Runtime configuration for deskmate-server.
///
/// Every field has a default so the server starts without any environment
/// variables set. AI calls fail softly (canned replies) until a provider key
/// is configured.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://deskmate.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rolling log files; stdout only when unset.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated allowed origins; any origin when unset.
    pub cors_allowed_origins: Option<String>,

    /// Serve `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Root for chat uploads and Excel outputs.
    pub storage_dir: PathBuf,

    pub excel_template: PathBuf,

    /// JSON slot layout; the built-in layout when unset.
    pub excel_layout: Option<PathBuf>,

    /// Wall-clock budget for a synchronous photo run.
    pub photo_time_budget: Duration,

    /// Pause between SSE chunks.
    pub stream_chunk_delay: Duration,

    /// Request body limit for multipart uploads.
    pub max_upload_bytes: usize,

    pub admin_name: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    pub ai: AiConfig,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let storage_dir = PathBuf::from(env_or(&lookup, "DESK_STORAGE_DIR", "storage"));
        Self {
            bind_address: env_or(&lookup, "DESK_BIND", "0.0.0.0:3000"),
            database_url: env_or(&lookup, "DESK_DATABASE_URL", "sqlite://deskmate.db"),
            log_level: env_or(&lookup, "DESK_LOG", "info"),
            log_json: flag(&lookup, "DESK_LOG_JSON", false),
            log_dir: non_empty(&lookup, "DESK_LOG_DIR").map(PathBuf::from),
            cors_allowed_origins: non_empty(&lookup, "DESK_CORS_ORIGINS"),
            enable_docs: flag(&lookup, "DESK_ENABLE_DOCS", true),
            excel_template: non_empty(&lookup, "DESK_EXCEL_TEMPLATE")
                .map(PathBuf::from)
                .unwrap_or_else(|| storage_dir.join("excel").join("template.xlsx")),
            excel_layout: non_empty(&lookup, "DESK_EXCEL_LAYOUT").map(PathBuf::from),
            photo_time_budget: Duration::from_secs(parse_env(&lookup, "DESK_PHOTO_TIME_BUDGET_SECS", 300)),
            stream_chunk_delay: Duration::from_millis(parse_env(&lookup, "DESK_STREAM_CHUNK_DELAY_MS", 40)),
            max_upload_bytes: parse_env::<usize>(&lookup, "DESK_MAX_UPLOAD_MB", 100).saturating_mul(1024 * 1024),
            admin_name: env_or(&lookup, "DESK_ADMIN_NAME", "Super Admin"),
            admin_email: non_empty(&lookup, "DESK_ADMIN_EMAIL"),
            admin_password: non_empty(&lookup, "DESK_ADMIN_PASSWORD"),
            ai: AiConfig::from_lookup(&lookup),
            storage_dir,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn env_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    non_empty(lookup, key).unwrap_or_else(|| default.to_owned())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    non_empty(lookup, key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    non_empty(lookup, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[]);
        assert_eq!(cfg.bind_address, "0.0.0.0:3000");
        assert_eq!(cfg.stream_chunk_delay, Duration::from_millis(40));
        assert_eq!(cfg.excel_template, PathBuf::from("storage/excel/template.xlsx"));
        assert!(cfg.enable_docs);
        assert!(!cfg.log_json);
        assert!(cfg.admin_email.is_none());
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = config(&[
            ("DESK_LOG_JSON", "TRUE"),
            ("DESK_PHOTO_TIME_BUDGET_SECS", "abc"),
            ("DESK_MAX_UPLOAD_MB", "2"),
            ("DESK_STORAGE_DIR", "/data"),
            ("DESK_AI_PROVIDER", "openai"),
        ]);
        assert!(cfg.log_json);
        assert_eq!(cfg.photo_time_budget, Duration::from_secs(300));
        assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);
        assert_eq!(cfg.excel_template, PathBuf::from("/data/excel/template.xlsx"));
        assert_eq!(cfg.ai.provider, deskmate_core::ai::Provider::Openai);
    }
}
