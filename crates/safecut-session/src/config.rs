use safecut_core::{Language, DAILY_LIMIT};
use std::path::PathBuf;

/// Default URL placed in the invite payload.
pub const DEFAULT_APP_URL: &str = "https://safecut.app";

/// Session configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite usage database.
    pub db_path: PathBuf,
    /// Free analyses per day before bonus credits count.
    pub daily_limit: u32,
    /// URL shared by the invite flow.
    pub app_url: String,
    /// Language the session starts in.
    pub language: Language,
    /// Command used as the native share sheet. `None` means there is no
    /// share sheet and invites copy the link instead.
    pub share_command: Option<String>,
}

impl Config {
    /// Load configuration from `SAFECUT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("safecut");

        let db_path = std::env::var("SAFECUT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("usage.db"));

        let language = std::env::var("SAFECUT_LANG")
            .ok()
            .and_then(|v| match v.parse::<Language>() {
                Ok(lang) => Some(lang),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring SAFECUT_LANG");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            db_path,
            daily_limit: env_u32("SAFECUT_DAILY_LIMIT", DAILY_LIMIT),
            app_url: std::env::var("SAFECUT_APP_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            language,
            share_command: std::env::var("SAFECUT_SHARE_COMMAND")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
