use std::path::PathBuf;

use thiserror::Error;

use crate::settings::UserId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot: BotConfig,
    pub http: HttpConfig,
    pub settings: SettingsConfig,
    pub rename: RenameConfig,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub owner_id: UserId,
    /// Base URL of the Bot API, without trailing slash
    pub api_url: String,
    pub update_mode: UpdateMode,
    pub poll_timeout_seconds: u64,
    pub webhook_url: Option<String>,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Polling,
    Webhook,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsBackend {
    File,
    Redb,
}

#[derive(Debug, Clone)]
pub struct SettingsConfig {
    pub backend: SettingsBackend,
    /// JSON document used by the file backend
    pub path: String,
    /// Directory holding the redb database
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct RenameConfig {
    /// Parent directory for per-rename scratch directories
    pub work_dir: PathBuf,
    pub ffmpeg_path: String,
    /// Pending renames older than this are discarded. 0 disables expiry.
    pub pending_ttl_seconds: u64,
    /// Idle time after which a session's worker task retires
    pub session_idle_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            backend: SettingsBackend::File,
            path: "settings.json".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            ffmpeg_path: "ffmpeg".to_string(),
            pending_ttl_seconds: 24 * 60 * 60,
            session_idle_seconds: 300,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let owner_raw = lookup("OWNER_ID").ok_or(ConfigError::Missing("OWNER_ID"))?;
        let owner_id = owner_raw.trim().parse::<i64>().map_err(|_| {
            ConfigError::ValidationError(format!("OWNER_ID must be an integer, got '{owner_raw}'"))
        })?;

        let api_url = lookup("TELEGRAM_API_URL")
            .unwrap_or_else(|| "https://api.telegram.org".to_string())
            .trim_end_matches('/')
            .to_string();

        let update_mode = match lookup("UPDATE_MODE")
            .unwrap_or_else(|| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => UpdateMode::Webhook,
            _ => UpdateMode::Polling,
        };

        let poll_timeout_seconds = lookup("POLL_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let settings_backend = match lookup("SETTINGS_BACKEND")
            .unwrap_or_else(|| "file".to_string())
            .to_lowercase()
            .as_str()
        {
            "redb" => SettingsBackend::Redb,
            _ => SettingsBackend::File,
        };

        let defaults = RenameConfig::default();

        let config = Config {
            bot: BotConfig {
                token,
                owner_id: UserId(owner_id),
                api_url,
                update_mode,
                poll_timeout_seconds,
                webhook_url: lookup("WEBHOOK_URL"),
                webhook_secret: lookup("WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            },
            http: HttpConfig {
                bind_address: lookup("BIND_ADDRESS")
                    .unwrap_or_else(|| HttpConfig::default().bind_address),
            },
            settings: SettingsConfig {
                backend: settings_backend,
                path: lookup("SETTINGS_PATH").unwrap_or_else(|| "settings.json".to_string()),
                data_dir: lookup("DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            },
            rename: RenameConfig {
                work_dir: lookup("WORK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.work_dir),
                ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
                pending_ttl_seconds: lookup("PENDING_TTL_SECONDS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.pending_ttl_seconds),
                session_idle_seconds: lookup("SESSION_IDLE_SECONDS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.session_idle_seconds),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.update_mode == UpdateMode::Webhook && self.bot.webhook_url.is_none() {
            return Err(ConfigError::ValidationError(
                "WEBHOOK_URL is required when UPDATE_MODE=webhook".to_string(),
            ));
        }

        let dangerous_chars = [';', '|', '&', '$', '`', '<', '>', '\n', '\r'];
        if self
            .rename
            .ffmpeg_path
            .chars()
            .any(|c| dangerous_chars.contains(&c))
        {
            return Err(ConfigError::ValidationError(
                "FFMPEG_PATH contains invalid characters".to_string(),
            ));
        }

        if self.rename.pending_ttl_seconds > crate::pending::MAX_TTL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "PENDING_TTL_SECONDS must be at most {}",
                crate::pending::MAX_TTL_SECONDS
            )));
        }

        if self.bot.update_mode == UpdateMode::Webhook && self.bot.webhook_secret.is_none() {
            tracing::warn!(
                "WEBHOOK_SECRET is not set. Anyone who learns the webhook URL can inject updates."
            );
        }

        Ok(())
    }
}
