//! Application configuration structs
//!
//! Loads configuration from `CHAT_*` environment variables (and a `.env`
//! file when present). Every field falls back to a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: default_env(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

/// Window sizing, pagination and local policy windows
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Entries fetched by the initial bounded load
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Entries per backward page (one extra is fetched for the boundary)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_edit_window_ms")]
    pub edit_window_ms: u64,
    /// Upper bound on initial and pagination fetches
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_reply_preview_len")]
    pub reply_preview_len: usize,
    #[serde(default = "default_max_body_len")]
    pub max_body_len: usize,
}

impl SyncConfig {
    #[must_use]
    pub fn edit_window(&self) -> Duration {
        Duration::from_millis(self.edit_window_ms)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            page_size: default_page_size(),
            edit_window_ms: default_edit_window_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            reply_preview_len: default_reply_preview_len(),
            max_body_len: default_max_body_len(),
        }
    }
}

/// Which log backend adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Redis,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

/// Log backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Prefix for every Redis key and channel
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Directory for the on-disk profile cache; memory only when unset
    #[serde(default)]
    pub profile_cache_dir: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            pool_size: default_pool_size(),
            profile_cache_dir: None,
        }
    }
}

/// Media upload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Upload endpoint; attachments are rejected when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u32,
    #[serde(default = "default_upload_timeout_ms")]
    pub timeout_ms: u64,
}

impl UploadConfig {
    #[must_use]
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb as usize * 1024 * 1024
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_file_size_mb: default_max_file_size(),
            timeout_ms: default_upload_timeout_ms(),
        }
    }
}

/// Moderator elevation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModerationConfig {
    /// Argon2 PHC string of the moderator passphrase
    #[serde(default)]
    pub passphrase_hash: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "chat-sync".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_window_size() -> usize {
    30
}

fn default_page_size() -> usize {
    20
}

fn default_edit_window_ms() -> u64 {
    180_000 // 3 minutes
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_reply_preview_len() -> usize {
    100
}

fn default_max_body_len() -> usize {
    2000
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "chat".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_max_file_size() -> u32 {
    10
}

fn default_upload_timeout_ms() -> u64 {
    30_000
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparsable value
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let config = Self {
            app: AppSettings {
                name: vars.string("CHAT_APP_NAME").unwrap_or_else(default_app_name),
                env: vars.parse("CHAT_ENV")?.unwrap_or_default(),
            },
            sync: SyncConfig {
                window_size: vars
                    .parse("CHAT_WINDOW_SIZE")?
                    .unwrap_or_else(default_window_size),
                page_size: vars
                    .parse("CHAT_PAGE_SIZE")?
                    .unwrap_or_else(default_page_size),
                edit_window_ms: vars
                    .parse("CHAT_EDIT_WINDOW_MS")?
                    .unwrap_or_else(default_edit_window_ms),
                fetch_timeout_ms: vars
                    .parse("CHAT_FETCH_TIMEOUT_MS")?
                    .unwrap_or_else(default_fetch_timeout_ms),
                reply_preview_len: vars
                    .parse("CHAT_REPLY_PREVIEW_LEN")?
                    .unwrap_or_else(default_reply_preview_len),
                max_body_len: vars
                    .parse("CHAT_MAX_BODY_LEN")?
                    .unwrap_or_else(default_max_body_len),
            },
            backend: BackendConfig {
                kind: vars.parse("CHAT_BACKEND")?.unwrap_or_default(),
                redis_url: vars.string("CHAT_REDIS_URL").unwrap_or_else(default_redis_url),
                key_prefix: vars
                    .string("CHAT_KEY_PREFIX")
                    .unwrap_or_else(default_key_prefix),
                pool_size: vars
                    .parse("CHAT_REDIS_POOL_SIZE")?
                    .unwrap_or_else(default_pool_size),
                profile_cache_dir: vars.string("CHAT_PROFILE_CACHE_DIR"),
            },
            upload: UploadConfig {
                endpoint: vars.string("CHAT_UPLOAD_ENDPOINT"),
                max_file_size_mb: vars
                    .parse("CHAT_UPLOAD_MAX_FILE_SIZE_MB")?
                    .unwrap_or_else(default_max_file_size),
                timeout_ms: vars
                    .parse("CHAT_UPLOAD_TIMEOUT_MS")?
                    .unwrap_or_else(default_upload_timeout_ms),
            },
            moderation: ModerationConfig {
                passphrase_hash: vars.string("CHAT_MODERATOR_PASSPHRASE_HASH"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.window_size == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_WINDOW_SIZE",
                "must be at least 1".to_string(),
            ));
        }
        if self.sync.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_PAGE_SIZE",
                "must be at least 1".to_string(),
            ));
        }
        if self.sync.fetch_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_FETCH_TIMEOUT_MS",
                "must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|e: T::Err| ConfigError::InvalidValue(key, e.to_string()))
            })
            .transpose()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
