//! # chat-common
//!
//! Shared utilities including configuration, error handling, the moderator
//! passphrase check, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{hash_passphrase, verify_passphrase, PassphraseVerifier};
pub use config::{
    AppConfig, AppSettings, BackendConfig, BackendKind, ConfigError, Environment,
    ModerationConfig, SyncConfig, UploadConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
