//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BackendConfig, BackendKind, ConfigError, Environment,
    ModerationConfig, SyncConfig, UploadConfig,
};
