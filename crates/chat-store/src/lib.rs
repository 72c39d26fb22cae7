//! # chat-store
//!
//! Backend adapters for the sync engine.
//!
//! ## Features
//!
//! - **MemoryLog**: in-process log with tail subscriptions, for single-process use and tests
//! - **RedisLog**: shared log on Redis (hash + sorted index + pub/sub change channel)
//! - **Connection Pool**: managed Redis connection pool with deadpool
//! - **Profile caches**: device-local moderator override storage (memory or JSON files)
//!
//! ## Example
//!
//! ```ignore
//! use chat_store::{build_backend, profile_cache_for};
//!
//! let config = chat_common::AppConfig::from_env()?;
//! let backend = build_backend(&config.backend)?;
//! let cache = profile_cache_for(&config.backend);
//! ```

use std::sync::Arc;

use chat_common::{BackendConfig, BackendKind};
use chat_core::{LogBackend, ProfileCache, RepoResult};
use serde_json::Value;

pub mod memory;
pub mod pool;
pub mod profile_cache;
pub mod redis_log;

pub use memory::MemoryLog;
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};
pub use profile_cache::{FileProfileCache, MemoryProfileCache};
pub use redis_log::{RedisKeys, RedisLog};

/// Field the backend stamps with its own clock on push
pub const CREATED_AT_FIELD: &str = "created_at";

/// Overwrite `created_at` on object values; other values are left alone
pub(crate) fn stamp_created_at(value: &mut Value, millis: i64) {
    if let Value::Object(map) = value {
        map.insert(CREATED_AT_FIELD.to_string(), Value::from(millis));
    }
}

/// Build the log backend selected by configuration
pub fn build_backend(config: &BackendConfig) -> RepoResult<Arc<dyn LogBackend>> {
    match config.kind {
        BackendKind::Memory => {
            tracing::info!("Using in-memory log backend");
            Ok(Arc::new(MemoryLog::new()))
        }
        BackendKind::Redis => {
            let pool = RedisPool::from_config(config)?;
            Ok(Arc::new(RedisLog::new(pool, config.key_prefix.clone())))
        }
    }
}

/// Build the profile cache selected by configuration
pub fn profile_cache_for(config: &BackendConfig) -> Arc<dyn ProfileCache> {
    match &config.profile_cache_dir {
        Some(dir) => Arc::new(FileProfileCache::new(dir)),
        None => Arc::new(MemoryProfileCache::new()),
    }
}
