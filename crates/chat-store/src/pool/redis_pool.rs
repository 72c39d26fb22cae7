//! Redis connection pool using deadpool-redis.

use chat_core::{DomainError, MessageKey};
use deadpool_redis::{Config, Pool, Runtime};

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 10,
        }
    }
}

impl From<&chat_common::BackendConfig> for RedisPoolConfig {
    fn from(config: &chat_common::BackendConfig) -> Self {
        Self {
            url: config.redis_url.clone(),
            max_connections: config.pool_size,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction kept conflicting after {0} attempts")]
    Contended(usize),

    #[error("Entry not found: {path}/{key}")]
    EntryNotFound { path: String, key: MessageKey },
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

impl From<RedisPoolError> for DomainError {
    fn from(err: RedisPoolError) -> Self {
        match err {
            RedisPoolError::EntryNotFound { path, key } => DomainError::EntryNotFound { path, key },
            // ACL rejections are policy, not availability
            RedisPoolError::Redis(e) if e.code() == Some("NOPERM") => {
                DomainError::PermissionDenied(e.to_string())
            }
            RedisPoolError::Serialization(e) => DomainError::InternalError(e.to_string()),
            other => DomainError::BackendUnavailable(other.to_string()),
        }
    }
}

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
    url: String,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Redact credentials from URL for logging
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self {
            pool,
            url: config.url,
        })
    }

    /// Create a new Redis pool from the backend section of the app config
    pub fn from_config(config: &chat_common::BackendConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Open a dedicated client, for connections that leave the pool (pub/sub)
    pub fn client(&self) -> RedisResult<redis::Client> {
        Ok(redis::Client::open(self.url.as_str())?)
    }

    /// Get the current pool status
    #[must_use]
    pub fn status(&self) -> deadpool_redis::Status {
        self.pool.status()
    }
}
