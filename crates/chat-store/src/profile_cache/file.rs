//! JSON-file override cache, so a moderator's look survives restarts
//! and offline starts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chat_core::{DomainError, ModeratorOverride, ProfileCache, RepoResult, UserId};

/// One JSON file per user under a cache directory
#[derive(Debug, Clone)]
pub struct FileProfileCache {
    dir: PathBuf,
}

impl FileProfileCache {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, user: &UserId) -> PathBuf {
        // Ids are opaque; keep file names portable
        let name: String = user
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("override-{name}.json"))
    }
}

fn cache_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::CacheError(e.to_string())
}

#[async_trait]
impl ProfileCache for FileProfileCache {
    async fn load(&self, user: &UserId) -> RepoResult<Option<ModeratorOverride>> {
        let raw = match tokio::fs::read(self.file_for(user)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_error(e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // A corrupt cache is as good as an empty one
                tracing::warn!(user = %user, error = %e, "Discarding unreadable override cache");
                Ok(None)
            }
        }
    }

    async fn store(&self, user: &UserId, value: &ModeratorOverride) -> RepoResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(cache_error)?;
        let raw = serde_json::to_vec_pretty(value).map_err(cache_error)?;
        tokio::fs::write(self.file_for(user), raw)
            .await
            .map_err(cache_error)
    }

    async fn clear(&self, user: &UserId) -> RepoResult<()> {
        match tokio::fs::remove_file(self.file_for(user)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_error(e)),
        }
    }
}
