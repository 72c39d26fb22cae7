//! Process-lifetime override cache.

use async_trait::async_trait;
use chat_core::{ModeratorOverride, ProfileCache, RepoResult, UserId};
use dashmap::DashMap;

/// Override cache that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryProfileCache {
    overrides: DashMap<UserId, ModeratorOverride>,
}

impl MemoryProfileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileCache for MemoryProfileCache {
    async fn load(&self, user: &UserId) -> RepoResult<Option<ModeratorOverride>> {
        Ok(self.overrides.get(user).map(|entry| entry.value().clone()))
    }

    async fn store(&self, user: &UserId, value: &ModeratorOverride) -> RepoResult<()> {
        self.overrides.insert(user.clone(), value.clone());
        Ok(())
    }

    async fn clear(&self, user: &UserId) -> RepoResult<()> {
        self.overrides.remove(user);
        Ok(())
    }
}
