//! Read-through preference cache backed by moka.
//!
//! No TTL: correctness relies on event-driven invalidation bound to
//! `PreferenceUpdated`. A missed invalidation leaves stale data until the
//! next one; a documented risk, not fatal. Store failures fall back to
//! the default preference set without caching it, so the next access
//! retries the store.

use std::sync::Arc;

use moka::future::Cache;
use uuid::Uuid;

use crate::domain::models::Preferences;
use crate::domain::ports::PreferenceRepository;

/// Maximum number of cached preference entries.
const CACHE_MAX_CAPACITY: u64 = 10_000;

pub struct PreferenceCache<P: PreferenceRepository> {
    repo: Arc<P>,
    cache: Cache<Uuid, Arc<Preferences>>,
}

impl<P: PreferenceRepository> PreferenceCache<P> {
    pub fn new(repo: Arc<P>) -> Self {
        let cache = Cache::builder().max_capacity(CACHE_MAX_CAPACITY).build();
        Self { repo, cache }
    }

    /// Get a user's preferences: cache hit, else fetch from the store,
    /// substituting (and caching) the defaults for an absent row.
    pub async fn get(&self, user_id: Uuid) -> Arc<Preferences> {
        if let Some(cached) = self.cache.get(&user_id).await {
            return cached;
        }

        match self.repo.get(user_id).await {
            Ok(Some(prefs)) => {
                let prefs = Arc::new(prefs);
                self.cache.insert(user_id, prefs.clone()).await;
                prefs
            }
            Ok(None) => {
                let prefs = Arc::new(Preferences::default_for(user_id));
                self.cache.insert(user_id, prefs.clone()).await;
                prefs
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "preference fetch failed, using defaults");
                Arc::new(Preferences::default_for(user_id))
            }
        }
    }

    /// Evict a user's cached entry; the next access re-reads the store.
    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(&user_id).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DomainError, DomainResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct StubPrefRepo {
        rows: RwLock<HashMap<Uuid, Preferences>>,
        fail: AtomicBool,
        fetches: AtomicU32,
    }

    #[async_trait]
    impl PreferenceRepository for StubPrefRepo {
        async fn get(&self, user_id: Uuid) -> DomainResult<Option<Preferences>> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            if self.fail.load(Ordering::Relaxed) {
                return Err(DomainError::DatabaseError("connection refused".to_string()));
            }
            Ok(self.rows.read().await.get(&user_id).cloned())
        }

        async fn upsert(&self, prefs: &Preferences) -> DomainResult<()> {
            self.rows.write().await.insert(prefs.user_id, prefs.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_absent_row_substitutes_defaults() {
        let repo = Arc::new(StubPrefRepo::default());
        let cache = PreferenceCache::new(repo);
        let user = Uuid::new_v4();

        let prefs = cache.get(user).await;
        assert_eq!(*prefs, Preferences::default_for(user).clone_with_timestamp(&prefs));
    }

    #[tokio::test]
    async fn test_read_through_caches() {
        let repo = Arc::new(StubPrefRepo::default());
        let mut stored = Preferences::default_for(Uuid::new_v4());
        stored.bot_name = "Noor".to_string();
        repo.upsert(&stored).await.unwrap();

        let cache = PreferenceCache::new(repo.clone());
        assert_eq!(cache.get(stored.user_id).await.bot_name, "Noor");
        assert_eq!(cache.get(stored.user_id).await.bot_name, "Noor");
        assert_eq!(repo.fetches.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let repo = Arc::new(StubPrefRepo::default());
        let mut stored = Preferences::default_for(Uuid::new_v4());
        stored.bot_name = "Noor".to_string();
        repo.upsert(&stored).await.unwrap();

        let cache = PreferenceCache::new(repo.clone());
        assert_eq!(cache.get(stored.user_id).await.bot_name, "Noor");

        stored.bot_name = "Badr".to_string();
        repo.upsert(&stored).await.unwrap();
        // Still cached until invalidated
        assert_eq!(cache.get(stored.user_id).await.bot_name, "Noor");

        cache.invalidate(stored.user_id).await;
        assert_eq!(cache.get(stored.user_id).await.bot_name, "Badr");
    }

    #[tokio::test]
    async fn test_store_failure_returns_defaults_without_caching() {
        let repo = Arc::new(StubPrefRepo::default());
        repo.fail.store(true, Ordering::Relaxed);
        let cache = PreferenceCache::new(repo.clone());
        let user = Uuid::new_v4();

        let prefs = cache.get(user).await;
        assert_eq!(prefs.bot_name, "Hearth");

        // Store recovers; next access must hit it again (error not cached).
        repo.fail.store(false, Ordering::Relaxed);
        let mut stored = Preferences::default_for(user);
        stored.bot_name = "Noor".to_string();
        repo.upsert(&stored).await.unwrap();

        assert_eq!(cache.get(user).await.bot_name, "Noor");
    }

    impl Preferences {
        /// Equality helper: timestamps differ between two `default_for` calls.
        fn clone_with_timestamp(mut self, other: &Preferences) -> Preferences {
            self.updated_at = other.updated_at;
            self
        }
    }
}
