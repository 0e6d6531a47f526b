//! Repository port for preference persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Preferences;

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Fetch a user's stored preferences, if any.
    async fn get(&self, user_id: Uuid) -> DomainResult<Option<Preferences>>;

    /// Insert or replace a user's preferences.
    async fn upsert(&self, prefs: &Preferences) -> DomainResult<()>;
}
