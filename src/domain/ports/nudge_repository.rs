//! Repository port for nudge persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Nudge;

#[async_trait]
pub trait NudgeRepository: Send + Sync {
    /// Persist a new nudge row.
    async fn insert(&self, nudge: &Nudge) -> DomainResult<()>;

    /// Get a nudge by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Nudge>>;

    /// List a user's nudges, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: usize) -> DomainResult<Vec<Nudge>>;

    /// List the most recent nudges across all users, newest first.
    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Nudge>>;

    /// List pending nudges due at or before `now`, oldest first, bounded.
    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> DomainResult<Vec<Nudge>>;

    /// Mark a pending nudge sent. Returns false when the row was missing
    /// or already sent; such rows are left untouched.
    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<bool>;

    /// Count nudges created for a user at or after `since`.
    async fn count_for_user_since(&self, user_id: Uuid, since: DateTime<Utc>) -> DomainResult<u32>;

    /// Count nudges of one kind created for a user at or after `since`.
    async fn count_kind_for_user_since(
        &self,
        user_id: Uuid,
        kind: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<u32>;
}
