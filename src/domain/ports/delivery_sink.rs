//! Abstraction over "show this nudge to the user".

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Nudge;

/// Delivery target invoked by the scheduler for due nudges.
///
/// Delivery is best-effort: a failed delivery leaves the nudge pending
/// for the next tick (at-least-once, never exactly-once).
#[async_trait]
pub trait DeliverySink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, nudge: &Nudge) -> DomainResult<()>;
}
