//! Delivery sink implementations.
//!
//! The scheduler is sink-agnostic; these are the shipped targets.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::errors::DomainResult;
use crate::domain::models::Nudge;
use crate::domain::ports::DeliverySink;

/// Emits each delivered nudge as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDeliverySink;

#[async_trait]
impl DeliverySink for TracingDeliverySink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn deliver(&self, nudge: &Nudge) -> DomainResult<()> {
        tracing::info!(
            user = %nudge.user_id,
            kind = %nudge.kind,
            message = %nudge.message,
            "nudge delivered"
        );
        Ok(())
    }
}

/// Fans delivered nudges out on a broadcast channel (CLI tail, UI toasts).
pub struct BroadcastDeliverySink {
    sender: broadcast::Sender<Nudge>,
}

impl BroadcastDeliverySink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Nudge> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl DeliverySink for BroadcastDeliverySink {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn deliver(&self, nudge: &Nudge) -> DomainResult<()> {
        // No subscribers is fine; display is best-effort.
        let _ = self.sender.send(nudge.clone());
        Ok(())
    }
}
