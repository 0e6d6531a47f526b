//! In-process publish/subscribe hub for domain events.
//!
//! Handlers are dispatched sequentially on `emit`, which resolves only
//! after every matching handler has settled. A failing handler is logged
//! and never blocks the others or the emitter. A broadcast tap is also
//! exposed for passive observers (CLI tails, tests).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::models::{DomainEvent, EventId, EventPayload, SequenceNumber};

/// Unique identifier for a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter that determines which events a handler receives.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match events whose payload variant name is in this list (empty = match all).
    pub kinds: Vec<&'static str>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: Vec<&'static str>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn matches(&self, event: &DomainEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.payload.kind())
    }
}

/// Subscriber invoked for each matching event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;

    fn filter(&self) -> EventFilter {
        EventFilter::default()
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), String>;
}

/// Cross-cutting hook run before dispatch. Failures are logged and never
/// abort dispatch.
#[async_trait]
pub trait EventMiddleware: Send + Sync {
    fn name(&self) -> &str;

    async fn before_dispatch(&self, event: &DomainEvent) -> Result<(), String>;
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Capacity of the passive broadcast tap.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

/// Central event bus for household domain events.
pub struct EventBus {
    handlers: RwLock<Vec<(HandlerId, Arc<dyn EventHandler>)>>,
    middleware: RwLock<Vec<Arc<dyn EventMiddleware>>>,
    sender: broadcast::Sender<DomainEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            handlers: RwLock::new(Vec::new()),
            middleware: RwLock::new(Vec::new()),
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Register a handler. Returns an ID usable with `unsubscribe`.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = HandlerId::new();
        let mut handlers = self.handlers.write().await;
        handlers.push((id, handler));
        id
    }

    /// Remove a handler. Returns true if it was registered.
    pub async fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    /// Add a middleware hook to the pre-dispatch chain.
    pub async fn add_middleware(&self, mw: Arc<dyn EventMiddleware>) {
        self.middleware.write().await.push(mw);
    }

    /// Publish an event: assign identity, run middleware, dispatch to every
    /// matching handler, then feed the broadcast tap. Resolves after all
    /// handlers have settled.
    pub async fn emit(&self, payload: EventPayload) -> DomainEvent {
        let event = DomainEvent {
            id: EventId::new(),
            sequence: SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst)),
            timestamp: Utc::now(),
            payload,
        };

        {
            let middleware = self.middleware.read().await;
            for mw in middleware.iter() {
                if let Err(e) = mw.before_dispatch(&event).await {
                    tracing::warn!(middleware = mw.name(), error = %e, "event middleware failed");
                }
            }
        }

        let handlers: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().await;
            handlers
                .iter()
                .filter(|(_, h)| h.filter().matches(&event))
                .map(|(_, h)| h.clone())
                .collect()
        };

        for handler in handlers {
            if let Err(e) = handler.handle(&event).await {
                // Isolation invariant: one failing subscriber never blocks
                // or fails the others, nor the emitter.
                tracing::warn!(handler = handler.name(), error = %e, "event handler failed");
            }
        }

        // Best-effort tap; no subscribers is fine.
        let _ = self.sender.send(event.clone());

        event
    }

    /// Subscribe to the passive broadcast tap.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Current sequence counter (number of events emitted).
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct CountingHandler {
        name: String,
        kinds: Vec<&'static str>,
        calls: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        fn filter(&self) -> EventFilter {
            EventFilter::new().kinds(self.kinds.clone())
        }

        async fn handle(&self, _event: &DomainEvent) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn note_added() -> EventPayload {
        EventPayload::NoteAdded {
            user_id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            note_preview: "milk".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sequence_assignment() {
        let bus = EventBus::new(EventBusConfig::default());
        let e1 = bus.emit(note_added()).await;
        let e2 = bus.emit(note_added()).await;
        assert_eq!(e1.sequence.0, 0);
        assert_eq!(e2.sequence.0, 1);
        assert_eq!(bus.current_sequence().0, 2);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = EventBus::new(EventBusConfig::default());
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        bus.register(Arc::new(CountingHandler {
            name: "failing".to_string(),
            kinds: vec![],
            calls: first.clone(),
            fail: true,
        }))
        .await;
        bus.register(Arc::new(CountingHandler {
            name: "ok".to_string(),
            kinds: vec![],
            calls: second.clone(),
            fail: false,
        }))
        .await;

        // emit must complete without error even though the first handler fails
        bus.emit(note_added()).await;

        assert_eq!(first.load(Ordering::Relaxed), 1);
        assert_eq!(second.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_filter_dispatch() {
        let bus = EventBus::new(EventBusConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        bus.register(Arc::new(CountingHandler {
            name: "notes-only".to_string(),
            kinds: vec!["NoteAdded"],
            calls: calls.clone(),
            fail: false,
        }))
        .await;

        bus.emit(note_added()).await;
        bus.emit(EventPayload::PreferenceUpdated { user_id: Uuid::new_v4() }).await;

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new(EventBusConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        let id = bus
            .register(Arc::new(CountingHandler {
                name: "temp".to_string(),
                kinds: vec![],
                calls: calls.clone(),
                fail: false,
            }))
            .await;

        bus.emit(note_added()).await;
        assert!(bus.unsubscribe(id).await);
        bus.emit(note_added()).await;

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_middleware_failure_does_not_abort_dispatch() {
        struct FailingMiddleware;

        #[async_trait]
        impl EventMiddleware for FailingMiddleware {
            fn name(&self) -> &str {
                "failing-audit"
            }

            async fn before_dispatch(&self, _event: &DomainEvent) -> Result<(), String> {
                Err("audit store unavailable".to_string())
            }
        }

        let bus = EventBus::new(EventBusConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        bus.add_middleware(Arc::new(FailingMiddleware)).await;
        bus.register(Arc::new(CountingHandler {
            name: "after-mw".to_string(),
            kinds: vec![],
            calls: calls.clone(),
            fail: false,
        }))
        .await;

        bus.emit(note_added()).await;
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_broadcast_tap() {
        let bus = EventBus::new(EventBusConfig::default());
        let mut rx = bus.subscribe();

        bus.emit(note_added()).await;
        let observed = rx.recv().await.unwrap();
        assert_eq!(observed.payload.kind(), "NoteAdded");
    }
}
