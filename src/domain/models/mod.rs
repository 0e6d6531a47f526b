//! Domain models for the Hearth nudge engine.

pub mod config;
pub mod event;
pub mod nudge;
pub mod preferences;

pub use config::{Config, DatabaseConfig, DeliveryConfig, LoggingConfig, RateLimitConfig};
pub use event::{DomainEvent, EventId, EventPayload, SequenceNumber};
pub use nudge::{category_for_kind, default_kind_limit, kind, Nudge, NudgeStatus};
pub use preferences::{Language, MessagePack, Preferences, QuietHours};
