//! Hearth: a household coordination nudge engine.
//!
//! Hearth listens to household domain events (calendar entries, goal
//! progress, appreciations, notes) and decides whether and when to nudge
//! a household member, respecting per-user quiet hours, category mutes,
//! rate limits, and daily caps. Accepted nudges are persisted to a
//! durable queue and delivered on a periodic tick.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports, and errors
//! - **Service Layer** (`services`): event bus, rate limiter, preference
//!   cache, message composer, nudge scheduler
//! - **Adapters** (`adapters`): SQLite repositories and delivery sinks
//! - **Infrastructure** (`infrastructure`): config loading, logging

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, DomainEvent, EventPayload, Language, MessagePack, Nudge, NudgeStatus, Preferences,
    QuietHours,
};
pub use domain::ports::{Clock, DeliverySink, NudgeRepository, PreferenceRepository, SystemClock};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    EventBus, EventBusConfig, MessageCatalog, NudgePolicy, NudgeScheduler, PreferenceCache,
    RateLimiter,
};
