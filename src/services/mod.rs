pub mod event_bus;
pub mod handlers;
pub mod message_composer;
pub mod nudge_scheduler;
pub mod preference_cache;
pub mod rate_limiter;

pub use event_bus::{EventBus, EventBusConfig, EventFilter, EventHandler, EventMiddleware, HandlerId};
pub use handlers::{NudgeTriggerHandler, PreferenceInvalidationHandler};
pub use message_composer::MessageCatalog;
pub use nudge_scheduler::{NudgePolicy, NudgeScheduler};
pub use preference_cache::PreferenceCache;
pub use rate_limiter::{operation, OperationConfig, RateLimiter};
