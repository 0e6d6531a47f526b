//! Ports (trait boundaries) consumed by the service layer.

pub mod clock;
pub mod delivery_sink;
pub mod nudge_repository;
pub mod preference_repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery_sink::DeliverySink;
pub use nudge_repository::NudgeRepository;
pub use preference_repository::PreferenceRepository;
