//! Scheduled notification (nudge) model and kind metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known nudge kinds.
pub mod kind {
    pub const BIRTHDAY_PRE: &str = "birthday_pre";
    pub const GRATITUDE_POST: &str = "gratitude_post";
    pub const GOAL_MILESTONE: &str = "goal_milestone";
    pub const EVENT_UPCOMING: &str = "event_upcoming";
    pub const NOTE_REPLY: &str = "note_reply";
    pub const WEEKLY_CHECKIN: &str = "weekly_checkin";
}

/// Map a nudge kind to its muteable category.
pub fn category_for_kind(k: &str) -> &'static str {
    match k {
        kind::BIRTHDAY_PRE => "birthdays",
        kind::GRATITUDE_POST => "gratitude",
        kind::GOAL_MILESTONE => "goals",
        kind::EVENT_UPCOMING => "events",
        kind::NOTE_REPLY => "notes",
        kind::WEEKLY_CHECKIN => "checkins",
        _ => "general",
    }
}

/// Built-in per-kind daily limits, overridable per user.
pub fn default_kind_limit(k: &str) -> u32 {
    match k {
        kind::GRATITUDE_POST => 3,
        kind::NOTE_REPLY => 2,
        _ => 1,
    }
}

/// Delivery status of a nudge. Once `Sent`, the row is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeStatus {
    Pending,
    Sent,
}

impl NudgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            _ => None,
        }
    }
}

/// A scheduled, templated notification directed at one user.
///
/// The message text is rendered once at enqueue time and frozen; `meta`
/// keeps the render variables for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nudge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub meta: BTreeMap<String, String>,
    pub status: NudgeStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Nudge {
    pub fn new(
        user_id: Uuid,
        kind: impl Into<String>,
        message: impl Into<String>,
        scheduled_for: DateTime<Utc>,
        meta: BTreeMap<String, String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.into(),
            message: message.into(),
            scheduled_for,
            meta,
            status: NudgeStatus::Pending,
            sent_at: None,
            created_at,
        }
    }
}
