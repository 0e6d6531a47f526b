//! Typed domain events emitted by household feature modules.
//!
//! Each payload variant carries the fields its consumers need, decoded
//! once at the emission boundary. The acting `user_id` is always present;
//! most variants also carry the `family_id` of the household.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by the EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event envelope containing identity and timing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

/// Domain event payloads, one variant per household action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    EventScheduled {
        user_id: Uuid,
        family_id: Uuid,
        title: String,
        starts_at: DateTime<Utc>,
    },
    GoalProgress {
        user_id: Uuid,
        family_id: Uuid,
        goal_title: String,
        percent: u8,
    },
    AppreciationGiven {
        user_id: Uuid,
        family_id: Uuid,
        from_name: String,
        to_user_id: Uuid,
    },
    PreferenceUpdated {
        user_id: Uuid,
    },
    PostCreated {
        user_id: Uuid,
        family_id: Uuid,
        post_kind: String,
    },
    NoteAdded {
        user_id: Uuid,
        family_id: Uuid,
        note_preview: String,
    },
}

impl EventPayload {
    /// Variant name, used by handler filters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EventScheduled { .. } => "EventScheduled",
            Self::GoalProgress { .. } => "GoalProgress",
            Self::AppreciationGiven { .. } => "AppreciationGiven",
            Self::PreferenceUpdated { .. } => "PreferenceUpdated",
            Self::PostCreated { .. } => "PostCreated",
            Self::NoteAdded { .. } => "NoteAdded",
        }
    }

    /// The acting user behind this event.
    pub fn user_id(&self) -> Uuid {
        match self {
            Self::EventScheduled { user_id, .. }
            | Self::GoalProgress { user_id, .. }
            | Self::AppreciationGiven { user_id, .. }
            | Self::PreferenceUpdated { user_id }
            | Self::PostCreated { user_id, .. }
            | Self::NoteAdded { user_id, .. } => *user_id,
        }
    }

    /// The household this event belongs to, if any.
    pub fn family_id(&self) -> Option<Uuid> {
        match self {
            Self::EventScheduled { family_id, .. }
            | Self::GoalProgress { family_id, .. }
            | Self::AppreciationGiven { family_id, .. }
            | Self::PostCreated { family_id, .. }
            | Self::NoteAdded { family_id, .. } => Some(*family_id),
            Self::PreferenceUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind_names() {
        let payload = EventPayload::PreferenceUpdated { user_id: Uuid::new_v4() };
        assert_eq!(payload.kind(), "PreferenceUpdated");

        let payload = EventPayload::GoalProgress {
            user_id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            goal_title: "read more".to_string(),
            percent: 50,
        };
        assert_eq!(payload.kind(), "GoalProgress");
    }

    #[test]
    fn test_user_id_always_present() {
        let user = Uuid::new_v4();
        let payload = EventPayload::NoteAdded {
            user_id: user,
            family_id: Uuid::new_v4(),
            note_preview: "grocery list".to_string(),
        };
        assert_eq!(payload.user_id(), user);
        assert!(payload.family_id().is_some());

        let payload = EventPayload::PreferenceUpdated { user_id: user };
        assert!(payload.family_id().is_none());
    }
}
