//! Per-user notification preferences.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display language for rendered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ar,
    Mix,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
            Self::Mix => "mix",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Self::En),
            "ar" => Some(Self::Ar),
            "mix" => Some(Self::Mix),
            _ => None,
        }
    }
}

/// Named bundle of message template variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePack {
    Standard,
    ArabicValues,
}

impl MessagePack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ArabicValues => "arabic_values",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "arabic_values" => Some(Self::ArabicValues),
            _ => None,
        }
    }
}

/// A per-user time-of-day window during which nudges are deferred.
/// The window may wrap midnight (e.g. 22:00 -> 08:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Check whether a time of day falls inside the window (inclusive).
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            // Wraps midnight
            t >= self.start || t <= self.end
        }
    }

    /// Shift a timestamp out of the window to the next occurrence of `end`:
    /// same day if that is still ahead of `at`, otherwise the next day.
    /// Timestamps outside the window pass through unchanged.
    pub fn shift_out(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        if !self.contains(at.time()) {
            return at;
        }
        let candidate = at.date_naive().and_time(self.end).and_utc();
        if candidate >= at {
            candidate
        } else {
            candidate + Duration::days(1)
        }
    }
}

/// Per-user notification preferences.
///
/// An absent stored row is always substituted with `Preferences::default()`,
/// never surfaced as a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub user_id: Uuid,
    pub bot_name: String,
    pub theme: String,
    pub language: Language,
    pub message_pack: MessagePack,
    pub role_tag: Option<String>,
    pub interests: BTreeSet<String>,
    pub quiet_hours: Option<QuietHours>,
    pub daily_nudge_cap: u32,
    pub muted_categories: BTreeSet<String>,
    /// Per-kind overrides of the built-in daily limits.
    pub per_kind_limits: BTreeMap<String, u32>,
    pub updated_at: DateTime<Utc>,
}

impl Preferences {
    /// The documented default preference set for a user with no stored row.
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            bot_name: "Hearth".to_string(),
            theme: "light".to_string(),
            language: Language::En,
            message_pack: MessagePack::Standard,
            role_tag: None,
            interests: BTreeSet::new(),
            quiet_hours: None,
            daily_nudge_cap: 5,
            muted_categories: BTreeSet::new(),
            per_kind_limits: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Effective daily limit for a nudge kind: user override if present,
    /// otherwise the built-in default for that kind.
    pub fn kind_limit(&self, kind: &str) -> u32 {
        self.per_kind_limits
            .get(kind)
            .copied()
            .unwrap_or_else(|| super::nudge::default_kind_limit(kind))
    }
}
