//! Built-in event handlers wiring domain events to the nudge engine.
//!
//! Handlers never surface policy rejections as errors: a declined nudge
//! is a normal outcome, and the emitting business action must succeed
//! regardless.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::nudge::kind;
use crate::domain::models::{DomainEvent, EventPayload};
use crate::domain::ports::{NudgeRepository, PreferenceRepository};
use crate::services::event_bus::{EventFilter, EventHandler};
use crate::services::nudge_scheduler::NudgeScheduler;
use crate::services::preference_cache::PreferenceCache;

/// Goal progress at or past this percentage triggers a milestone nudge.
const MILESTONE_PERCENT: u8 = 50;

fn vars(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Maps household events to candidate nudges.
pub struct NudgeTriggerHandler<N: NudgeRepository, P: PreferenceRepository> {
    scheduler: Arc<NudgeScheduler<N, P>>,
}

impl<N: NudgeRepository + 'static, P: PreferenceRepository + 'static> NudgeTriggerHandler<N, P> {
    pub fn new(scheduler: Arc<NudgeScheduler<N, P>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl<N, P> EventHandler for NudgeTriggerHandler<N, P>
where
    N: NudgeRepository + 'static,
    P: PreferenceRepository + 'static,
{
    fn name(&self) -> &str {
        "NudgeTriggerHandler"
    }

    fn filter(&self) -> EventFilter {
        EventFilter::new().kinds(vec![
            "EventScheduled",
            "GoalProgress",
            "AppreciationGiven",
            "NoteAdded",
        ])
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), String> {
        match &event.payload {
            EventPayload::EventScheduled { user_id, title, starts_at, .. } => {
                self.scheduler
                    .enqueue_nudge(
                        kind::EVENT_UPCOMING,
                        Some(*user_id),
                        vars(&[
                            ("title", title.clone()),
                            ("when", starts_at.format("%Y-%m-%d %H:%M").to_string()),
                        ]),
                    )
                    .await;
            }
            EventPayload::GoalProgress { user_id, goal_title, percent, .. } => {
                if *percent >= MILESTONE_PERCENT {
                    self.scheduler
                        .enqueue_nudge(
                            kind::GOAL_MILESTONE,
                            Some(*user_id),
                            vars(&[
                                ("goal", goal_title.clone()),
                                ("percent", percent.to_string()),
                            ]),
                        )
                        .await;
                }
            }
            EventPayload::AppreciationGiven { from_name, to_user_id, .. } => {
                // The nudge targets the recipient, not the acting user.
                self.scheduler
                    .enqueue_nudge(
                        kind::GRATITUDE_POST,
                        Some(*to_user_id),
                        vars(&[("from", from_name.clone())]),
                    )
                    .await;
            }
            EventPayload::NoteAdded { user_id, note_preview, .. } => {
                self.scheduler
                    .enqueue_nudge(
                        kind::NOTE_REPLY,
                        Some(*user_id),
                        vars(&[("preview", note_preview.clone())]),
                    )
                    .await;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Evicts cached preferences when a user updates them.
pub struct PreferenceInvalidationHandler<P: PreferenceRepository> {
    cache: Arc<PreferenceCache<P>>,
}

impl<P: PreferenceRepository + 'static> PreferenceInvalidationHandler<P> {
    pub fn new(cache: Arc<PreferenceCache<P>>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<P: PreferenceRepository + 'static> EventHandler for PreferenceInvalidationHandler<P> {
    fn name(&self) -> &str {
        "PreferenceInvalidationHandler"
    }

    fn filter(&self) -> EventFilter {
        EventFilter::new().kinds(vec!["PreferenceUpdated"])
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), String> {
        if let EventPayload::PreferenceUpdated { user_id } = &event.payload {
            self.cache.invalidate(*user_id).await;
            tracing::debug!(user = %user_id, "preference cache invalidated");
        }
        Ok(())
    }
}
