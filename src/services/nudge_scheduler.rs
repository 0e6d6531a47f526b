//! The nudge scheduler: decides which nudges get enqueued, applies
//! throttling / quiet-hour / cap policy, persists accepted nudges, and
//! delivers due ones on a periodic tick.
//!
//! Per-nudge states: candidate -> accepted|rejected -> pending -> sent.
//! Policy rejections (rate limit, throttle, cap, mute) are expected and
//! silent: callers get `false`, logging stays at debug. A quiet-hour hit
//! is a deferral, not a rejection. Store failures are caught at every
//! boundary and collapse to "this nudge did not happen".

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::domain::models::{category_for_kind, Nudge};
use crate::domain::ports::{Clock, DeliverySink, NudgeRepository, PreferenceRepository};
use crate::services::message_composer::MessageCatalog;
use crate::services::preference_cache::PreferenceCache;
use crate::services::rate_limiter::{operation, RateLimiter};

/// Scheduler policy knobs.
#[derive(Debug, Clone)]
pub struct NudgePolicy {
    /// Window of the coarse one-per-kind throttle.
    pub throttle_window: Duration,
    /// Maximum nudges delivered per tick.
    pub delivery_batch_size: usize,
    /// Seconds between delivery ticks.
    pub delivery_interval: StdDuration,
}

impl Default for NudgePolicy {
    fn default() -> Self {
        Self {
            throttle_window: Duration::hours(24),
            delivery_batch_size: 10,
            delivery_interval: StdDuration::from_secs(3600),
        }
    }
}

pub struct NudgeScheduler<N: NudgeRepository, P: PreferenceRepository> {
    nudges: Arc<N>,
    preferences: Arc<PreferenceCache<P>>,
    limiter: Arc<RateLimiter>,
    catalog: Arc<MessageCatalog>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    policy: NudgePolicy,
    /// Coarse (user, kind) -> last enqueue guard, independent of the token
    /// bucket. In-memory only; cleared by restart.
    throttle_marks: RwLock<HashMap<(Uuid, String), DateTime<Utc>>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl<N, P> NudgeScheduler<N, P>
where
    N: NudgeRepository + 'static,
    P: PreferenceRepository + 'static,
{
    pub fn new(
        nudges: Arc<N>,
        preferences: Arc<PreferenceCache<P>>,
        limiter: Arc<RateLimiter>,
        catalog: Arc<MessageCatalog>,
        sink: Arc<dyn DeliverySink>,
        clock: Arc<dyn Clock>,
        policy: NudgePolicy,
    ) -> Self {
        Self {
            nudges,
            preferences,
            limiter,
            catalog,
            sink,
            clock,
            policy,
            throttle_marks: RwLock::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Event-driven entry point. Returns true if the nudge was accepted
    /// and persisted; false for every validation failure, policy
    /// rejection, or store error.
    pub async fn enqueue_nudge(
        &self,
        kind: &str,
        target: Option<Uuid>,
        variables: BTreeMap<String, String>,
    ) -> bool {
        let Some(user_id) = target else {
            // Missing target is a caller bug, not a policy outcome.
            tracing::warn!(kind, "enqueue_nudge called without a target user");
            return false;
        };

        if !self.limiter.check(user_id, operation::NUDGE_ENQUEUE).await {
            tracing::debug!(user = %user_id, kind, "nudge rejected: rate limited");
            return false;
        }

        let now = self.clock.now();

        if self.is_throttled(user_id, kind, now).await {
            tracing::debug!(user = %user_id, kind, "nudge rejected: kind throttled");
            return false;
        }

        let prefs = self.preferences.get(user_id).await;

        let scheduled_for = match prefs.quiet_hours {
            Some(q) => q.shift_out(now),
            None => now,
        };

        // Per-kind daily limit, count-checked against the store for both
        // entry points.
        let limit = prefs.kind_limit(kind);
        match self
            .nudges
            .count_kind_for_user_since(user_id, kind, start_of_day(now))
            .await
        {
            Ok(count) if count >= limit => {
                tracing::debug!(user = %user_id, kind, count, limit, "nudge rejected: kind limit reached");
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user = %user_id, kind, error = %e, "kind limit check failed");
                return false;
            }
        }

        let message = self.catalog.render(kind, &prefs, &variables);
        let nudge = Nudge::new(user_id, kind, message, scheduled_for, variables, now);

        if let Err(e) = self.nudges.insert(&nudge).await {
            tracing::warn!(user = %user_id, kind, error = %e, "nudge insert failed");
            return false;
        }

        self.throttle_marks
            .write()
            .await
            .insert((user_id, kind.to_string()), now);

        tracing::debug!(user = %user_id, kind, scheduled_for = %scheduled_for, "nudge enqueued");
        true
    }

    /// Preference-driven entry point for recurring nudges (birthday
    /// reminders, weekly check-ins). Checks category mutes and the
    /// absolute daily cap instead of the per-kind throttle mark.
    pub async fn schedule_nudge(
        &self,
        user_id: Uuid,
        kind: &str,
        scheduled_for: DateTime<Utc>,
        variables: BTreeMap<String, String>,
    ) -> bool {
        let prefs = self.preferences.get(user_id).await;

        let category = category_for_kind(kind);
        if prefs.muted_categories.contains(category) {
            tracing::debug!(user = %user_id, kind, category, "nudge rejected: category muted");
            return false;
        }

        let now = self.clock.now();
        match self.nudges.count_for_user_since(user_id, start_of_day(now)).await {
            Ok(count) if count >= prefs.daily_nudge_cap => {
                tracing::debug!(
                    user = %user_id, kind, count,
                    cap = prefs.daily_nudge_cap,
                    "nudge rejected: daily cap reached"
                );
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user = %user_id, kind, error = %e, "daily cap check failed");
                return false;
            }
        }

        let scheduled_for = match prefs.quiet_hours {
            Some(q) => q.shift_out(scheduled_for),
            None => scheduled_for,
        };

        // Message text is frozen at enqueue time, not recomputed at delivery.
        let message = self.catalog.render(kind, &prefs, &variables);
        let nudge = Nudge::new(user_id, kind, message, scheduled_for, variables, now);

        if let Err(e) = self.nudges.insert(&nudge).await {
            tracing::warn!(user = %user_id, kind, error = %e, "nudge insert failed");
            return false;
        }

        tracing::debug!(user = %user_id, kind, scheduled_for = %scheduled_for, "nudge scheduled");
        true
    }

    /// Deliver due, pending nudges in one bounded batch. Failed deliveries
    /// stay pending for the next tick (at-least-once). Returns the number
    /// delivered.
    pub async fn deliver_due(&self) -> usize {
        let now = self.clock.now();
        let due = match self.nudges.list_due(now, self.policy.delivery_batch_size).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "due-nudge query failed");
                return 0;
            }
        };

        let mut delivered = 0;
        for nudge in &due {
            if let Err(e) = self.sink.deliver(nudge).await {
                tracing::warn!(nudge = %nudge.id, sink = self.sink.name(), error = %e, "delivery failed, will retry");
                continue;
            }
            match self.nudges.mark_sent(nudge.id, now).await {
                Ok(true) => delivered += 1,
                Ok(false) => {
                    tracing::debug!(nudge = %nudge.id, "row no longer pending, not counted");
                }
                Err(e) => {
                    // Delivered but not recorded: the next tick may deliver
                    // again. At-least-once is the contract.
                    tracing::warn!(nudge = %nudge.id, error = %e, "mark_sent failed");
                }
            }
        }

        if delivered > 0 {
            tracing::info!(delivered, "delivered due nudges");
        }
        delivered
    }

    /// Start the periodic delivery loop: one immediate pass, then a tick
    /// every `delivery_interval`. Returns a JoinHandle that resolves
    /// promptly after `stop`, letting an in-flight batch finish first.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let scheduler = self.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();
        let interval = self.policy.delivery_interval;

        tokio::spawn(async move {
            scheduler.deliver_due().await;
            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = shutdown.notified() => {
                        // A stale permit from an earlier stop is harmless:
                        // the flag decides.
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        if running.load(Ordering::SeqCst) {
                            scheduler.deliver_due().await;
                        }
                    }
                }
            }
        })
    }

    /// End the delivery loop. Wakes a parked tick immediately; a batch
    /// already in `deliver_due` runs to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn is_throttled(&self, user_id: Uuid, kind: &str, now: DateTime<Utc>) -> bool {
        let marks = self.throttle_marks.read().await;
        match marks.get(&(user_id, kind.to_string())) {
            Some(last) => now.signed_duration_since(*last) < self.policy.throttle_window,
            None => false,
        }
    }
}

/// Midnight UTC of the day containing `at`.
fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}
