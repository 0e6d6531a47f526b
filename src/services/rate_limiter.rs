//! Token-bucket abuse guard keyed by (user, operation).
//!
//! Buckets initialize full on first use, refill in whole tokens
//! proportional to elapsed time, and are swept after an idle window to
//! bound memory. State is in-memory only: a restart resets all limits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::domain::ports::Clock;

/// Operation keys with built-in bucket configs.
pub mod operation {
    pub const NUDGE_ENQUEUE: &str = "nudges:enqueue";
    pub const POST_CREATE: &str = "posts:create";
    pub const NOTE_CREATE: &str = "notes:create";
    pub const REACTION_ADD: &str = "reactions:add";
}

/// Bucket parameters for one operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationConfig {
    pub max_tokens: f64,
    pub refill_per_minute: f64,
    pub cost: f64,
}

impl OperationConfig {
    pub const fn new(max_tokens: f64, refill_per_minute: f64, cost: f64) -> Self {
        Self { max_tokens, refill_per_minute, cost }
    }
}

/// Content-creation ops get small buckets with slow refill; interactive
/// ops get larger ones. Unknown keys fall back to the interactive config.
fn builtin_configs() -> HashMap<String, OperationConfig> {
    let mut configs = HashMap::new();
    configs.insert(operation::NUDGE_ENQUEUE.to_string(), OperationConfig::new(10.0, 2.0, 1.0));
    configs.insert(operation::POST_CREATE.to_string(), OperationConfig::new(5.0, 1.0, 1.0));
    configs.insert(operation::NOTE_CREATE.to_string(), OperationConfig::new(5.0, 1.0, 1.0));
    configs.insert(operation::REACTION_ADD.to_string(), OperationConfig::new(30.0, 10.0, 1.0));
    configs
}

const FALLBACK_CONFIG: OperationConfig = OperationConfig::new(20.0, 5.0, 1.0);

struct Bucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Hook invoked when `enforce` rejects, for user-facing "slow down"
/// signaling. A side effect, never a hard dependency.
pub type RejectHook = Arc<dyn Fn(Uuid, &str) + Send + Sync>;

pub struct RateLimiter {
    buckets: RwLock<HashMap<(Uuid, String), Bucket>>,
    configs: HashMap<String, OperationConfig>,
    clock: Arc<dyn Clock>,
    idle_window: Duration,
    on_reject: RwLock<Option<RejectHook>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, idle_window: Duration) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            configs: builtin_configs(),
            clock,
            idle_window,
            on_reject: RwLock::new(None),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Override or add a per-operation config.
    pub fn set_config(&mut self, operation: impl Into<String>, config: OperationConfig) {
        self.configs.insert(operation.into(), config);
    }

    /// Install the rejection side-effect hook.
    pub async fn set_reject_hook(&self, hook: RejectHook) {
        *self.on_reject.write().await = Some(hook);
    }

    fn config_for(&self, operation: &str) -> OperationConfig {
        self.configs.get(operation).copied().unwrap_or(FALLBACK_CONFIG)
    }

    /// Check and consume: refill whole tokens for the elapsed time, then
    /// take `cost` tokens if available. No partial consumption.
    pub async fn check(&self, user_id: Uuid, operation: &str) -> bool {
        let config = self.config_for(operation);
        let now = self.clock.now();
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry((user_id, operation.to_string()))
            .or_insert_with(|| Bucket {
                tokens: config.max_tokens,
                last_refill: now,
                last_seen: now,
            });

        bucket.last_seen = now;

        let elapsed_minutes =
            now.signed_duration_since(bucket.last_refill).num_milliseconds() as f64 / 60_000.0;
        let refill = (elapsed_minutes * config.refill_per_minute).floor();
        if refill >= 1.0 {
            bucket.tokens = (bucket.tokens + refill).min(config.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens + f64::EPSILON >= config.cost {
            bucket.tokens -= config.cost;
            true
        } else {
            tracing::debug!(user = %user_id, operation, "rate limited");
            false
        }
    }

    /// `check` plus the user-facing rejection hook.
    pub async fn enforce(&self, user_id: Uuid, operation: &str) -> bool {
        let allowed = self.check(user_id, operation).await;
        if !allowed {
            let hook = self.on_reject.read().await;
            if let Some(hook) = hook.as_ref() {
                hook(user_id, operation);
            }
        }
        allowed
    }

    /// Remove buckets idle longer than the configured window.
    /// Returns the number removed.
    pub async fn sweep_idle(&self) -> usize {
        let cutoff = self.clock.now() - self.idle_window;
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, b| b.last_seen > cutoff);
        before - buckets.len()
    }

    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// Remaining tokens for a key, if the bucket exists. Test/diagnostic aid.
    pub async fn tokens(&self, user_id: Uuid, operation: &str) -> Option<f64> {
        let buckets = self.buckets.read().await;
        buckets.get(&(user_id, operation.to_string())).map(|b| b.tokens)
    }

    /// Run the idle sweep on a periodic task. Returns a JoinHandle that
    /// resolves promptly after `stop_cleanup`, finishing any in-flight
    /// sweep first.
    pub fn start_cleanup(self: &Arc<Self>, every: StdDuration) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let limiter = self.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = shutdown.notified() => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(every) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        let removed = limiter.sweep_idle().await;
                        if removed > 0 {
                            tracing::debug!(removed, "swept idle rate buckets");
                        }
                    }
                }
            }
        })
    }

    /// End the cleanup loop, waking a parked tick immediately.
    pub fn stop_cleanup(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ManualClock;
    use proptest::prelude::*;

    fn limiter_at(start: &str) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(start.parse().unwrap()));
        let limiter = RateLimiter::new(clock.clone(), Duration::minutes(30));
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_bucket_initializes_full() {
        let (_, mut limiter) = limiter_at("2024-03-10T12:00:00Z");
        limiter.set_config("test:op", OperationConfig::new(3.0, 1.0, 1.0));
        let user = Uuid::new_v4();

        assert!(limiter.check(user, "test:op").await);
        assert!(limiter.check(user, "test:op").await);
        assert!(limiter.check(user, "test:op").await);
        assert!(!limiter.check(user, "test:op").await);
    }

    #[tokio::test]
    async fn test_refill_is_floored_and_capped() {
        let (clock, mut limiter) = limiter_at("2024-03-10T12:00:00Z");
        // max 5, 2 tokens/min, cost 1
        limiter.set_config("test:op", OperationConfig::new(5.0, 2.0, 1.0));
        let user = Uuid::new_v4();

        for _ in 0..5 {
            assert!(limiter.check(user, "test:op").await);
        }
        assert!(!limiter.check(user, "test:op").await);

        // 3 minutes grants floor(3 * 2) = 6 tokens, capped at 5
        clock.advance(Duration::minutes(3));
        for _ in 0..5 {
            assert!(limiter.check(user, "test:op").await);
        }
        assert!(!limiter.check(user, "test:op").await);
    }

    #[tokio::test]
    async fn test_sub_token_elapsed_grants_nothing() {
        let (clock, mut limiter) = limiter_at("2024-03-10T12:00:00Z");
        limiter.set_config("test:op", OperationConfig::new(2.0, 1.0, 1.0));
        let user = Uuid::new_v4();

        assert!(limiter.check(user, "test:op").await);
        assert!(limiter.check(user, "test:op").await);

        // 30s at 1/min is floor(0.5) = 0 tokens; lastRefill must not advance,
        // so two 30s waits still add up to a full token.
        clock.advance(Duration::seconds(30));
        assert!(!limiter.check(user, "test:op").await);
        clock.advance(Duration::seconds(30));
        assert!(limiter.check(user, "test:op").await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (_, limiter) = limiter_at("2024-03-10T12:00:00Z");
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(limiter.check(u1, operation::POST_CREATE).await);
        assert!(limiter.check(u1, operation::NOTE_CREATE).await);
        assert!(limiter.check(u2, operation::POST_CREATE).await);
        assert_eq!(limiter.bucket_count().await, 3);
    }

    #[tokio::test]
    async fn test_enforce_fires_reject_hook() {
        let (_, mut limiter) = limiter_at("2024-03-10T12:00:00Z");
        limiter.set_config("test:op", OperationConfig::new(1.0, 1.0, 1.0));
        let rejected = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = rejected.clone();
        limiter
            .set_reject_hook(Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .await;
        let user = Uuid::new_v4();

        assert!(limiter.enforce(user, "test:op").await);
        assert!(!limiter.enforce(user, "test:op").await);
        assert_eq!(rejected.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_idle_sweep() {
        let (clock, limiter) = limiter_at("2024-03-10T12:00:00Z");
        let user = Uuid::new_v4();

        limiter.check(user, operation::POST_CREATE).await;
        assert_eq!(limiter.bucket_count().await, 1);

        clock.advance(Duration::minutes(31));
        assert_eq!(limiter.sweep_idle().await, 1);
        assert_eq!(limiter.bucket_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_cleanup_resolves_loop_before_next_tick() {
        let (_, limiter) = limiter_at("2024-03-10T12:00:00Z");
        let limiter = Arc::new(limiter);

        // An hour between sweeps; stop must not wait for the next one.
        let handle = limiter.start_cleanup(StdDuration::from_secs(3600));
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        limiter.stop_cleanup();

        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("cleanup loop should exit promptly after stop")
            .expect("cleanup loop should not panic");
    }

    proptest! {
        /// Tokens stay within [0, max] across any sequence of checks and waits.
        #[test]
        fn prop_token_bounds(ops in prop::collection::vec((0u8..2, 0i64..300), 1..60)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async {
                let (clock, mut limiter) = limiter_at("2024-03-10T12:00:00Z");
                let max = 5.0;
                limiter.set_config("prop:op", OperationConfig::new(max, 2.0, 1.0));
                let user = Uuid::new_v4();

                for (action, secs) in ops {
                    if action == 0 {
                        limiter.check(user, "prop:op").await;
                    } else {
                        clock.advance(Duration::seconds(secs));
                        limiter.check(user, "prop:op").await;
                    }
                    let tokens = limiter.tokens(user, "prop:op").await.unwrap();
                    prop_assert!(tokens >= 0.0, "tokens went negative: {tokens}");
                    prop_assert!(tokens <= max, "tokens exceeded max: {tokens}");
                }
                Ok(())
            }).unwrap();
        }
    }
}
