//! End-to-end flow: domain events through the bus into persisted nudges.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use hearth::adapters::sink::BroadcastDeliverySink;
use hearth::adapters::sqlite::{
    create_migrated_test_pool, SqliteNudgeRepository, SqlitePreferenceRepository,
};
use hearth::domain::models::nudge::kind;
use hearth::domain::models::{EventPayload, Preferences};
use hearth::domain::ports::{Clock, DeliverySink, ManualClock, NudgeRepository, PreferenceRepository};
use hearth::services::handlers::{NudgeTriggerHandler, PreferenceInvalidationHandler};
use hearth::services::{
    EventBus, EventBusConfig, MessageCatalog, NudgePolicy, NudgeScheduler, PreferenceCache,
    RateLimiter,
};

struct Engine {
    bus: EventBus,
    scheduler: Arc<NudgeScheduler<SqliteNudgeRepository, SqlitePreferenceRepository>>,
    cache: Arc<PreferenceCache<SqlitePreferenceRepository>>,
    nudges: Arc<SqliteNudgeRepository>,
    prefs: Arc<SqlitePreferenceRepository>,
    clock: Arc<ManualClock>,
    sink: Arc<BroadcastDeliverySink>,
}

async fn engine() -> Engine {
    let pool = create_migrated_test_pool().await;
    let nudges = Arc::new(SqliteNudgeRepository::new(pool.clone()));
    let prefs = Arc::new(SqlitePreferenceRepository::new(pool));
    let clock = Arc::new(ManualClock::new(
        "2024-03-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap(),
    ));
    let sink = Arc::new(BroadcastDeliverySink::new(16));

    let cache = Arc::new(PreferenceCache::new(prefs.clone()));
    let limiter = Arc::new(RateLimiter::new(
        clock.clone() as Arc<dyn Clock>,
        Duration::minutes(30),
    ));

    let scheduler = Arc::new(NudgeScheduler::new(
        nudges.clone(),
        cache.clone(),
        limiter,
        Arc::new(MessageCatalog::builtin()),
        sink.clone() as Arc<dyn DeliverySink>,
        clock.clone() as Arc<dyn Clock>,
        NudgePolicy::default(),
    ));

    let bus = EventBus::new(EventBusConfig::default());
    bus.register(Arc::new(NudgeTriggerHandler::new(scheduler.clone()))).await;
    bus.register(Arc::new(PreferenceInvalidationHandler::new(cache.clone()))).await;

    Engine { bus, scheduler, cache, nudges, prefs, clock, sink }
}

#[tokio::test]
async fn test_appreciation_event_nudges_the_recipient() {
    let e = engine().await;
    let giver = Uuid::new_v4();
    let recipient = Uuid::new_v4();
    let family = Uuid::new_v4();

    e.bus
        .emit(EventPayload::AppreciationGiven {
            user_id: giver,
            family_id: family,
            from_name: "Omar".to_string(),
            to_user_id: recipient,
        })
        .await;

    let rows = e.nudges.list_for_user(recipient, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, kind::GRATITUDE_POST);
    assert!(e.nudges.list_for_user(giver, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_goal_progress_nudges_only_at_milestone() {
    let e = engine().await;
    let user = Uuid::new_v4();
    let family = Uuid::new_v4();

    e.bus
        .emit(EventPayload::GoalProgress {
            user_id: user,
            family_id: family,
            goal_title: "read more".to_string(),
            percent: 25,
        })
        .await;
    assert!(e.nudges.list_for_user(user, 10).await.unwrap().is_empty());

    e.bus
        .emit(EventPayload::GoalProgress {
            user_id: user,
            family_id: family,
            goal_title: "read more".to_string(),
            percent: 80,
        })
        .await;

    let rows = e.nudges.list_for_user(user, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, kind::GOAL_MILESTONE);
}

#[tokio::test]
async fn test_scheduled_event_produces_upcoming_nudge() {
    let e = engine().await;
    let user = Uuid::new_v4();
    let family = Uuid::new_v4();

    e.bus
        .emit(EventPayload::EventScheduled {
            user_id: user,
            family_id: family,
            title: "dentist".to_string(),
            starts_at: e.clock.now() + Duration::days(2),
        })
        .await;

    let rows = e.nudges.list_for_user(user, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, kind::EVENT_UPCOMING);
    assert!(!rows[0].message.is_empty());
}

#[tokio::test]
async fn test_preference_update_event_evicts_cache() {
    let e = engine().await;
    let user = Uuid::new_v4();

    // First read caches the defaults.
    assert_eq!(e.cache.get(user).await.bot_name, "Hearth");

    let mut prefs = Preferences::default_for(user);
    prefs.bot_name = "Nur".to_string();
    e.prefs.upsert(&prefs).await.unwrap();

    // Still the cached copy until the event lands.
    assert_eq!(e.cache.get(user).await.bot_name, "Hearth");

    e.bus.emit(EventPayload::PreferenceUpdated { user_id: user }).await;
    assert_eq!(e.cache.get(user).await.bot_name, "Nur");
}

#[tokio::test]
async fn test_delivered_nudges_reach_broadcast_subscribers() {
    let e = engine().await;
    let user = Uuid::new_v4();
    let family = Uuid::new_v4();
    let mut receiver = e.sink.subscribe();

    e.bus
        .emit(EventPayload::NoteAdded {
            user_id: user,
            family_id: family,
            note_preview: "grocery list".to_string(),
        })
        .await;

    assert_eq!(e.scheduler.deliver_due().await, 1);
    let delivered = receiver.try_recv().expect("one nudge broadcast");
    assert_eq!(delivered.kind, kind::NOTE_REPLY);
    assert_eq!(delivered.user_id, user);
}
