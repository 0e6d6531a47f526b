//! Hearth CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use uuid::Uuid;

use hearth::adapters::sink::TracingDeliverySink;
use hearth::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, SqliteNudgeRepository,
    SqlitePreferenceRepository,
};
use hearth::domain::models::Config;
use hearth::domain::ports::{NudgeRepository, PreferenceRepository, SystemClock};
use hearth::services::handlers::{NudgeTriggerHandler, PreferenceInvalidationHandler};
use hearth::services::{
    EventBus, EventBusConfig, MessageCatalog, NudgePolicy, NudgeScheduler, PreferenceCache,
    RateLimiter,
};
use hearth::{ConfigLoader, Preferences};

#[derive(Parser)]
#[command(name = "hearth", version, about = "Household coordination nudge engine")]
struct Cli {
    /// Path to a configuration file (default: hearth.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the nudge engine until interrupted
    Serve,
    /// List queued and sent nudges
    Nudges {
        /// Filter by user id
        #[arg(short, long)]
        user: Option<Uuid>,
        /// Maximum rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Show effective preferences for a user
    Prefs {
        /// User id
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _log_guard = hearth::infrastructure::logging::init(&config.logging)?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Nudges { user, limit } => list_nudges(config, user, limit).await,
        Commands::Prefs { user } => show_prefs(config, user).await,
    }
}

async fn open_pool(config: &Config) -> Result<sqlx::SqlitePool> {
    let pool = create_pool(&config.database)
        .await
        .context("Failed to open database")?;

    let migrator = Migrator::new(pool.clone());
    migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}

async fn serve(config: Config) -> Result<()> {
    let pool = open_pool(&config).await?;

    let nudge_repo = Arc::new(SqliteNudgeRepository::new(pool.clone()));
    let pref_repo = Arc::new(SqlitePreferenceRepository::new(pool.clone()));
    let clock = Arc::new(SystemClock);

    let pref_cache = Arc::new(PreferenceCache::new(pref_repo));
    let rate_limiter = Arc::new(RateLimiter::new(
        clock.clone(),
        chrono::Duration::seconds(config.rate_limit.idle_window_secs as i64),
    ));

    let policy = NudgePolicy {
        throttle_window: chrono::Duration::hours(config.delivery.throttle_window_hours),
        delivery_batch_size: config.delivery.batch_size,
        delivery_interval: std::time::Duration::from_secs(config.delivery.interval_secs),
    };

    let scheduler = Arc::new(NudgeScheduler::new(
        nudge_repo,
        pref_cache.clone(),
        rate_limiter.clone(),
        Arc::new(MessageCatalog::builtin()),
        Arc::new(TracingDeliverySink),
        clock,
        policy,
    ));

    let bus = Arc::new(EventBus::new(EventBusConfig::default()));
    bus.register(Arc::new(NudgeTriggerHandler::new(scheduler.clone()))).await;
    bus.register(Arc::new(PreferenceInvalidationHandler::new(pref_cache))).await;

    let delivery_task = scheduler.start();
    let cleanup_task = rate_limiter.start_cleanup(std::time::Duration::from_secs(
        config.rate_limit.cleanup_interval_secs,
    ));

    tracing::info!(
        db = %config.database.path,
        interval_secs = config.delivery.interval_secs,
        "hearth engine running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    scheduler.stop();
    rate_limiter.stop_cleanup();
    let _ = delivery_task.await;
    let _ = cleanup_task.await;
    pool.close().await;

    Ok(())
}

async fn list_nudges(config: Config, user: Option<Uuid>, limit: u32) -> Result<()> {
    let pool = open_pool(&config).await?;
    let repo = SqliteNudgeRepository::new(pool);

    let nudges = match user {
        Some(user_id) => repo.list_for_user(user_id, limit as usize).await?,
        None => repo.list_recent(limit as usize).await?,
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "User", "Kind", "Status", "Scheduled For", "Message"]);

    for nudge in &nudges {
        let id = nudge.id.to_string();
        let user_id = nudge.user_id.to_string();
        table.add_row(vec![
            Cell::new(&id[..8]),
            Cell::new(&user_id[..8]),
            Cell::new(&nudge.kind),
            Cell::new(nudge.status.as_str()),
            Cell::new(nudge.scheduled_for.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(truncate(&nudge.message, 48)),
        ]);
    }

    println!("{table}");
    println!("{} nudge(s)", nudges.len());
    Ok(())
}

async fn show_prefs(config: Config, user: Uuid) -> Result<()> {
    let pool = open_pool(&config).await?;
    let repo = SqlitePreferenceRepository::new(pool);

    let prefs = repo
        .get(user)
        .await?
        .unwrap_or_else(|| Preferences::default_for(user));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["bot_name", prefs.bot_name.as_str()]);
    table.add_row(vec!["theme", prefs.theme.as_str()]);
    table.add_row(vec!["language", prefs.language.as_str()]);
    table.add_row(vec!["message_pack", prefs.message_pack.as_str()]);
    table.add_row(vec!["role_tag", prefs.role_tag.as_deref().unwrap_or("-")]);
    table.add_row(vec![
        "quiet_hours".to_string(),
        prefs
            .quiet_hours
            .as_ref()
            .map(|q| format!("{} - {}", q.start.format("%H:%M"), q.end.format("%H:%M")))
            .unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec!["daily_nudge_cap".to_string(), prefs.daily_nudge_cap.to_string()]);
    table.add_row(vec![
        "muted_categories".to_string(),
        if prefs.muted_categories.is_empty() {
            "-".to_string()
        } else {
            prefs.muted_categories.iter().cloned().collect::<Vec<_>>().join(", ")
        },
    ]);

    println!("{table}");
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{prefix}…")
    }
}
