//! SQLite adapter for PreferenceRepository.

use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Language, MessagePack, Preferences, QuietHours};
use crate::domain::ports::PreferenceRepository;

const TIME_FORMAT: &str = "%H:%M";

#[derive(Clone)]
pub struct SqlitePreferenceRepository {
    pool: SqlitePool,
}

impl SqlitePreferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    user_id: String,
    bot_name: String,
    theme: String,
    language: String,
    message_pack: String,
    role_tag: Option<String>,
    interests: Option<String>,
    quiet_start: Option<String>,
    quiet_end: Option<String>,
    daily_nudge_cap: i64,
    muted_categories: Option<String>,
    per_kind_limits: Option<String>,
    updated_at: String,
}

fn parse_time(s: &str) -> DomainResult<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| DomainError::SerializationError(format!("time '{s}': {e}")))
}

fn row_to_preferences(row: PreferenceRow) -> DomainResult<Preferences> {
    let quiet_hours = match (&row.quiet_start, &row.quiet_end) {
        (Some(start), Some(end)) => Some(QuietHours {
            start: parse_time(start)?,
            end: parse_time(end)?,
        }),
        _ => None,
    };

    Ok(Preferences {
        user_id: parse_uuid(&row.user_id)?,
        bot_name: row.bot_name,
        theme: row.theme,
        language: Language::from_str(&row.language).unwrap_or(Language::En),
        message_pack: MessagePack::from_str(&row.message_pack).unwrap_or(MessagePack::Standard),
        role_tag: row.role_tag,
        interests: parse_json_or_default(row.interests)?,
        quiet_hours,
        daily_nudge_cap: row.daily_nudge_cap.max(1) as u32,
        muted_categories: parse_json_or_default(row.muted_categories)?,
        per_kind_limits: parse_json_or_default(row.per_kind_limits)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl PreferenceRepository for SqlitePreferenceRepository {
    async fn get(&self, user_id: Uuid) -> DomainResult<Option<Preferences>> {
        let row: Option<PreferenceRow> =
            sqlx::query_as("SELECT * FROM preferences WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_preferences).transpose()
    }

    async fn upsert(&self, prefs: &Preferences) -> DomainResult<()> {
        let interests = serde_json::to_string(&prefs.interests)?;
        let muted = serde_json::to_string(&prefs.muted_categories)?;
        let limits = serde_json::to_string(&prefs.per_kind_limits)?;
        let quiet_start = prefs.quiet_hours.map(|q| q.start.format(TIME_FORMAT).to_string());
        let quiet_end = prefs.quiet_hours.map(|q| q.end.format(TIME_FORMAT).to_string());

        sqlx::query(
            "INSERT OR REPLACE INTO preferences
             (user_id, bot_name, theme, language, message_pack, role_tag,
              interests, quiet_start, quiet_end, daily_nudge_cap,
              muted_categories, per_kind_limits, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(prefs.user_id.to_string())
        .bind(&prefs.bot_name)
        .bind(&prefs.theme)
        .bind(prefs.language.as_str())
        .bind(prefs.message_pack.as_str())
        .bind(&prefs.role_tag)
        .bind(&interests)
        .bind(&quiet_start)
        .bind(&quiet_end)
        .bind(prefs.daily_nudge_cap as i64)
        .bind(&muted)
        .bind(&limits)
        .bind(prefs.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
