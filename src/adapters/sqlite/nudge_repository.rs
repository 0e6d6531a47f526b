//! SQLite adapter for NudgeRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_optional_datetime, parse_uuid};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Nudge, NudgeStatus};
use crate::domain::ports::NudgeRepository;

#[derive(Clone)]
pub struct SqliteNudgeRepository {
    pool: SqlitePool,
}

impl SqliteNudgeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NudgeRow {
    id: String,
    user_id: String,
    kind: String,
    message: String,
    scheduled_for: String,
    meta: Option<String>,
    status: String,
    sent_at: Option<String>,
    created_at: String,
}

fn row_to_nudge(row: NudgeRow) -> DomainResult<Nudge> {
    Ok(Nudge {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        kind: row.kind,
        message: row.message,
        scheduled_for: parse_datetime(&row.scheduled_for)?,
        meta: parse_json_or_default(row.meta)?,
        status: NudgeStatus::from_str(&row.status).unwrap_or(NudgeStatus::Pending),
        sent_at: parse_optional_datetime(row.sent_at)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl NudgeRepository for SqliteNudgeRepository {
    async fn insert(&self, nudge: &Nudge) -> DomainResult<()> {
        let meta = serde_json::to_string(&nudge.meta)?;
        let sent_at = nudge.sent_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            "INSERT INTO nudges
             (id, user_id, kind, message, scheduled_for, meta, status, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(nudge.id.to_string())
        .bind(nudge.user_id.to_string())
        .bind(&nudge.kind)
        .bind(&nudge.message)
        .bind(nudge.scheduled_for.to_rfc3339())
        .bind(&meta)
        .bind(nudge.status.as_str())
        .bind(&sent_at)
        .bind(nudge.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Nudge>> {
        let row: Option<NudgeRow> = sqlx::query_as("SELECT * FROM nudges WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_nudge).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid, limit: usize) -> DomainResult<Vec<Nudge>> {
        let rows: Vec<NudgeRow> = sqlx::query_as(
            "SELECT * FROM nudges WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_nudge).collect()
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Nudge>> {
        let rows: Vec<NudgeRow> =
            sqlx::query_as("SELECT * FROM nudges ORDER BY created_at DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_nudge).collect()
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> DomainResult<Vec<Nudge>> {
        let rows: Vec<NudgeRow> = sqlx::query_as(
            "SELECT * FROM nudges
             WHERE status = 'pending' AND scheduled_for <= ?
             ORDER BY scheduled_for ASC LIMIT ?",
        )
        .bind(now.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_nudge).collect()
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<bool> {
        // The status guard keeps sent rows immutable.
        let result = sqlx::query(
            "UPDATE nudges SET status = 'sent', sent_at = ?2 WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id.to_string())
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_for_user_since(&self, user_id: Uuid, since: DateTime<Utc>) -> DomainResult<u32> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM nudges WHERE user_id = ?1 AND created_at >= ?2")
                .bind(user_id.to_string())
                .bind(since.to_rfc3339())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u32)
    }

    async fn count_kind_for_user_since(
        &self,
        user_id: Uuid,
        kind: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM nudges WHERE user_id = ?1 AND kind = ?2 AND created_at >= ?3",
        )
        .bind(user_id.to_string())
        .bind(kind)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }
}
