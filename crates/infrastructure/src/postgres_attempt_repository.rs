//! PostgreSQL-backed attempt log using the `ip_attempts` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use warden_application::{AttemptRepository, BanHistoryQuery, NewBan};
use warden_core::{AppError, AppResult};
use warden_domain::{
    AttemptId, AttemptKind, AttemptRecord, AttemptType, BanLevel, BanRecord, IpAddress,
};


/// PostgreSQL implementation of the attempt repository port.
#[derive(Clone)]
pub struct PostgresAttemptRepository {
    pool: PgPool,
}

impl PostgresAttemptRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for PostgresAttemptRepository {
    async fn append_attempt(
        &self,
        ip_address: &IpAddress,
        kind: AttemptKind,
        attempt_time: DateTime<Utc>,
    ) -> AppResult<AttemptRecord> {
        let id = AttemptId::new();

        sqlx::query(
            r#"
            INSERT INTO ip_attempts (id, ip_address, attempt_time, attempt_type)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(ip_address.as_str())
        .bind(attempt_time)
        .bind(AttemptType::from(kind).as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record attempt: {error}")))?;

        Ok(AttemptRecord {
            id,
            ip_address: ip_address.clone(),
            attempt_time,
            kind,
        })
    }

    async fn count_attempts(
        &self,
        ip_address: &IpAddress,
        since: &[DateTime<Utc>],
        until: DateTime<Utc>,
    ) -> AppResult<Vec<u32>> {
        let counts = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(attempts.id)
            FROM unnest($2::timestamptz[]) WITH ORDINALITY AS windows(cutoff, position)
            LEFT JOIN ip_attempts attempts
                ON attempts.ip_address = $1
                AND attempts.attempt_type <> 'ban'
                AND attempts.attempt_time >= windows.cutoff
                AND attempts.attempt_time <= $3
            GROUP BY windows.position
            ORDER BY windows.position
            "#,
        )
        .bind(ip_address.as_str())
        .bind(since.to_vec())
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count attempts: {error}")))?;

        counts
            .into_iter()
            .map(|count| {
                u32::try_from(count).map_err(|error| {
                    AppError::Internal(format!("invalid attempt count {count}: {error}"))
                })
            })
            .collect()
    }

    async fn latest_ban(&self, ip_address: &IpAddress) -> AppResult<Option<BanRecord>> {
        let row = sqlx::query_as::<_, BanRow>(
            r#"
            SELECT
                id,
                ip_address,
                attempt_time,
                ban_level,
                ban_start,
                ban_end,
                grace_period_end,
                triggered_by,
                supersedes_ban_id
            FROM ip_attempts
            WHERE ip_address = $1 AND attempt_type = 'ban'
            ORDER BY attempt_time DESC, sequence DESC
            LIMIT 1
            "#,
        )
        .bind(ip_address.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load latest ban: {error}")))?;

        row.map(BanRecord::try_from).transpose()
    }

    async fn insert_ban(&self, ban: NewBan) -> AppResult<Option<BanRecord>> {
        // A conflict on uq_ip_attempts_ban_chain means another evaluator already
        // escalated from the same predecessor.
        let row = sqlx::query_as::<_, BanRow>(
            r#"
            INSERT INTO ip_attempts (
                id,
                ip_address,
                attempt_time,
                attempt_type,
                ban_level,
                ban_start,
                ban_end,
                grace_period_end,
                triggered_by,
                supersedes_ban_id
            )
            VALUES ($1, $2, $3, 'ban', $4, $3, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            RETURNING
                id,
                ip_address,
                attempt_time,
                ban_level,
                ban_start,
                ban_end,
                grace_period_end,
                triggered_by,
                supersedes_ban_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ban.ip_address.as_str())
        .bind(ban.ban_start)
        .bind(ban.level.as_i16())
        .bind(ban.ban_end)
        .bind(ban.grace_period_end)
        .bind(ban.triggered_by.map(AttemptKind::as_str))
        .bind(ban.supersedes.map(|id| id.as_uuid()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert ban: {error}")))?;

        row.map(BanRecord::try_from).transpose()
    }

    async fn clear_bans(&self, ban_ids: &[AttemptId]) -> AppResult<u64> {
        let ids: Vec<Uuid> = ban_ids.iter().map(AttemptId::as_uuid).collect();

        let result = sqlx::query(
            r#"
            UPDATE ip_attempts
            SET
                ban_level = NULL,
                ban_start = NULL,
                ban_end = NULL,
                grace_period_end = NULL
            WHERE id = ANY($1)
                AND attempt_type = 'ban'
                AND ban_level IS NOT NULL
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear bans: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn list_bans(&self, query: &BanHistoryQuery) -> AppResult<Vec<BanRecord>> {
        let limit = i64::try_from(query.limit)
            .map_err(|error| AppError::Validation(format!("invalid history limit: {error}")))?;
        let offset = i64::try_from(query.offset)
            .map_err(|error| AppError::Validation(format!("invalid history offset: {error}")))?;

        let rows = sqlx::query_as::<_, BanRow>(
            r#"
            SELECT
                id,
                ip_address,
                attempt_time,
                ban_level,
                ban_start,
                ban_end,
                grace_period_end,
                triggered_by,
                supersedes_ban_id
            FROM ip_attempts
            WHERE attempt_type = 'ban'
                AND ($1::text IS NULL OR ip_address = $1)
                AND (
                    $2::timestamptz IS NULL
                    OR ban_level = 4
                    OR (ban_level IS NOT NULL AND ban_end > $2)
                )
            ORDER BY attempt_time DESC, sequence DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.ip_address.as_ref().map(IpAddress::as_str))
        .bind(query.active_at)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list bans: {error}")))?;

        rows.into_iter().map(BanRecord::try_from).collect()
    }

    async fn purge_attempts_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM ip_attempts
            WHERE attempt_type <> 'ban' AND attempt_time < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to purge attempts: {error}")))?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BanRow {
    id: Uuid,
    ip_address: String,
    attempt_time: DateTime<Utc>,
    ban_level: Option<i16>,
    ban_start: Option<DateTime<Utc>>,
    ban_end: Option<DateTime<Utc>>,
    grace_period_end: Option<DateTime<Utc>>,
    triggered_by: Option<String>,
    supersedes_ban_id: Option<Uuid>,
}

impl TryFrom<BanRow> for BanRecord {
    type Error = AppError;

    fn try_from(row: BanRow) -> AppResult<Self> {
        Ok(Self {
            id: AttemptId::from_uuid(row.id),
            ip_address: IpAddress::parse(row.ip_address.as_str())?,
            attempt_time: row.attempt_time,
            level: row.ban_level.map(BanLevel::try_from).transpose()?,
            ban_start: row.ban_start,
            ban_end: row.ban_end,
            grace_period_end: row.grace_period_end,
            triggered_by: row
                .triggered_by
                .as_deref()
                .map(AttemptKind::parse)
                .transpose()?,
            supersedes: row.supersedes_ban_id.map(AttemptId::from_uuid),
        })
    }
}
