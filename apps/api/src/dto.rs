use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use warden_domain::{BanRecord, BanStatus};

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Pre-request access check.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-check-request.ts"
)]
pub struct AccessCheckRequest {
    pub ip_address: String,
}

/// Genuine authentication failure reported by the caller.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/record-failure-request.ts"
)]
pub struct RecordFailureRequest {
    pub ip_address: String,
    /// `login` or `password_reset`.
    pub attempt_type: String,
}

/// Returned when the address may proceed.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-allowed-response.ts"
)]
pub struct AccessAllowedResponse {
    pub allowed: bool,
}

/// Body of a 429 response.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-denied-response.ts"
)]
pub struct AccessDeniedResponse {
    pub allowed: bool,
    pub ban_level: Option<i16>,
    /// RFC 3339 timestamp, `null` for permanent bans.
    pub ban_end: Option<String>,
    pub permanent: bool,
    pub message: String,
}

impl AccessDeniedResponse {
    #[must_use]
    pub fn from_status(status: &BanStatus, now: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            ban_level: status.ban_level.map(|level| level.as_i16()),
            ban_end: status.ban_end.map(format_timestamp),
            permanent: status.is_permanent(),
            message: status.describe(now),
        }
    }
}

/// Query parameters for ban history.
#[derive(Debug, Deserialize)]
pub struct BanHistoryParams {
    pub ip_address: Option<String>,
    pub active_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// API representation of a ban record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/ban-record-response.ts"
)]
pub struct BanRecordResponse {
    pub id: String,
    pub ip_address: String,
    pub created_at: String,
    /// `null` once the ban has been cleared.
    pub ban_level: Option<i16>,
    pub ban_start: Option<String>,
    pub ban_end: Option<String>,
    pub grace_period_end: Option<String>,
    pub triggered_by: Option<String>,
    pub supersedes_ban_id: Option<String>,
}

impl From<BanRecord> for BanRecordResponse {
    fn from(record: BanRecord) -> Self {
        Self {
            id: record.id.to_string(),
            ip_address: record.ip_address.to_string(),
            created_at: format_timestamp(record.attempt_time),
            ban_level: record.level.map(|level| level.as_i16()),
            ban_start: record.ban_start.map(format_timestamp),
            ban_end: record.ban_end.map(format_timestamp),
            grace_period_end: record.grace_period_end.map(format_timestamp),
            triggered_by: record.triggered_by.map(|kind| kind.as_str().to_owned()),
            supersedes_ban_id: record.supersedes.map(|id| id.to_string()),
        }
    }
}

/// Selection of ban records to clear.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/remove-bans-request.ts"
)]
pub struct RemoveBansRequest {
    pub ban_ids: Vec<String>,
}

#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/remove-bans-response.ts"
)]
pub struct RemoveBansResponse {
    pub cleared: u64,
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
