use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_core::AppResult;
use warden_domain::{AttemptId, AttemptKind, AttemptRecord, BanLevel, BanRecord, IpAddress};

/// Repository port for the append-only attempt log.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Appends a user attempt stamped with `attempt_time`.
    async fn append_attempt(
        &self,
        ip_address: &IpAddress,
        kind: AttemptKind,
        attempt_time: DateTime<Utc>,
    ) -> AppResult<AttemptRecord>;

    /// Counts non-ban attempts for `ip_address` made at or after each cutoff
    /// in `since` and no later than `until`.
    ///
    /// Returns one count per cutoff, in the same order.
    async fn count_attempts(
        &self,
        ip_address: &IpAddress,
        since: &[DateTime<Utc>],
        until: DateTime<Utc>,
    ) -> AppResult<Vec<u32>>;

    /// Returns the most recent ban record for `ip_address`, cleared or not.
    async fn latest_ban(&self, ip_address: &IpAddress) -> AppResult<Option<BanRecord>>;

    /// Inserts a ban record.
    ///
    /// Returns `Ok(None)` when another ban already supersedes
    /// `ban.supersedes` for the same address.
    async fn insert_ban(&self, ban: NewBan) -> AppResult<Option<BanRecord>>;

    /// Clears ban fields on the given ban records. Returns the number of
    /// records changed.
    async fn clear_bans(&self, ban_ids: &[AttemptId]) -> AppResult<u64>;

    /// Lists ban records newest first.
    async fn list_bans(&self, query: &BanHistoryQuery) -> AppResult<Vec<BanRecord>>;

    /// Deletes non-ban attempts recorded before `before`.
    async fn purge_attempts_before(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Ban record to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBan {
    /// Banned address.
    pub ip_address: IpAddress,
    /// Severity.
    pub level: BanLevel,
    /// Start of the ban; also the log timestamp.
    pub ban_start: DateTime<Utc>,
    /// End of the ban, `None` for permanent.
    pub ban_end: Option<DateTime<Utc>>,
    /// End of the level-three grace period.
    pub grace_period_end: Option<DateTime<Utc>>,
    /// Kind of attempt that led to the evaluation.
    pub triggered_by: Option<AttemptKind>,
    /// Latest ban seen for the address when the decision was made.
    pub supersedes: Option<AttemptId>,
}

/// Filters for reading ban history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanHistoryQuery {
    /// Restricts results to one address.
    pub ip_address: Option<IpAddress>,
    /// When set, only bans active at this instant are returned.
    pub active_at: Option<DateTime<Utc>>,
    /// Maximum number of records.
    pub limit: usize,
    /// Records to skip.
    pub offset: usize,
}

impl Default for BanHistoryQuery {
    fn default() -> Self {
        Self {
            ip_address: None,
            active_at: None,
            limit: 50,
            offset: 0,
        }
    }
}
