use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use warden_core::{AppError, AppResult};
use warden_domain::{
    AttemptCounts, AttemptId, AttemptKind, AttemptRecord, BanLevel, BanPolicy, BanRecord,
    BanStatus, IpAddress,
};

use super::config::BanServiceConfig;
use super::ip_locks::IpLockTable;
use super::ports::{AttemptRepository, BanHistoryQuery, Clock, NewBan};

/// Bounded number of re-reads after another evaluator wrote a ban first.
const MAX_ESCALATION_ROUNDS: usize = 3;

/// Outcome handed to the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// No active ban.
    Allowed,
    /// An active ban denies the request.
    Banned(BanStatus),
    /// The attempt store failed; the request is denied.
    Unavailable,
}

impl AccessDecision {
    /// Returns `true` only when the request may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Application service for progressive IP bans.
#[derive(Clone)]
pub struct BanService {
    repository: Arc<dyn AttemptRepository>,
    clock: Arc<dyn Clock>,
    config: BanServiceConfig,
    ip_locks: Arc<IpLockTable>,
}

impl BanService {
    /// Creates a new ban service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AttemptRepository>,
        clock: Arc<dyn Clock>,
        config: BanServiceConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            config,
            ip_locks: Arc::new(IpLockTable::default()),
        }
    }

    /// Active escalation policy.
    #[must_use]
    pub fn policy(&self) -> &BanPolicy {
        &self.config.policy
    }

    /// Appends one attempt to the log.
    pub async fn record_attempt(
        &self,
        ip_address: &IpAddress,
        kind: AttemptKind,
    ) -> AppResult<AttemptRecord> {
        let now = self.clock.now();
        self.repository
            .append_attempt(ip_address, kind, now)
            .await
    }

    /// Returns the ban status of `ip_address`, escalating first if its recent
    /// attempt volume crosses a threshold.
    ///
    /// Evaluation for one address is serialized; different addresses proceed
    /// independently.
    pub async fn check_and_create_ban(&self, ip_address: &IpAddress) -> AppResult<BanStatus> {
        self.evaluate(ip_address, None).await
    }

    /// Pre-request check. Storage failures deny the request.
    pub async fn admit(&self, ip_address: &IpAddress) -> AccessDecision {
        let result = self.check_and_create_ban(ip_address).await;
        self.decide(ip_address, result)
    }

    /// Records a genuine authentication failure and re-evaluates the address.
    /// Storage failures deny the request.
    pub async fn record_failure(&self, ip_address: &IpAddress, kind: AttemptKind) -> AccessDecision {
        let result = match self.record_attempt(ip_address, kind).await {
            Ok(_) => self.evaluate(ip_address, Some(kind)).await,
            Err(error) => Err(error),
        };

        self.decide(ip_address, result)
    }

    /// Clears the selected ban records.
    ///
    /// Attempt counts are left untouched, so an address that is still over a
    /// threshold is banned again on its next evaluation.
    pub async fn remove_ban(&self, ban_ids: &[AttemptId]) -> AppResult<u64> {
        if ban_ids.is_empty() {
            return Err(AppError::Validation(
                "at least one ban id is required".to_owned(),
            ));
        }

        let cleared = self.repository.clear_bans(ban_ids).await?;
        info!(requested = ban_ids.len(), cleared, "ban records cleared");

        Ok(cleared)
    }

    /// Lists ban records newest first.
    pub async fn ban_history(
        &self,
        ip_address: Option<IpAddress>,
        active_only: bool,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<BanRecord>> {
        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        let query = BanHistoryQuery {
            ip_address,
            active_at: active_only.then(|| self.clock.now()),
            limit: limit.min(500),
            offset,
        };

        self.repository.list_bans(&query).await
    }

    /// Deletes plain attempts older than the configured retention. Ban records
    /// are kept.
    pub async fn purge_expired_attempts(&self) -> AppResult<u64> {
        let Some(retention) = self.config.attempt_retention else {
            debug!("attempt retention not configured, skipping purge");
            return Ok(0);
        };

        let cutoff = shift_back(self.clock.now(), retention)?;
        let purged = self.repository.purge_attempts_before(cutoff).await?;
        info!(purged, cutoff = %cutoff, "purged expired attempts");

        Ok(purged)
    }

    async fn evaluate(
        &self,
        ip_address: &IpAddress,
        trigger: Option<AttemptKind>,
    ) -> AppResult<BanStatus> {
        let _guard = self.ip_locks.acquire(ip_address.as_str()).await;

        for _ in 0..MAX_ESCALATION_ROUNDS {
            let now = self.clock.now();
            let latest = self.repository.latest_ban(ip_address).await?;

            if let Some(ban) = latest.as_ref().filter(|ban| ban.is_active(now)) {
                return Ok(BanStatus::from_record(ban, now));
            }

            let Some(level) = self.escalation_target(ip_address, latest.as_ref(), now).await?
            else {
                return Ok(BanStatus::not_banned(ip_address.clone()));
            };

            let ban_end = self
                .config
                .policy
                .ban_duration(level)
                .map(|duration| shift_forward(now, duration))
                .transpose()?;
            let grace_period_end = match (level, ban_end) {
                (BanLevel::Three, Some(end)) => {
                    Some(shift_forward(end, self.config.policy.grace_period())?)
                }
                _ => None,
            };

            let new_ban = NewBan {
                ip_address: ip_address.clone(),
                level,
                ban_start: now,
                ban_end,
                grace_period_end,
                triggered_by: trigger,
                supersedes: latest.as_ref().map(|ban| ban.id),
            };

            match self.repository.insert_ban(new_ban).await? {
                Some(ban) => {
                    warn!(
                        ip_address = %ip_address,
                        ban_level = level.as_i16(),
                        ban_end = ?ban.ban_end,
                        "ip address banned"
                    );
                    return Ok(BanStatus::from_record(&ban, now));
                }
                None => {
                    debug!(
                        ip_address = %ip_address,
                        "ban already escalated by another evaluator, re-reading"
                    );
                }
            }
        }

        Err(AppError::Conflict(format!(
            "could not settle ban state for '{ip_address}'"
        )))
    }

    async fn escalation_target(
        &self,
        ip_address: &IpAddress,
        latest: Option<&BanRecord>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BanLevel>> {
        let mut current_level = None;

        if let Some(ban) = latest.filter(|ban| ban.is_in_grace_period(now)) {
            current_level = ban.level;

            if let Some(ban_end) = ban.ban_end {
                let fresh = self
                    .repository
                    .count_attempts(ip_address, &[ban_end], now)
                    .await?;
                if fresh.first().copied().unwrap_or(0) > 0 {
                    return Ok(Some(BanLevel::Four));
                }
            }
        }

        let policy = &self.config.policy;
        let mut cutoffs = [now; 4];
        for (cutoff, level) in cutoffs.iter_mut().zip(BanLevel::ALL) {
            *cutoff = shift_back(now, policy.threshold(level).window)?;
        }
        let counts = self
            .repository
            .count_attempts(ip_address, &cutoffs, now)
            .await?;
        let counts: [u32; 4] = counts.try_into().map_err(|counts: Vec<u32>| {
            AppError::Internal(format!(
                "attempt store returned {} window counts, expected 4",
                counts.len()
            ))
        })?;

        Ok(policy.escalation_level(&AttemptCounts::new(counts), current_level))
    }

    fn decide(&self, ip_address: &IpAddress, result: AppResult<BanStatus>) -> AccessDecision {
        match result {
            Ok(status) if status.is_banned => AccessDecision::Banned(status),
            Ok(_) => AccessDecision::Allowed,
            Err(failure) => {
                error!(
                    ip_address = %ip_address,
                    error = %failure,
                    "ban evaluation failed, denying request"
                );
                AccessDecision::Unavailable
            }
        }
    }
}

fn shift_forward(at: DateTime<Utc>, by: Duration) -> AppResult<DateTime<Utc>> {
    at.checked_add_signed(by)
        .ok_or_else(|| AppError::Internal(format!("timestamp overflow adding {by} to {at}")))
}

fn shift_back(at: DateTime<Utc>, by: Duration) -> AppResult<DateTime<Utc>> {
    at.checked_sub_signed(by)
        .ok_or_else(|| AppError::Internal(format!("timestamp overflow subtracting {by} from {at}")))
}
