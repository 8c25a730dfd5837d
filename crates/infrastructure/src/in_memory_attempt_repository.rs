use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use warden_application::{AttemptRepository, BanHistoryQuery, NewBan};
use warden_core::{AppError, AppResult};
use warden_domain::{AttemptId, AttemptKind, AttemptRecord, BanRecord, IpAddress};


#[derive(Debug, Clone)]
enum LogEntry {
    Attempt(AttemptRecord),
    Ban(BanRecord),
}

/// In-memory attempt log for tests and single-process deployments.
///
/// Entries are kept in insertion order, which doubles as the sequence used to
/// order records that share a timestamp.
#[derive(Debug, Default)]
pub struct InMemoryAttemptRepository {
    entries: RwLock<Vec<LogEntry>>,
}

impl InMemoryAttemptRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AttemptRepository for InMemoryAttemptRepository {
    async fn append_attempt(
        &self,
        ip_address: &IpAddress,
        kind: AttemptKind,
        attempt_time: DateTime<Utc>,
    ) -> AppResult<AttemptRecord> {
        let record = AttemptRecord {
            id: AttemptId::new(),
            ip_address: ip_address.clone(),
            attempt_time,
            kind,
        };

        self.entries
            .write()
            .await
            .push(LogEntry::Attempt(record.clone()));
        Ok(record)
    }

    async fn count_attempts(
        &self,
        ip_address: &IpAddress,
        since: &[DateTime<Utc>],
        until: DateTime<Utc>,
    ) -> AppResult<Vec<u32>> {
        let entries = self.entries.read().await;
        let times: Vec<DateTime<Utc>> = entries
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Attempt(attempt)
                    if attempt.ip_address == *ip_address && attempt.attempt_time <= until =>
                {
                    Some(attempt.attempt_time)
                }
                _ => None,
            })
            .collect();

        since
            .iter()
            .map(|cutoff| {
                let count = times.iter().filter(|time| **time >= *cutoff).count();
                u32::try_from(count).map_err(|error| {
                    AppError::Internal(format!("attempt count overflow: {error}"))
                })
            })
            .collect()
    }

    async fn latest_ban(&self, ip_address: &IpAddress) -> AppResult<Option<BanRecord>> {
        let entries = self.entries.read().await;

        Ok(entries
            .iter()
            .enumerate()
            .filter_map(|(sequence, entry)| match entry {
                LogEntry::Ban(ban) if ban.ip_address == *ip_address => Some((sequence, ban)),
                _ => None,
            })
            .max_by_key(|(sequence, ban)| (ban.attempt_time, *sequence))
            .map(|(_, ban)| ban.clone()))
    }

    async fn insert_ban(&self, ban: NewBan) -> AppResult<Option<BanRecord>> {
        let mut entries = self.entries.write().await;

        let already_superseded = entries.iter().any(|entry| match entry {
            LogEntry::Ban(existing) => {
                existing.ip_address == ban.ip_address && existing.supersedes == ban.supersedes
            }
            LogEntry::Attempt(_) => false,
        });
        if already_superseded {
            return Ok(None);
        }

        let record = BanRecord {
            id: AttemptId::new(),
            ip_address: ban.ip_address,
            attempt_time: ban.ban_start,
            level: Some(ban.level),
            ban_start: Some(ban.ban_start),
            ban_end: ban.ban_end,
            grace_period_end: ban.grace_period_end,
            triggered_by: ban.triggered_by,
            supersedes: ban.supersedes,
        };
        entries.push(LogEntry::Ban(record.clone()));

        Ok(Some(record))
    }

    async fn clear_bans(&self, ban_ids: &[AttemptId]) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let mut cleared = 0_u64;

        for entry in entries.iter_mut() {
            let LogEntry::Ban(ban) = entry else {
                continue;
            };
            if !ban_ids.contains(&ban.id) || ban.is_cleared() {
                continue;
            }

            ban.level = None;
            ban.ban_start = None;
            ban.ban_end = None;
            ban.grace_period_end = None;
            cleared += 1;
        }

        Ok(cleared)
    }

    async fn list_bans(&self, query: &BanHistoryQuery) -> AppResult<Vec<BanRecord>> {
        let entries = self.entries.read().await;

        let mut bans: Vec<(usize, &BanRecord)> = entries
            .iter()
            .enumerate()
            .filter_map(|(sequence, entry)| match entry {
                LogEntry::Ban(ban) => Some((sequence, ban)),
                LogEntry::Attempt(_) => None,
            })
            .filter(|(_, ban)| {
                query
                    .ip_address
                    .as_ref()
                    .is_none_or(|ip_address| ban.ip_address == *ip_address)
            })
            .filter(|(_, ban)| query.active_at.is_none_or(|now| ban.is_active(now)))
            .collect();

        bans.sort_by(|(left_sequence, left), (right_sequence, right)| {
            (right.attempt_time, right_sequence).cmp(&(left.attempt_time, left_sequence))
        });

        Ok(bans
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|(_, ban)| ban.clone())
            .collect())
    }

    async fn purge_attempts_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let original_len = entries.len();

        entries.retain(|entry| match entry {
            LogEntry::Attempt(attempt) => attempt.attempt_time >= before,
            LogEntry::Ban(_) => true,
        });

        Ok(u64::try_from(original_len - entries.len()).unwrap_or(u64::MAX))
    }
}
