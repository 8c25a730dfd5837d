//! Ban levels, ban records and the status reported to callers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{AppError, AppResult};

use crate::{AttemptId, AttemptKind, IpAddress};

/// Ban severity. Level four is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BanLevel {
    /// Short ban after a burst within one minute.
    One,
    /// Ban after sustained volume within one hour.
    Two,
    /// Ban after sustained volume within one day. Followed by a grace period.
    Three,
    /// Permanent ban. Lifted only by an administrator.
    Four,
}

impl BanLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    /// Returns the numeric level (1-4).
    #[must_use]
    pub fn as_i16(self) -> i16 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// Zero-based position, used to index per-level tables.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        }
    }

    /// Returns `true` for the terminal level.
    #[must_use]
    pub fn is_permanent(self) -> bool {
        self == Self::Four
    }
}

impl TryFrom<i16> for BanLevel {
    type Error = AppError;

    fn try_from(value: i16) -> AppResult<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            _ => Err(AppError::Validation(format!(
                "ban level must be between 1 and 4, got {value}"
            ))),
        }
    }
}

/// A synthetic `ban` entry in the attempt log.
///
/// Administrative removal clears `level`, `ban_start`, `ban_end` and
/// `grace_period_end`, leaving an inert record behind for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    /// Entry identifier.
    pub id: AttemptId,
    /// Banned address.
    pub ip_address: IpAddress,
    /// Time the ban decision was written.
    pub attempt_time: DateTime<Utc>,
    /// Severity, `None` once cleared.
    pub level: Option<BanLevel>,
    /// Start of the ban.
    pub ban_start: Option<DateTime<Utc>>,
    /// End of the ban, `None` for permanent or cleared bans.
    pub ban_end: Option<DateTime<Utc>>,
    /// End of the level-three grace period.
    pub grace_period_end: Option<DateTime<Utc>>,
    /// Kind of attempt whose evaluation produced the ban.
    pub triggered_by: Option<AttemptKind>,
    /// Latest ban of the same address when this one was written.
    pub supersedes: Option<AttemptId>,
}

impl BanRecord {
    /// Returns `true` if the ban denies access at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.level {
            None => false,
            Some(BanLevel::Four) => true,
            Some(_) => self.ban_end.is_some_and(|ban_end| ban_end > now),
        }
    }

    /// Returns `true` if the ban was cleared by an administrator.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.level.is_none()
    }

    /// Returns `true` while an expired level-three ban is inside its grace period.
    #[must_use]
    pub fn is_in_grace_period(&self, now: DateTime<Utc>) -> bool {
        if self.level != Some(BanLevel::Three) || self.is_active(now) {
            return false;
        }

        self.grace_period_end
            .is_some_and(|grace_period_end| now < grace_period_end)
    }
}

/// Ban decision returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanStatus {
    /// Evaluated address.
    pub ip_address: IpAddress,
    /// `true` when the caller should reject the request.
    pub is_banned: bool,
    /// Level of the active ban.
    pub ban_level: Option<BanLevel>,
    /// End of the active ban, `None` when permanent or not banned.
    pub ban_end: Option<DateTime<Utc>>,
    /// Identifier of the active ban record.
    pub ban_id: Option<AttemptId>,
}

impl BanStatus {
    /// Status for an address without an active ban.
    #[must_use]
    pub fn not_banned(ip_address: IpAddress) -> Self {
        Self {
            ip_address,
            is_banned: false,
            ban_level: None,
            ban_end: None,
            ban_id: None,
        }
    }

    /// Derives the status from a ban record as seen at `now`.
    #[must_use]
    pub fn from_record(record: &BanRecord, now: DateTime<Utc>) -> Self {
        if !record.is_active(now) {
            return Self::not_banned(record.ip_address.clone());
        }

        Self {
            ip_address: record.ip_address.clone(),
            is_banned: true,
            ban_level: record.level,
            ban_end: record.ban_end,
            ban_id: Some(record.id),
        }
    }

    /// Returns `true` for a level-four ban.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.is_banned && self.ban_level.is_some_and(BanLevel::is_permanent)
    }

    /// Time left on a temporary ban.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_banned {
            return None;
        }

        self.ban_end
            .map(|ban_end| (ban_end - now).max(Duration::zero()))
    }

    /// Human-readable explanation for a denied request.
    #[must_use]
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        if !self.is_banned {
            return "access allowed".to_owned();
        }

        if self.is_permanent() {
            return "access from this address has been permanently blocked; contact an administrator"
                .to_owned();
        }

        match self.remaining(now) {
            Some(remaining) => format!(
                "too many attempts, try again in {}",
                humanize_duration(remaining)
            ),
            None => "too many attempts, try again later".to_owned(),
        }
    }
}

fn humanize_duration(duration: Duration) -> String {
    let total_minutes = (duration.num_seconds() + 59) / 60;

    if total_minutes <= 1 {
        return "1 minute".to_owned();
    }

    if total_minutes < 120 {
        return format!("{total_minutes} minutes");
    }

    // Minutes are already rounded up; larger units floor.
    let hours = total_minutes / 60;
    if hours < 48 {
        return format!("{hours} hours");
    }

    format!("{} days", hours / 24)
}
