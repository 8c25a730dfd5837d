//! Escalation thresholds and ban durations.

use chrono::Duration;
use warden_core::{AppError, AppResult};

use crate::BanLevel;

/// Upper bound, in days, for every window, ban duration and grace period.
pub const MAX_POLICY_SPAN_DAYS: i64 = 3650;

/// Minimum attempt volume within a rolling window that qualifies for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanThreshold {
    /// Attempts required (inclusive).
    pub min_attempts: u32,
    /// Rolling lookback window ending at evaluation time.
    pub window: Duration,
}

impl BanThreshold {
    /// Creates a threshold.
    #[must_use]
    pub fn new(min_attempts: u32, window: Duration) -> Self {
        Self {
            min_attempts,
            window,
        }
    }
}

/// Attempt counts observed in each level's window, indexed by level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptCounts([u32; 4]);

impl AttemptCounts {
    /// Creates counts ordered by level (one to four).
    #[must_use]
    pub fn new(counts: [u32; 4]) -> Self {
        Self(counts)
    }

    /// Count observed in the window of `level`.
    #[must_use]
    pub fn for_level(&self, level: BanLevel) -> u32 {
        self.0[level.index()]
    }
}

/// Progressive ban policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanPolicy {
    thresholds: [BanThreshold; 4],
    temporary_durations: [Duration; 3],
    grace_period: Duration,
}

impl BanPolicy {
    /// Creates a validated policy.
    ///
    /// `thresholds` are ordered by level. `temporary_durations` hold the ban
    /// length of levels one to three; level four is always permanent.
    pub fn new(
        thresholds: [BanThreshold; 4],
        temporary_durations: [Duration; 3],
        grace_period: Duration,
    ) -> AppResult<Self> {
        for (level, threshold) in BanLevel::ALL.iter().zip(thresholds.iter()) {
            if threshold.min_attempts == 0 {
                return Err(AppError::Validation(format!(
                    "level {} threshold must require at least one attempt",
                    level.as_i16()
                )));
            }

            if !is_within_span(threshold.window) {
                return Err(AppError::Validation(format!(
                    "level {} window must be positive and at most {MAX_POLICY_SPAN_DAYS} days",
                    level.as_i16()
                )));
            }
        }

        for (level, duration) in BanLevel::ALL.iter().zip(temporary_durations.iter()) {
            if !is_within_span(*duration) {
                return Err(AppError::Validation(format!(
                    "level {} ban duration must be positive and at most {MAX_POLICY_SPAN_DAYS} days",
                    level.as_i16()
                )));
            }
        }

        if !is_within_span(grace_period) {
            return Err(AppError::Validation(format!(
                "grace period must be positive and at most {MAX_POLICY_SPAN_DAYS} days"
            )));
        }

        Ok(Self {
            thresholds,
            temporary_durations,
            grace_period,
        })
    }

    /// Threshold configured for `level`.
    #[must_use]
    pub fn threshold(&self, level: BanLevel) -> BanThreshold {
        self.thresholds[level.index()]
    }

    /// Ban length for `level`, `None` for the permanent level.
    #[must_use]
    pub fn ban_duration(&self, level: BanLevel) -> Option<Duration> {
        self.temporary_durations.get(level.index()).copied()
    }

    /// Grace period following an expired level-three ban.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Longest lookback window of any level.
    #[must_use]
    pub fn longest_window(&self) -> Duration {
        self.thresholds
            .iter()
            .map(|threshold| threshold.window)
            .max()
            .unwrap_or_else(Duration::zero)
    }

    /// Highest level above `current` whose threshold is met by `counts`.
    #[must_use]
    pub fn escalation_level(
        &self,
        counts: &AttemptCounts,
        current: Option<BanLevel>,
    ) -> Option<BanLevel> {
        BanLevel::ALL
            .iter()
            .rev()
            .copied()
            .filter(|level| current.is_none_or(|current| *level > current))
            .find(|level| counts.for_level(*level) >= self.threshold(*level).min_attempts)
    }
}

impl Default for BanPolicy {
    fn default() -> Self {
        Self {
            thresholds: [
                BanThreshold::new(10, Duration::minutes(1)),
                BanThreshold::new(20, Duration::hours(1)),
                BanThreshold::new(30, Duration::days(1)),
                BanThreshold::new(50, Duration::weeks(1)),
            ],
            temporary_durations: [
                Duration::minutes(10),
                Duration::hours(1),
                Duration::days(1),
            ],
            grace_period: Duration::days(7),
        }
    }
}

fn is_within_span(span: Duration) -> bool {
    span > Duration::zero() && span <= Duration::days(MAX_POLICY_SPAN_DAYS)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::{AttemptCounts, BanPolicy, BanThreshold, MAX_POLICY_SPAN_DAYS};
    use crate::BanLevel;

    #[test]
    fn below_every_threshold_is_not_banned() {
        let policy = BanPolicy::default();
        let counts = AttemptCounts::new([9, 19, 29, 49]);

        assert_eq!(policy.escalation_level(&counts, None), None);
    }

    #[test]
    fn ten_in_a_minute_is_level_one() {
        let policy = BanPolicy::default();
        let counts = AttemptCounts::new([10, 10, 10, 10]);

        assert_eq!(policy.escalation_level(&counts, None), Some(BanLevel::One));
    }

    #[test]
    fn extreme_burst_skips_to_highest_level_met() {
        let policy = BanPolicy::default();
        let counts = AttemptCounts::new([50, 50, 50, 50]);

        assert_eq!(policy.escalation_level(&counts, None), Some(BanLevel::Four));
    }

    #[test]
    fn only_levels_above_current_are_candidates() {
        let policy = BanPolicy::default();
        let counts = AttemptCounts::new([40, 40, 40, 40]);

        assert_eq!(
            policy.escalation_level(&counts, Some(BanLevel::Three)),
            None
        );
        assert_eq!(
            policy.escalation_level(&counts, Some(BanLevel::One)),
            Some(BanLevel::Three)
        );
    }

    #[test]
    fn level_four_has_no_duration() {
        let policy = BanPolicy::default();

        assert_eq!(policy.ban_duration(BanLevel::One), Some(Duration::minutes(10)));
        assert_eq!(policy.ban_duration(BanLevel::Three), Some(Duration::days(1)));
        assert_eq!(policy.ban_duration(BanLevel::Four), None);
        assert_eq!(policy.longest_window(), Duration::weeks(1));
    }

    #[test]
    fn policy_rejects_zero_thresholds() {
        let mut thresholds = [BanThreshold::new(10, Duration::minutes(1)); 4];
        thresholds[2].min_attempts = 0;

        let result = BanPolicy::new(
            thresholds,
            [Duration::minutes(10); 3],
            Duration::days(7),
        );
        assert!(result.is_err());
    }

    #[test]
    fn policy_rejects_spans_beyond_the_upper_bound() {
        let thresholds = [BanThreshold::new(10, Duration::minutes(1)); 4];
        let too_long = Duration::days(MAX_POLICY_SPAN_DAYS + 1);

        let mut long_window = thresholds;
        long_window[3].window = too_long;
        assert!(
            BanPolicy::new(long_window, [Duration::minutes(10); 3], Duration::days(7)).is_err()
        );

        assert!(BanPolicy::new(thresholds, [too_long; 3], Duration::days(7)).is_err());
        assert!(BanPolicy::new(thresholds, [Duration::minutes(10); 3], too_long).is_err());

        let at_bound = Duration::days(MAX_POLICY_SPAN_DAYS);
        assert!(BanPolicy::new(thresholds, [at_bound; 3], at_bound).is_ok());
    }

    proptest! {
        #[test]
        fn escalation_is_monotonic_in_counts(
            base in proptest::array::uniform4(0_u32..80),
            extra in proptest::array::uniform4(0_u32..80),
        ) {
            let policy = BanPolicy::default();
            let lower = AttemptCounts::new(base);
            let higher = AttemptCounts::new([
                base[0] + extra[0],
                base[1] + extra[1],
                base[2] + extra[2],
                base[3] + extra[3],
            ]);

            let lower_level = policy.escalation_level(&lower, None);
            let higher_level = policy.escalation_level(&higher, None);
            prop_assert!(higher_level >= lower_level);
        }

        #[test]
        fn escalation_always_exceeds_current_level(
            counts in proptest::array::uniform4(0_u32..80),
            current in 1_i16..=4,
        ) {
            let policy = BanPolicy::default();
            let current = BanLevel::try_from(current).ok();
            let level = policy.escalation_level(&AttemptCounts::new(counts), current);

            if let Some(level) = level {
                prop_assert!(Some(level) > current);
            }
        }
    }
}
