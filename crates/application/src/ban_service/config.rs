use chrono::Duration;

use warden_core::{AppError, AppResult};
use warden_domain::{BanLevel, BanPolicy, MAX_POLICY_SPAN_DAYS};

/// Configuration for the ban service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BanServiceConfig {
    /// Escalation thresholds and ban durations.
    pub policy: BanPolicy,
    /// How long plain attempts are kept. `None` keeps them forever.
    pub attempt_retention: Option<Duration>,
}

impl BanServiceConfig {
    /// Creates a validated configuration.
    ///
    /// Retention shorter than the longest lookback window would make
    /// escalation forget attempts it still has to count, so it is rejected.
    pub fn new(policy: BanPolicy, attempt_retention: Option<Duration>) -> AppResult<Self> {
        if let Some(retention) = attempt_retention {
            if retention < policy.longest_window() {
                return Err(AppError::Validation(format!(
                    "attempt retention of {} days is shorter than the longest ban window",
                    retention.num_days()
                )));
            }

            if retention > Duration::days(MAX_POLICY_SPAN_DAYS) {
                return Err(AppError::Validation(format!(
                    "attempt retention must be at most {MAX_POLICY_SPAN_DAYS} days"
                )));
            }
        }

        Ok(Self {
            policy,
            attempt_retention,
        })
    }

    /// Builds configuration from named settings.
    ///
    /// `lookup` returns the raw value of a setting such as
    /// `BAN_LEVEL1_ATTEMPTS`; unset settings keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BanPolicy::default();

        let mut thresholds = BanLevel::ALL.map(|level| defaults.threshold(level));
        for (level, threshold) in BanLevel::ALL.iter().zip(thresholds.iter_mut()) {
            let number = level.as_i16();
            if let Some(attempts) = parse_setting::<u32, _>(
                &lookup,
                format!("BAN_LEVEL{number}_ATTEMPTS").as_str(),
            )? {
                threshold.min_attempts = attempts;
            }
            if let Some(window) = seconds_setting(
                &lookup,
                format!("BAN_LEVEL{number}_WINDOW_SECONDS").as_str(),
            )? {
                threshold.window = window;
            }
        }

        let mut durations = [BanLevel::One, BanLevel::Two, BanLevel::Three]
            .map(|level| defaults.ban_duration(level).unwrap_or_else(Duration::zero));
        for (index, duration) in durations.iter_mut().enumerate() {
            let name = format!("BAN_LEVEL{}_DURATION_SECONDS", index + 1);
            if let Some(value) = seconds_setting(&lookup, name.as_str())? {
                *duration = value;
            }
        }

        let grace_period = seconds_setting(&lookup, "BAN_GRACE_PERIOD_SECONDS")?
            .unwrap_or_else(|| defaults.grace_period());

        let attempt_retention = parse_setting::<i64, _>(&lookup, "ATTEMPT_RETENTION_DAYS")?
            .map(|days| {
                Duration::try_days(days).ok_or_else(|| {
                    AppError::Validation(format!(
                        "ATTEMPT_RETENTION_DAYS is out of range: {days}"
                    ))
                })
            })
            .transpose()?;

        let policy = BanPolicy::new(thresholds, durations, grace_period)?;
        Self::new(policy, attempt_retention)
    }
}

fn seconds_setting<F>(lookup: &F, name: &str) -> AppResult<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    parse_setting::<i64, _>(lookup, name)?
        .map(|seconds| {
            Duration::try_seconds(seconds)
                .ok_or_else(|| AppError::Validation(format!("{name} is out of range: {seconds}")))
        })
        .transpose()
}

fn parse_setting<T, F>(lookup: &F, name: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name).filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };

    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
}

