//! Attempt log types.
//!
//! Every guarded request leaves one immutable entry in the attempt log. Ban
//! decisions are written to the same log as synthetic `ban` entries, see
//! [`crate::BanRecord`].

use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{AppError, AppResult};

/// Unique identifier for an attempt log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Creates a new random attempt identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an attempt identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AttemptId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated and normalized IP address literal.
///
/// IPv6 literals are stored in canonical compressed form and IPv4-mapped IPv6
/// addresses fold to plain IPv4, so the same client always produces the same
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IpAddress(String);

impl IpAddress {
    /// Parses and normalizes an IP address literal.
    pub fn parse(value: &str) -> AppResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "ip address must not be empty".to_owned(),
            ));
        }

        let address = IpAddr::from_str(trimmed).map_err(|error| {
            AppError::Validation(format!("invalid ip address '{trimmed}': {error}"))
        })?;

        Ok(Self::from(address))
    }

    /// Returns the normalized address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<IpAddr> for IpAddress {
    fn from(value: IpAddr) -> Self {
        Self(value.to_canonical().to_string())
    }
}

impl From<IpAddress> for String {
    fn from(value: IpAddress) -> Self {
        value.0
    }
}

impl Display for IpAddress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Classification of a user-initiated attempt against a guarded surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// Failed login.
    Login,
    /// Password reset request or completion.
    PasswordReset,
}

impl AttemptKind {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Parses a storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "login" => Ok(Self::Login),
            "password_reset" => Ok(Self::PasswordReset),
            _ => Err(AppError::Validation(format!(
                "unknown attempt type '{value}'"
            ))),
        }
    }
}

/// Discriminator of an attempt log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptType {
    /// Failed login.
    Login,
    /// Password reset request or completion.
    PasswordReset,
    /// Synthetic entry recording a ban decision.
    Ban,
}

impl AttemptType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
            Self::Ban => "ban",
        }
    }

    /// Parses a storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "ban" => Ok(Self::Ban),
            other => AttemptKind::parse(other).map(Self::from),
        }
    }
}

impl From<AttemptKind> for AttemptType {
    fn from(value: AttemptKind) -> Self {
        match value {
            AttemptKind::Login => Self::Login,
            AttemptKind::PasswordReset => Self::PasswordReset,
        }
    }
}

/// A single user attempt as persisted in the attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Entry identifier.
    pub id: AttemptId,
    /// Source address.
    pub ip_address: IpAddress,
    /// Time the attempt was recorded.
    pub attempt_time: DateTime<Utc>,
    /// Attempt classification.
    pub kind: AttemptKind,
}
