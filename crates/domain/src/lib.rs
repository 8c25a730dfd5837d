//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod attempt;
mod ban;
mod policy;

pub use attempt::{AttemptId, AttemptKind, AttemptRecord, AttemptType, IpAddress};
pub use ban::{BanLevel, BanRecord, BanStatus};
pub use policy::{AttemptCounts, BanPolicy, BanThreshold, MAX_POLICY_SPAN_DAYS};
