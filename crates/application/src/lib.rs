//! Application services and ports.

#![forbid(unsafe_code)]

mod ban_service;

pub use ban_service::{
    AccessDecision, AttemptRepository, BanHistoryQuery, BanService, BanServiceConfig, Clock,
    NewBan, SystemClock,
};
