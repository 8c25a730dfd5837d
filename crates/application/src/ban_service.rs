//! Progressive IP ban engine.
//!
//! Failed logins and password resets are appended to an attempt log. After
//! each attempt the source address is evaluated against four rolling windows
//! and banned for ten minutes, one hour, one day or permanently. A fresh
//! attempt during the week after a level-three ban expires escalates straight
//! to a permanent ban.

mod config;
mod ip_locks;
mod ports;
mod service;


pub use config::BanServiceConfig;
pub use ports::{AttemptRepository, BanHistoryQuery, Clock, NewBan, SystemClock};
pub use service::{AccessDecision, BanService};
