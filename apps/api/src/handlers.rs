pub mod access;
pub mod bans;
pub mod health;
