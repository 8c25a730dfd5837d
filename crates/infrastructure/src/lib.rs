//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_attempt_repository;
mod postgres_attempt_repository;

pub use in_memory_attempt_repository::InMemoryAttemptRepository;
pub use postgres_attempt_repository::PostgresAttemptRepository;
