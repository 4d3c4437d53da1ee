//! Cortex Database — SurrealDB connection management and repository
//! implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repository implementations for `cortex-core` traits
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{
    SurrealAuditLogRepository, SurrealCollaborationRepository, SurrealMetricRepository,
    SurrealSessionRepository, SurrealTaskRepository, SurrealTenantRepository,
    SurrealUserRepository, hash_password, verify_password,
};
pub use schema::run_migrations;
