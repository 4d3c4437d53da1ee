//! Repository implementations backed by SurrealDB.

mod audit;
mod collaboration;
mod metric;
mod session;
mod task;
mod tenant;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use collaboration::SurrealCollaborationRepository;
pub use metric::SurrealMetricRepository;
pub use session::SurrealSessionRepository;
pub use task::SurrealTaskRepository;
pub use tenant::SurrealTenantRepository;
pub use user::{SurrealUserRepository, hash_password, verify_password};
