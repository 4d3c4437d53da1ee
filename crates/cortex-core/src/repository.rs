//! Repository trait definitions — the persistence port.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation.
//! Single-record operations are atomic; multi-record operations are
//! best-effort and callers must compensate on partial failure.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{
    agent::AgentKind,
    audit::{AuditEvent, CreateAuditEvent},
    collaboration::{CollabStep, Collaboration, CollaborationStatus, CreateCollaboration},
    metric::MetricSample,
    session::{CreateSession, Session},
    task::{CreateTask, Task, TaskPatch, TaskState},
    tenant::{CreateTenant, Tenant, TenantStatus, UpdateTenant},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub status: Option<TenantStatus>,
}

pub trait TenantRepository: Send + Sync {
    /// Create a tenant. `primary_domain` must be unique across active
    /// tenants; a collision is a conflict.
    fn create(&self, input: CreateTenant) -> impl Future<Output = CoreResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CoreResult<Tenant>> + Send;
    fn get_by_domain(&self, domain: &str) -> impl Future<Output = CoreResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = CoreResult<Tenant>> + Send;
    fn list(
        &self,
        filter: TenantFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<Tenant>>> + Send;
    /// Hard-delete a tenant row. Compensation for failed multi-step
    /// provisioning only; live tenants are suspended, never removed.
    fn remove(&self, id: Uuid) -> impl Future<Output = CoreResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Users (tenant scope)
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Create a user. The raw password is hashed before storage; the
    /// `(tenant_id, email)` pair is unique.
    fn create(&self, input: CreateUser) -> impl Future<Output = CoreResult<User>> + Send;
    fn get_by_id(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = CoreResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = CoreResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = CoreResult<User>> + Send;
    /// Replace the password hash and bump `password_version`,
    /// invalidating sessions issued under the previous version.
    fn rotate_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_password: &str,
    ) -> impl Future<Output = CoreResult<User>> + Send;
    fn count(&self, tenant_id: Uuid) -> impl Future<Output = CoreResult<u64>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = CoreResult<Session>> + Send;
    /// Token hashes are globally unique, so lookup is unscoped; the
    /// caller must still check the session's tenant against the
    /// request context.
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = CoreResult<Session>> + Send;
    fn revoke(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CoreResult<()>> + Send;
    fn revoke_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    /// Remove expired sessions; returns how many were deleted.
    fn cleanup_expired(&self) -> impl Future<Output = CoreResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Tasks (tenant scope)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub agent_kind: Option<AgentKind>,
    pub state: Option<TaskState>,
}

pub trait TaskRepository: Send + Sync {
    /// Persist a new task in `queued` state. An existing id is a
    /// conflict — a task enters the queue exactly once.
    fn create(&self, input: CreateTask) -> impl Future<Output = CoreResult<Task>> + Send;
    fn get(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CoreResult<Task>> + Send;
    /// Compare-and-set state transition. Fails with a conflict when
    /// the stored state no longer matches `from`.
    fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: TaskState,
        to: TaskState,
        patch: TaskPatch,
    ) -> impl Future<Output = CoreResult<Task>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: TaskFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<Task>>> + Send;
    /// Number of tasks created since `since` — the daily-quota window.
    fn count_since(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Collaborations (tenant scope)
// ---------------------------------------------------------------------------

pub trait CollaborationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCollaboration,
    ) -> impl Future<Output = CoreResult<Collaboration>> + Send;
    fn get(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CoreResult<Collaboration>> + Send;
    fn add_step(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        step: CollabStep,
    ) -> impl Future<Output = CoreResult<Collaboration>> + Send;
    fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: CollaborationStatus,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    /// Remove completed collaborations (succeeded, partial, or failed)
    /// last updated before `older_than`. Returns how many were
    /// archived.
    fn archive_completed(
        &self,
        older_than: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only, tenant scope)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor: Option<Uuid>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append an audit event. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditEvent,
    ) -> impl Future<Output = CoreResult<AuditEvent>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<AuditEvent>>> + Send;
}

// ---------------------------------------------------------------------------
// Metric samples (append-only, tenant scope)
// ---------------------------------------------------------------------------

pub trait MetricRepository: Send + Sync {
    fn append(&self, sample: MetricSample) -> impl Future<Output = CoreResult<()>> + Send;
    /// Samples for a tenant within `[from, to)`, optionally filtered
    /// by metric name, ordered by timestamp.
    fn query(
        &self,
        tenant_id: Uuid,
        name: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<Vec<MetricSample>>> + Send;
}
