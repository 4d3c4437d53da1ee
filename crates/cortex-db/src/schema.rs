//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Index choices follow the query
//! paths of the dispatcher, access control, and insights engine.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

pub const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD display_name ON TABLE tenant TYPE string;
DEFINE FIELD primary_domain ON TABLE tenant TYPE string;
DEFINE FIELD branding ON TABLE tenant TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD tier ON TABLE tenant TYPE string \
    ASSERT $value IN ['starter', 'professional', 'enterprise'];
DEFINE FIELD feature_flags ON TABLE tenant TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD status ON TABLE tenant TYPE string \
    ASSERT $value IN ['active', 'suspended'];
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
-- Uniqueness of primary_domain holds over *active* tenants only, so it
-- is enforced in the repository; the index keeps domain resolution fast.
DEFINE INDEX idx_tenant_domain ON TABLE tenant COLUMNS primary_domain;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD password_version ON TABLE user TYPE int DEFAULT 1;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['super_admin', 'tenant_admin', 'agent_manager', \
    'analyst', 'operator', 'viewer', 'api_user'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['active', 'suspended'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE session TYPE string;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD password_version ON TABLE session TYPE int;
DEFINE FIELD issued_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD revoked ON TABLE session TYPE bool DEFAULT false;
DEFINE INDEX idx_session_token ON TABLE session \
    COLUMNS token_hash UNIQUE;

-- =======================================================================
-- Tasks (tenant scope)
-- =======================================================================
DEFINE TABLE task SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE task TYPE string;
DEFINE FIELD agent_kind ON TABLE task TYPE string \
    ASSERT $value IN ['sales', 'marketing', 'content', 'analytics', \
    'operations'];
DEFINE FIELD submitted_by ON TABLE task TYPE string;
DEFINE FIELD payload ON TABLE task TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD priority ON TABLE task TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE task TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD deadline ON TABLE task TYPE option<datetime>;
DEFINE FIELD state ON TABLE task TYPE string \
    ASSERT $value IN ['queued', 'running', 'succeeded', 'failed', \
    'cancelled'];
DEFINE FIELD attempt_count ON TABLE task TYPE int DEFAULT 0;
DEFINE FIELD parent_id ON TABLE task TYPE option<string>;
DEFINE FIELD result ON TABLE task TYPE option<object> FLEXIBLE;
DEFINE FIELD error ON TABLE task TYPE option<object> FLEXIBLE;
DEFINE INDEX idx_task_dispatch ON TABLE task \
    COLUMNS tenant_id, agent_kind, state, created_at;

-- =======================================================================
-- Collaborations (tenant scope)
-- =======================================================================
DEFINE TABLE collaboration SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE collaboration TYPE string;
DEFINE FIELD orchestrator ON TABLE collaboration TYPE string;
DEFINE FIELD participants ON TABLE collaboration TYPE array<string>;
DEFINE FIELD goal ON TABLE collaboration TYPE string;
DEFINE FIELD task_flow ON TABLE collaboration TYPE array<object> \
    FLEXIBLE DEFAULT [];
DEFINE FIELD status ON TABLE collaboration TYPE string \
    ASSERT $value IN ['pending', 'in_progress', 'succeeded', \
    'partial', 'failed'];
DEFINE FIELD created_at ON TABLE collaboration TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE collaboration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_collab_tenant ON TABLE collaboration COLUMNS tenant_id;

-- =======================================================================
-- Audit events (append-only, tenant scope)
-- =======================================================================
DEFINE TABLE audit_event SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE audit_event TYPE string;
DEFINE FIELD actor ON TABLE audit_event TYPE string;
DEFINE FIELD actor_type ON TABLE audit_event TYPE string \
    ASSERT $value IN ['user', 'system'];
DEFINE FIELD action ON TABLE audit_event TYPE string;
DEFINE FIELD subject ON TABLE audit_event TYPE string;
DEFINE FIELD outcome ON TABLE audit_event TYPE string \
    ASSERT $value IN ['success', 'failure', 'denied'];
DEFINE FIELD detail ON TABLE audit_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_tenant_time ON TABLE audit_event \
    COLUMNS tenant_id, timestamp;

-- =======================================================================
-- Metric samples (append-only, tenant scope)
-- =======================================================================
DEFINE TABLE metric_sample SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE metric_sample TYPE string;
DEFINE FIELD agent_kind ON TABLE metric_sample TYPE option<string>;
DEFINE FIELD name ON TABLE metric_sample TYPE string;
DEFINE FIELD value ON TABLE metric_sample TYPE float;
DEFINE FIELD labels ON TABLE metric_sample TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE metric_sample TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_metric_tenant_name_time ON TABLE metric_sample \
    COLUMNS tenant_id, name, timestamp;
";

// -----------------------------------------------------------------------
// Migration runner
// -----------------------------------------------------------------------

/// Apply all pending migrations in version order.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("migration table DDL: {e}")))?;

    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version")
        .await?;
    let applied: Vec<MigrationRecord> = result.take(0)?;
    let latest = applied.iter().map(|m| m.version).max().unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > latest) {
        info!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );

        db.query(migration.sql)
            .await?
            .check()
            .map_err(|e| DbError::Migration(format!("{}: {e}", migration.name)))?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name.to_string()))
            .await?
            .check()
            .map_err(|e| DbError::Migration(format!("recording {}: {e}", migration.name)))?;
    }

    Ok(())
}
