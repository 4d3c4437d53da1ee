//! SurrealDB implementation of [`SessionRepository`].

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::session::{CreateSession, Session};
use cortex_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRow {
    tenant_id: String,
    user_id: String,
    token_hash: String,
    password_version: u32,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    tenant_id: String,
    user_id: String,
    token_hash: String,
    password_version: u32,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

fn row_to_session(
    id: Uuid,
    tenant_id: &str,
    user_id: &str,
    token_hash: String,
    password_version: u32,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
) -> Result<Session, DbError> {
    let tenant_id = Uuid::parse_str(tenant_id)
        .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
    let user_id =
        Uuid::parse_str(user_id).map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
    Ok(Session {
        id,
        tenant_id,
        user_id,
        token_hash,
        password_version,
        issued_at,
        expires_at,
        revoked,
    })
}

impl SessionRow {
    fn into_session(self, id: Uuid) -> Result<Session, DbError> {
        row_to_session(
            id,
            &self.tenant_id,
            &self.user_id,
            self.token_hash,
            self.password_version,
            self.issued_at,
            self.expires_at,
            self.revoked,
        )
    }
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        row_to_session(
            id,
            &self.tenant_id,
            &self.user_id,
            self.token_hash,
            self.password_version,
            self.issued_at,
            self.expires_at,
            self.revoked,
        )
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> CoreResult<Session> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 tenant_id = $tenant_id, \
                 user_id = $user_id, \
                 token_hash = $token_hash, \
                 password_version = $password_version, \
                 expires_at = $expires_at, \
                 revoked = false",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("password_version", input.password_version))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(id)?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> CoreResult<Session> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: "token".into(),
        })?;

        Ok(row.try_into_session()?)
    }

    async fn revoke(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<()> {
        self.db
            .query(
                "UPDATE type::record('session', $id) SET revoked = true \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn revoke_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        self.db
            .query(
                "UPDATE session SET revoked = true \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> CoreResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE expires_at < time::now() GROUP ALL",
            )
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE session WHERE expires_at < time::now()")
            .await
            .map_err(DbError::from)?;

        Ok(total)
    }
}
