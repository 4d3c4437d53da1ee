//! Access control service — user provisioning, authentication,
//! session validation, and revocation.
//!
//! Every privileged mutation appends an audit event before the call
//! returns success. Generic over repository implementations so the
//! auth layer has no dependency on the database crate.

use chrono::{Duration, Utc};
use cortex_core::error::{CoreError, CoreResult};
use cortex_core::models::audit::{ActorType, AuditOutcome, CreateAuditEvent};
use cortex_core::models::role::{Permission, Role};
use cortex_core::models::session::{CreateSession, Session};
use cortex_core::models::user::{CreateUser, User, UserStatus};
use cortex_core::repository::{AuditLogRepository, SessionRepository, UserRepository};
use tracing::warn;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::rate_limit::FailureThrottle;
use crate::{password, token};

/// A successful login: the persisted session plus the raw token. The
/// raw token is returned exactly once and never stored.
#[derive(Debug)]
pub struct IssuedSession {
    pub session: Session,
    pub token: String,
}

/// Verified request context produced by [`AccessControlService::validate`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session_id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

/// Subject-specific qualifier for permission checks.
#[derive(Debug, Clone, Copy)]
pub enum Subject {
    /// No subject-level constraint.
    None,
    /// The subject is owned by this user (e.g. a task's submitter).
    Owner(Uuid),
}

pub struct AccessControlService<U, S, A> {
    user_repo: U,
    session_repo: S,
    audit_repo: A,
    throttle: FailureThrottle,
    config: AuthConfig,
}

impl<U, S, A> AccessControlService<U, S, A>
where
    U: UserRepository,
    S: SessionRepository,
    A: AuditLogRepository,
{
    pub fn new(user_repo: U, session_repo: S, audit_repo: A, config: AuthConfig) -> Self {
        let throttle =
            FailureThrottle::new(config.max_failed_attempts, config.failure_window_secs);
        Self {
            user_repo,
            session_repo,
            audit_repo,
            throttle,
            config,
        }
    }

    /// Create a user after enforcing the password policy.
    pub async fn create_user(&self, actor: Uuid, input: CreateUser) -> CoreResult<User> {
        password::check_policy(&input.password, self.config.min_password_length)?;

        let tenant_id = input.tenant_id;
        let email = input.email.clone();
        let role = input.role;
        let user = self.user_repo.create(input).await?;

        self.audit_repo
            .append(CreateAuditEvent {
                tenant_id,
                actor,
                actor_type: ActorType::User,
                action: "user.create".into(),
                subject: format!("user:{}", user.id),
                outcome: AuditOutcome::Success,
                detail: serde_json::json!({ "email": email, "role": role.as_str() }),
            })
            .await?;

        Ok(user)
    }

    /// Authenticate with email + password and issue a session.
    ///
    /// Failures increment a per-identifier counter; exhausting it
    /// yields a throttled error before any credential work happens.
    pub async fn authenticate(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> CoreResult<IssuedSession> {
        let identifier = format!("{tenant_id}:{email}");
        if self.throttle.is_throttled(&identifier) {
            return Err(AuthError::Throttled.into());
        }

        let user = match self.user_repo.get_by_email(tenant_id, email).await {
            Ok(user) => user,
            Err(CoreError::NotFound { .. }) => {
                self.throttle.record_failure(&identifier);
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            self.throttle.record_failure(&identifier);
            self.audit_login(tenant_id, user.id, AuditOutcome::Failure)
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        if user.status != UserStatus::Active {
            return Err(AuthError::AccountSuspended.into());
        }

        self.throttle.reset(&identifier);

        let raw_token = token::generate_session_token();
        let session = self
            .session_repo
            .create(CreateSession {
                tenant_id,
                user_id: user.id,
                token_hash: token::hash_session_token(&raw_token),
                password_version: user.password_version,
                expires_at: Utc::now() + Duration::seconds(self.config.session_ttl_secs as i64),
            })
            .await?;

        self.audit_repo
            .append(CreateAuditEvent {
                tenant_id,
                actor: user.id,
                actor_type: ActorType::User,
                action: "auth.login".into(),
                subject: format!("session:{}", session.id),
                outcome: AuditOutcome::Success,
                detail: serde_json::json!({}),
            })
            .await?;

        Ok(IssuedSession {
            session,
            token: raw_token,
        })
    }

    /// Validate a bearer token against a permission and subject.
    ///
    /// The session must be live (not expired, not revoked, issued
    /// under the user's current password version), belong to
    /// `tenant_id`, and the user's role must carry the permission. A
    /// failed permission check is recorded as a denied audit event.
    pub async fn validate(
        &self,
        raw_token: &str,
        tenant_id: Uuid,
        permission: Permission,
        subject: Subject,
    ) -> CoreResult<AuthContext> {
        let ctx = self.resolve_session(raw_token, tenant_id).await?;

        if !permitted(ctx.role, permission, subject, ctx.user_id) {
            self.record_denied(&ctx, permission).await;
            return Err(CoreError::Forbidden {
                permission: permission.as_str().into(),
            });
        }

        Ok(ctx)
    }

    /// Resolve a bearer token into its context without a permission
    /// check. Used for endpoints any authenticated user may call.
    pub async fn resolve_session(
        &self,
        raw_token: &str,
        tenant_id: Uuid,
    ) -> CoreResult<AuthContext> {
        let hash = token::hash_session_token(raw_token);
        let session = match self.session_repo.get_by_token_hash(&hash).await {
            Ok(session) => session,
            Err(CoreError::NotFound { .. }) => return Err(CoreError::Unauthorized),
            Err(e) => return Err(e),
        };

        if session.tenant_id != tenant_id {
            return Err(CoreError::Unauthorized);
        }
        if session.revoked {
            return Err(AuthError::SessionRevoked.into());
        }
        if session.expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired.into());
        }

        let user = self
            .user_repo
            .get_by_id(session.tenant_id, session.user_id)
            .await?;
        if user.status != UserStatus::Active {
            return Err(AuthError::AccountSuspended.into());
        }
        if user.password_version != session.password_version {
            return Err(AuthError::SessionSuperseded.into());
        }

        Ok(AuthContext {
            session_id: session.id,
            tenant_id: session.tenant_id,
            user_id: user.id,
            role: user.role,
        })
    }

    /// Revoke a session. Subsequent validations fail closed.
    pub async fn revoke(&self, raw_token: &str) -> CoreResult<()> {
        let hash = token::hash_session_token(raw_token);
        let session = match self.session_repo.get_by_token_hash(&hash).await {
            Ok(session) => session,
            Err(CoreError::NotFound { .. }) => return Err(CoreError::Unauthorized),
            Err(e) => return Err(e),
        };

        self.session_repo
            .revoke(session.tenant_id, session.id)
            .await?;

        self.audit_repo
            .append(CreateAuditEvent {
                tenant_id: session.tenant_id,
                actor: session.user_id,
                actor_type: ActorType::User,
                action: "auth.logout".into(),
                subject: format!("session:{}", session.id),
                outcome: AuditOutcome::Success,
                detail: serde_json::json!({}),
            })
            .await?;

        Ok(())
    }

    /// Rotate a user's password: policy check, version bump, and
    /// revocation of every session issued under the old version.
    pub async fn change_password(
        &self,
        actor: Uuid,
        tenant_id: Uuid,
        user_id: Uuid,
        new_password: &str,
    ) -> CoreResult<User> {
        password::check_policy(new_password, self.config.min_password_length)?;

        let user = self
            .user_repo
            .rotate_password(tenant_id, user_id, new_password)
            .await?;
        self.session_repo
            .revoke_for_user(tenant_id, user_id)
            .await?;

        self.audit_repo
            .append(CreateAuditEvent {
                tenant_id,
                actor,
                actor_type: ActorType::User,
                action: "user.password_rotate".into(),
                subject: format!("user:{user_id}"),
                outcome: AuditOutcome::Success,
                detail: serde_json::json!({ "password_version": user.password_version }),
            })
            .await?;

        Ok(user)
    }

    async fn record_denied(&self, ctx: &AuthContext, permission: Permission) {
        let result = self
            .audit_repo
            .append(CreateAuditEvent {
                tenant_id: ctx.tenant_id,
                actor: ctx.user_id,
                actor_type: ActorType::User,
                action: "auth.denied".into(),
                subject: format!("permission:{}", permission.as_str()),
                outcome: AuditOutcome::Denied,
                detail: serde_json::json!({ "role": ctx.role.as_str() }),
            })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to record denied audit event");
        }
    }

    async fn audit_login(&self, tenant_id: Uuid, user_id: Uuid, outcome: AuditOutcome) {
        let result = self
            .audit_repo
            .append(CreateAuditEvent {
                tenant_id,
                actor: user_id,
                actor_type: ActorType::User,
                action: "auth.login".into(),
                subject: format!("user:{user_id}"),
                outcome,
                detail: serde_json::json!({}),
            })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to record login audit event");
        }
    }
}

/// Permission check with subject-level qualification.
///
/// `task.view.own` is satisfied either by `task.view.any` or by
/// ownership of the subject. Every other permission is a plain role
/// lookup.
fn permitted(role: Role, permission: Permission, subject: Subject, user_id: Uuid) -> bool {
    match permission {
        Permission::TaskViewOwn => {
            if role.has(Permission::TaskViewAny) {
                return true;
            }
            role.has(Permission::TaskViewOwn)
                && matches!(subject, Subject::Owner(owner) if owner == user_id)
        }
        other => role.has(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_any_overrides_ownership() {
        let user = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        assert!(permitted(
            Role::Analyst,
            Permission::TaskViewOwn,
            Subject::Owner(stranger),
            user
        ));
    }

    #[test]
    fn view_own_requires_matching_owner() {
        let user = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        assert!(permitted(
            Role::Viewer,
            Permission::TaskViewOwn,
            Subject::Owner(user),
            user
        ));
        assert!(!permitted(
            Role::Viewer,
            Permission::TaskViewOwn,
            Subject::Owner(stranger),
            user
        ));
        assert!(!permitted(
            Role::Viewer,
            Permission::TaskViewOwn,
            Subject::None,
            user
        ));
    }

    #[test]
    fn plain_permission_is_role_lookup() {
        let user = Uuid::new_v4();
        assert!(!permitted(
            Role::Viewer,
            Permission::AgentSubmit,
            Subject::None,
            user
        ));
        assert!(permitted(
            Role::Operator,
            Permission::AgentSubmit,
            Subject::None,
            user
        ));
    }
}
