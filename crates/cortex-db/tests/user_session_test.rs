//! Integration tests for the User and Session repositories.

use chrono::{Duration, Utc};
use cortex_core::error::CoreError;
use cortex_core::models::role::Role;
use cortex_core::models::session::CreateSession;
use cortex_core::models::tenant::{CreateTenant, SubscriptionTier};
use cortex_core::models::user::CreateUser;
use cortex_core::repository::{SessionRepository, TenantRepository, UserRepository};
use cortex_db::{
    SurrealSessionRepository, SurrealTenantRepository, SurrealUserRepository, verify_password,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> (Surreal<surrealdb::engine::local::Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cortex_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let tenant = tenants
        .create(CreateTenant {
            display_name: "Test Tenant".into(),
            primary_domain: "test.example".into(),
            tier: SubscriptionTier::Starter,
            branding: None,
            feature_flags: None,
        })
        .await
        .unwrap();

    (db, tenant.id)
}

fn alice(tenant_id: Uuid) -> CreateUser {
    CreateUser {
        tenant_id,
        email: "alice@example.com".into(),
        password: "SuperSecret123!".into(),
        role: Role::Operator,
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo.create(alice(tenant_id)).await.unwrap();
    assert_eq!(user.tenant_id, tenant_id);
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.role, Role::Operator);
    assert_eq!(user.password_version, 1);

    // Password should be hashed, not stored in plaintext.
    assert_ne!(user.password_hash, "SuperSecret123!");
    assert!(user.password_hash.starts_with("$argon2id$"));

    let fetched = repo.get_by_email(tenant_id, "alice@example.com").await.unwrap();
    assert_eq!(fetched.id, user.id);
}

#[tokio::test]
async fn email_is_unique_per_tenant() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    repo.create(alice(tenant_id)).await.unwrap();
    let err = repo.create(alice(tenant_id)).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));

    // The same address in another tenant is fine.
    repo.create(alice(Uuid::new_v4())).await.unwrap();
}

#[tokio::test]
async fn password_verification() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);
    let user = repo.create(alice(tenant_id)).await.unwrap();

    assert!(verify_password("SuperSecret123!", &user.password_hash, None).unwrap());
    assert!(!verify_password("WrongPassword", &user.password_hash, None).unwrap());
}

#[tokio::test]
async fn password_with_pepper() {
    let (db, tenant_id) = setup().await;
    let pepper = "server-secret-pepper".to_string();
    let repo = SurrealUserRepository::with_pepper(db, pepper.clone());

    let user = repo.create(alice(tenant_id)).await.unwrap();
    assert!(verify_password("SuperSecret123!", &user.password_hash, Some(&pepper)).unwrap());
    assert!(!verify_password("SuperSecret123!", &user.password_hash, None).unwrap());
}

#[tokio::test]
async fn rotation_bumps_password_version() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);
    let user = repo.create(alice(tenant_id)).await.unwrap();

    let rotated = repo
        .rotate_password(tenant_id, user.id, "NewSecret456!!")
        .await
        .unwrap();
    assert_eq!(rotated.password_version, 2);
    assert!(verify_password("NewSecret456!!", &rotated.password_hash, None).unwrap());
    assert!(!verify_password("SuperSecret123!", &rotated.password_hash, None).unwrap());
}

#[tokio::test]
async fn session_lifecycle() {
    let (db, tenant_id) = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let sessions = SurrealSessionRepository::new(db);
    let user = users.create(alice(tenant_id)).await.unwrap();

    let session = sessions
        .create(CreateSession {
            tenant_id,
            user_id: user.id,
            token_hash: "hash-1".into(),
            password_version: user.password_version,
            expires_at: Utc::now() + Duration::hours(2),
        })
        .await
        .unwrap();
    assert!(!session.revoked);

    let fetched = sessions.get_by_token_hash("hash-1").await.unwrap();
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.user_id, user.id);

    sessions.revoke(tenant_id, session.id).await.unwrap();
    let revoked = sessions.get_by_token_hash("hash-1").await.unwrap();
    assert!(revoked.revoked);
}

#[tokio::test]
async fn revoke_for_user_sweeps_all_sessions() {
    let (db, tenant_id) = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let sessions = SurrealSessionRepository::new(db);
    let user = users.create(alice(tenant_id)).await.unwrap();

    for i in 0..3 {
        sessions
            .create(CreateSession {
                tenant_id,
                user_id: user.id,
                token_hash: format!("hash-{i}"),
                password_version: 1,
                expires_at: Utc::now() + Duration::hours(2),
            })
            .await
            .unwrap();
    }

    sessions.revoke_for_user(tenant_id, user.id).await.unwrap();
    for i in 0..3 {
        let session = sessions
            .get_by_token_hash(&format!("hash-{i}"))
            .await
            .unwrap();
        assert!(session.revoked);
    }
}

#[tokio::test]
async fn cleanup_removes_expired_sessions() {
    let (db, tenant_id) = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let sessions = SurrealSessionRepository::new(db);
    let user = users.create(alice(tenant_id)).await.unwrap();

    sessions
        .create(CreateSession {
            tenant_id,
            user_id: user.id,
            token_hash: "stale".into(),
            password_version: 1,
            expires_at: Utc::now() - Duration::hours(1),
        })
        .await
        .unwrap();
    sessions
        .create(CreateSession {
            tenant_id,
            user_id: user.id,
            token_hash: "live".into(),
            password_version: 1,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

    let removed = sessions.cleanup_expired().await.unwrap();
    assert_eq!(removed, 1);
    assert!(sessions.get_by_token_hash("stale").await.is_err());
    assert!(sessions.get_by_token_hash("live").await.is_ok());
}
