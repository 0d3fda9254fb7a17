//! Integration tests for the admin session manager.

use std::time::Instant;

use argon2::PasswordHash;
use chrono::{DateTime, Duration, Utc};
use storegate_auth::audit::ActivityRecorder;
use storegate_auth::config::AuthConfig;
use storegate_auth::error::AuthError;
use storegate_auth::password::DECOY_HASH;
use storegate_auth::service::{LoginInput, RefreshInput, SessionManager};
use storegate_core::error::{GateError, GateResult};
use storegate_core::models::activity::ACTION_ADMIN_LOGIN;
use storegate_core::models::admin::{AdminRole, CreateAdminPrincipal};
use storegate_core::models::session::{AdminSession, CreateAdminSession, ValidatedSession};
use storegate_core::repository::{
    ActivityLogFilter, ActivityLogRepository, AdminPrincipalRepository, AdminSessionRepository,
    Pagination,
};
use storegate_db::repository::{
    SurrealActivityLogRepository, SurrealAdminPrincipalRepository, SurrealAdminSessionRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

const EMAIL: &str = "ops@shop.example";
const PASSWORD: &str = "correct-horse-battery";

type Manager = SessionManager<SurrealAdminPrincipalRepository<Db>, SurrealAdminSessionRepository<Db>>;

/// Spin up in-memory DB, run migrations, provision one admin.
async fn setup() -> (Manager, ActivityRecorder, Uuid, Surreal<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    storegate_db::run_migrations(&db).await.unwrap();

    let recorder = ActivityRecorder::spawn(SurrealActivityLogRepository::new(db.clone()), 64);
    let manager = SessionManager::new(
        SurrealAdminPrincipalRepository::new(db.clone()),
        SurrealAdminSessionRepository::new(db.clone()),
        recorder.clone(),
        AuthConfig::default(),
    );

    let admin = manager
        .provision_admin(CreateAdminPrincipal {
            email: EMAIL.into(),
            password: PASSWORD.into(),
            role: AdminRole::Admin,
        })
        .await
        .unwrap();

    (manager, recorder, admin.id, db)
}

fn login_input(password: &str, remember_me: bool) -> LoginInput {
    LoginInput {
        email: EMAIL.into(),
        password: password.into(),
        remember_me,
        ip_address: Some("203.0.113.7".into()),
        user_agent: Some("integration-test".into()),
    }
}

#[tokio::test]
async fn login_happy_path() {
    let (manager, _, admin_id, _) = setup().await;

    let before = Utc::now();
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();

    assert_eq!(out.principal.id, admin_id);
    assert_eq!(out.principal.email, EMAIL);
    assert_eq!(out.principal.role, AdminRole::Admin);
    assert!(out.principal.last_login_at.is_some());
    assert_ne!(out.session_token, out.refresh_token);

    let lifetime = out.expires_at - before;
    assert!(lifetime > Duration::hours(23) && lifetime <= Duration::hours(24) + Duration::seconds(5));

    let validated = manager.validate(&out.session_token).await.unwrap();
    assert_eq!(validated.session_id, out.session_id);
    assert_eq!(validated.principal.id, admin_id);
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let (manager, _, _, _) = setup().await;

    let mut input = login_input(PASSWORD, false);
    input.email = "  OPS@Shop.Example ".into();
    assert!(manager.login(input).await.is_ok());
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let (manager, _, _, _) = setup().await;

    let mut unknown = login_input(PASSWORD, false);
    unknown.email = "nobody@shop.example".into();
    let unknown_err = manager.login(unknown).await.unwrap_err();
    let wrong_err = manager
        .login(login_input("wrong-password", false))
        .await
        .unwrap_err();

    assert!(matches!(unknown_err, AuthError::InvalidCredentials));
    assert!(matches!(wrong_err, AuthError::InvalidCredentials));
    assert_eq!(unknown_err.to_string(), wrong_err.to_string());
}

#[tokio::test]
async fn unknown_email_costs_as_much_as_a_wrong_password() {
    let (manager, _, _, _) = setup().await;
    let _ = manager.login(login_input("warm-up-password", false)).await;

    let started = Instant::now();
    let err = manager
        .login(login_input("wrong-password", false))
        .await
        .unwrap_err();
    let known = started.elapsed();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let mut unknown = login_input("wrong-password", false);
    unknown.email = "nobody@shop.example".into();
    let started = Instant::now();
    let err = manager.login(unknown).await.unwrap_err();
    let unknown = started.elapsed();
    assert!(matches!(err, AuthError::InvalidCredentials));

    // Without an Argon2 pass the unknown path is orders of magnitude faster.
    assert!(
        unknown * 4 >= known,
        "unknown email took {unknown:?}, wrong password took {known:?}"
    );
}

#[test]
fn decoy_hash_matches_credential_store_parameters() {
    let stored = storegate_db::hash_password("correct-horse-battery", None).unwrap();
    let stored = PasswordHash::new(&stored).unwrap();
    let decoy = PasswordHash::new(DECOY_HASH).unwrap();

    assert_eq!(decoy.algorithm, stored.algorithm);
    assert_eq!(decoy.version, stored.version);
    assert_eq!(decoy.params.to_string(), stored.params.to_string());
}

#[tokio::test]
async fn five_failures_lock_the_account() {
    let (manager, _, admin_id, db) = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db);

    for attempt in 1..=4u32 {
        let err = manager
            .login(login_input("wrong-password", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let p = principals.get_by_id(admin_id).await.unwrap();
        assert_eq!(p.failed_attempts, attempt);
        assert!(p.locked_until.is_none());
    }

    // Fifth failure trips the lock.
    let err = manager
        .login(login_input("wrong-password", false))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    let p = principals.get_by_id(admin_id).await.unwrap();
    assert_eq!(p.failed_attempts, 5);
    let locked_until = p.locked_until.expect("lock must be set");
    assert!(locked_until > Utc::now() + Duration::minutes(14));

    // The correct password no longer helps.
    let err = manager.login(login_input(PASSWORD, false)).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked));

    // Attempts while locked are rejected before the password check and
    // leave the lock untouched.
    let p = principals.get_by_id(admin_id).await.unwrap();
    assert_eq!(p.failed_attempts, 5);
    assert_eq!(p.locked_until, Some(locked_until));
}

#[tokio::test]
async fn success_resets_failure_counter() {
    let (manager, _, admin_id, db) = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db);

    for _ in 0..3 {
        let _ = manager.login(login_input("wrong-password", false)).await;
    }
    manager.login(login_input(PASSWORD, false)).await.unwrap();

    let p = principals.get_by_id(admin_id).await.unwrap();
    assert_eq!(p.failed_attempts, 0);
    assert!(p.locked_until.is_none());
}

#[tokio::test]
async fn inactive_principal_cannot_login() {
    let (manager, _, admin_id, _) = setup().await;

    manager.deactivate_principal(admin_id).await.unwrap();

    let err = manager.login(login_input(PASSWORD, false)).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn expiry_boundary() {
    let (manager, _, _, _) = setup().await;
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();

    let just_before = out.expires_at - Duration::seconds(1);
    let just_after = out.expires_at + Duration::seconds(1);

    assert!(manager.validate_at(&out.session_token, just_before).await.is_ok());
    assert!(matches!(
        manager.validate_at(&out.session_token, out.expires_at).await,
        Err(AuthError::InvalidOrExpiredSession)
    ));
    assert!(matches!(
        manager.validate_at(&out.session_token, just_after).await,
        Err(AuthError::InvalidOrExpiredSession)
    ));
}

#[tokio::test]
async fn remember_me_lifetimes_and_independent_logout() {
    let (manager, _, _, _) = setup().await;

    let before = Utc::now();
    let short = manager.login(login_input(PASSWORD, false)).await.unwrap();
    let long = manager.login(login_input(PASSWORD, true)).await.unwrap();

    assert!(short.expires_at <= before + Duration::hours(24) + Duration::seconds(5));
    assert!(long.expires_at > before + Duration::days(29));
    assert!(long.expires_at <= before + Duration::days(30) + Duration::seconds(5));
    assert!(manager.validate(&long.session_token).await.unwrap().is_remember_me);

    // 25 hours later only the remember-me session survives.
    let later = before + Duration::hours(25);
    assert!(manager.validate_at(&short.session_token, later).await.is_err());
    assert!(manager.validate_at(&long.session_token, later).await.is_ok());

    manager.logout(&short.session_token, None, None).await.unwrap();
    assert!(manager.validate(&short.session_token).await.is_err());
    assert!(manager.validate(&long.session_token).await.is_ok());
}

#[tokio::test]
async fn logout_is_final_and_idempotent() {
    let (manager, _, _, _) = setup().await;
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();

    manager.logout(&out.session_token, None, None).await.unwrap();
    manager.logout(&out.session_token, None, None).await.unwrap();
    manager.logout("never-issued", None, None).await.unwrap();
    manager.logout("", None, None).await.unwrap();

    assert!(matches!(
        manager.validate(&out.session_token).await,
        Err(AuthError::InvalidOrExpiredSession)
    ));
}

#[tokio::test]
async fn forged_or_empty_tokens_are_rejected() {
    let (manager, _, _, _) = setup().await;
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();

    assert!(manager.validate("").await.is_err());
    assert!(manager.validate("not-a-token").await.is_err());
    // The refresh token is not a session token.
    assert!(manager.validate(&out.refresh_token).await.is_err());
}

#[tokio::test]
async fn deactivating_principal_invalidates_sessions() {
    let (manager, _, admin_id, _) = setup().await;
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();

    let view = manager.deactivate_principal(admin_id).await.unwrap();
    assert_eq!(view.id, admin_id);
    assert!(manager.validate(&out.session_token).await.is_err());
}

#[tokio::test]
async fn revoke_all_sessions() {
    let (manager, _, admin_id, _) = setup().await;
    let a = manager.login(login_input(PASSWORD, false)).await.unwrap();
    let b = manager.login(login_input(PASSWORD, true)).await.unwrap();

    let revoked = manager.revoke_all_for_principal(admin_id).await.unwrap();
    assert_eq!(revoked, 2);
    assert!(manager.validate(&a.session_token).await.is_err());
    assert!(manager.validate(&b.session_token).await.is_err());

    assert_eq!(manager.revoke_all_for_principal(admin_id).await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_rotates_and_is_single_use() {
    let (manager, _, admin_id, _) = setup().await;
    let first = manager.login(login_input(PASSWORD, true)).await.unwrap();

    let second = manager
        .refresh(RefreshInput {
            refresh_token: first.refresh_token.clone(),
            ip_address: None,
            user_agent: None,
        })
        .await
        .unwrap();

    assert_eq!(second.principal.id, admin_id);
    assert_ne!(second.session_id, first.session_id);
    assert!(manager.validate(&first.session_token).await.is_err());
    assert!(manager.validate(&second.session_token).await.unwrap().is_remember_me);

    let replay = manager
        .refresh(RefreshInput {
            refresh_token: first.refresh_token,
            ip_address: None,
            user_agent: None,
        })
        .await;
    assert!(matches!(replay, Err(AuthError::InvalidOrExpiredSession)));
}

#[tokio::test]
async fn refresh_fails_after_logout() {
    let (manager, _, _, _) = setup().await;
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();

    manager.logout(&out.session_token, None, None).await.unwrap();

    let result = manager
        .refresh(RefreshInput {
            refresh_token: out.refresh_token,
            ip_address: None,
            user_agent: None,
        })
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpiredSession)));
}

#[tokio::test]
async fn sweep_deactivates_only_expired_sessions() {
    let (manager, _, admin_id, db) = setup().await;
    let live = manager.login(login_input(PASSWORD, false)).await.unwrap();

    // Push one session into the past directly.
    let stale = manager.login(login_input(PASSWORD, false)).await.unwrap();
    db.query("UPDATE type::record('admin_session', $id) SET expires_at = $past")
        .bind(("id", stale.session_id.to_string()))
        .bind(("past", Utc::now() - Duration::minutes(1)))
        .await
        .unwrap()
        .check()
        .unwrap();

    assert_eq!(manager.count_active_sessions().await.unwrap(), 1);
    assert_eq!(manager.sweep_expired().await.unwrap(), 1);
    assert_eq!(manager.sweep_expired().await.unwrap(), 0);

    assert!(manager.validate(&live.session_token).await.is_ok());
    // Sweeping never touches the principal.
    assert_eq!(manager.revoke_all_for_principal(admin_id).await.unwrap(), 1);
}

#[tokio::test]
async fn provisioning_rejects_duplicates_and_weak_passwords() {
    let (manager, _, _, _) = setup().await;

    let dup = manager
        .provision_admin(CreateAdminPrincipal {
            email: "OPS@shop.example".into(),
            password: "another-long-password".into(),
            role: AdminRole::Viewer,
        })
        .await;
    assert!(matches!(dup, Err(AuthError::Conflict(_))));

    let weak = manager
        .provision_admin(CreateAdminPrincipal {
            email: "new@shop.example".into(),
            password: "short".into(),
            role: AdminRole::Viewer,
        })
        .await;
    assert!(matches!(weak, Err(AuthError::Validation(_))));
}

#[tokio::test]
async fn login_is_recorded_in_activity_log() {
    let (manager, recorder, admin_id, db) = setup().await;
    let out = manager.login(login_input(PASSWORD, false)).await.unwrap();
    recorder.flush().await;

    let log = SurrealActivityLogRepository::new(db);
    let page = log
        .list(
            ActivityLogFilter {
                action: Some(ACTION_ADMIN_LOGIN.into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    let entry = &page.items[0];
    assert_eq!(entry.principal_id, Some(admin_id));
    assert_eq!(entry.resource_id.as_deref(), Some(out.session_id.to_string().as_str()));
    assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(recorder.stats().failed, 0);
}

/// Session store whose datastore is always down.
struct UnavailableSessions;

fn unavailable<T>() -> GateResult<T> {
    Err(GateError::Transient("connection refused".into()))
}

impl AdminSessionRepository for UnavailableSessions {
    async fn create(&self, _input: CreateAdminSession) -> GateResult<AdminSession> {
        unavailable()
    }

    async fn get_by_id(&self, _id: Uuid) -> GateResult<AdminSession> {
        unavailable()
    }

    async fn validate(&self, _token_hash: &str, _now: DateTime<Utc>) -> GateResult<ValidatedSession> {
        unavailable()
    }

    async fn deactivate_by_token(&self, _token_hash: &str) -> GateResult<()> {
        unavailable()
    }

    async fn deactivate_for_principal(&self, _principal_id: Uuid) -> GateResult<u64> {
        unavailable()
    }

    async fn consume_refresh(
        &self,
        _refresh_token_hash: &str,
        _now: DateTime<Utc>,
    ) -> GateResult<AdminSession> {
        unavailable()
    }

    async fn deactivate_expired(&self, _now: DateTime<Utc>) -> GateResult<u64> {
        unavailable()
    }

    async fn count_active(&self, _now: DateTime<Utc>) -> GateResult<u64> {
        unavailable()
    }
}

#[tokio::test]
async fn failed_session_creation_leaves_login_state_untouched() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    storegate_db::run_migrations(&db).await.unwrap();

    let recorder = ActivityRecorder::spawn(SurrealActivityLogRepository::new(db.clone()), 64);
    let manager = SessionManager::new(
        SurrealAdminPrincipalRepository::new(db.clone()),
        UnavailableSessions,
        recorder,
        AuthConfig::default(),
    );
    let admin = manager
        .provision_admin(CreateAdminPrincipal {
            email: EMAIL.into(),
            password: PASSWORD.into(),
            role: AdminRole::Admin,
        })
        .await
        .unwrap();

    for _ in 0..2 {
        let _ = manager.login(login_input("wrong-password", false)).await;
    }

    let err = manager.login(login_input(PASSWORD, false)).await.unwrap_err();
    assert!(matches!(err, AuthError::Datastore(GateError::Transient(_))));

    let p = SurrealAdminPrincipalRepository::new(db)
        .get_by_id(admin.id)
        .await
        .unwrap();
    assert_eq!(p.failed_attempts, 2);
    assert!(p.last_login_at.is_none());
}
