//! Integration tests for the SurrealDB repositories.

use chrono::{Duration, Utc};
use storegate_core::error::GateError;
use storegate_core::models::activity::CreateActivityLogEntry;
use storegate_core::models::admin::{AdminRole, CreateAdminPrincipal};
use storegate_core::models::local_user::{CreateLocalUser, InsertOutcome};
use storegate_core::models::session::CreateAdminSession;
use storegate_core::models::sync_log::{CreateSyncLogEntry, SyncConclusion, SyncStatus};
use storegate_core::repository::{
    ActivityLogFilter, ActivityLogRepository, AdminPrincipalRepository, AdminSessionRepository,
    LocalUserRepository, Pagination, RecordStore, SyncLogRepository, TableName,
};
use storegate_db::repository::{
    SurrealActivityLogRepository, SurrealAdminPrincipalRepository, SurrealAdminSessionRepository,
    SurrealLocalUserRepository, SurrealRecordStore, SurrealSyncLogRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    storegate_db::run_migrations(&db).await.unwrap();
    db
}

fn new_admin(email: &str) -> CreateAdminPrincipal {
    CreateAdminPrincipal {
        email: email.into(),
        password: "correct-horse-battery".into(),
        role: AdminRole::Editor,
    }
}

fn new_session(principal_id: Uuid, tag: &str, expires_in: Duration) -> CreateAdminSession {
    CreateAdminSession {
        principal_id,
        token_hash: format!("token-{tag}"),
        refresh_token_hash: format!("refresh-{tag}"),
        expires_at: Utc::now() + expires_in,
        is_remember_me: false,
        ip_address: None,
        user_agent: None,
    }
}

// ---------------------------------------------------------------------------
// Admin principals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_principal_hashes_password_and_lowercases_email() {
    let repo = SurrealAdminPrincipalRepository::new(setup().await);

    let admin = repo.create(new_admin("Ops@Shop.Example")).await.unwrap();
    assert_eq!(admin.email, "ops@shop.example");
    assert!(admin.password_hash.starts_with("$argon2id$"));
    assert!(admin.is_active);
    assert_eq!(admin.failed_attempts, 0);

    let found = repo.get_active_by_email("OPS@shop.example").await.unwrap();
    assert_eq!(found.id, admin.id);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let repo = SurrealAdminPrincipalRepository::new(setup().await);

    repo.create(new_admin("ops@shop.example")).await.unwrap();
    let err = repo.create(new_admin("OPS@shop.example")).await.unwrap_err();
    assert!(matches!(err, GateError::Conflict { .. }));
}

#[tokio::test]
async fn rejected_principal_updates_surface_as_errors() {
    let db = setup().await;
    let repo = SurrealAdminPrincipalRepository::new(db.clone());
    let admin = repo.create(new_admin("ops@shop.example")).await.unwrap();

    // Tighten the schema so both writes are refused by the datastore.
    db.query(
        "DEFINE FIELD OVERWRITE last_login_at ON TABLE admin_principal \
             TYPE option<datetime> ASSERT $value = NONE; \
         DEFINE FIELD OVERWRITE is_active ON TABLE admin_principal \
             TYPE bool ASSERT $value = true;",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let err = repo
        .record_successful_login(admin.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Transient(_)));

    let err = repo.set_active(admin.id, false).await.unwrap_err();
    assert!(matches!(err, GateError::Transient(_)));

    let unchanged = repo.get_by_id(admin.id).await.unwrap();
    assert!(unchanged.last_login_at.is_none());
    assert!(unchanged.is_active);
}

#[tokio::test]
async fn inactive_principal_is_not_found_by_email() {
    let repo = SurrealAdminPrincipalRepository::new(setup().await);
    let admin = repo.create(new_admin("ops@shop.example")).await.unwrap();

    repo.set_active(admin.id, false).await.unwrap();
    let err = repo.get_active_by_email("ops@shop.example").await.unwrap_err();
    assert!(err.is_not_found());

    // Still addressable by id: deactivation is soft.
    assert!(!repo.get_by_id(admin.id).await.unwrap().is_active);
}

#[tokio::test]
async fn failed_login_counter_locks_at_threshold() {
    let repo = SurrealAdminPrincipalRepository::new(setup().await);
    let admin = repo.create(new_admin("ops@shop.example")).await.unwrap();
    let lock = Utc::now() + Duration::minutes(15);

    for expected in 1..=2u32 {
        let p = repo.record_failed_login(admin.id, 3, lock).await.unwrap();
        assert_eq!(p.failed_attempts, expected);
        assert!(p.locked_until.is_none());
    }

    let p = repo.record_failed_login(admin.id, 3, lock).await.unwrap();
    assert_eq!(p.failed_attempts, 3);
    assert!(p.is_locked_at(Utc::now()));

    // A later failure never shortens an active lock.
    let p = repo
        .record_failed_login(admin.id, 3, Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(p.failed_attempts, 4);
    assert!(p.locked_until.unwrap() > Utc::now() + Duration::minutes(14));

    let p = repo.record_successful_login(admin.id, Utc::now()).await.unwrap();
    assert_eq!(p.failed_attempts, 0);
    assert!(p.locked_until.is_none());
    assert!(p.last_login_at.is_some());
}

// ---------------------------------------------------------------------------
// Admin sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_validation_joins_principal() {
    let db = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db.clone());
    let sessions = SurrealAdminSessionRepository::new(db);
    let admin = principals.create(new_admin("ops@shop.example")).await.unwrap();

    let session = sessions
        .create(new_session(admin.id, "a", Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(session.principal_id, admin.id);
    assert!(session.is_active);

    let validated = sessions.validate("token-a", Utc::now()).await.unwrap();
    assert_eq!(validated.session_id, session.id);
    assert_eq!(validated.principal.email, "ops@shop.example");
    assert_eq!(validated.principal.role, AdminRole::Editor);

    principals.set_active(admin.id, false).await.unwrap();
    let err = sessions.validate("token-a", Utc::now()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn duplicate_token_hash_is_rejected() {
    let db = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db.clone());
    let sessions = SurrealAdminSessionRepository::new(db);
    let admin = principals.create(new_admin("ops@shop.example")).await.unwrap();

    sessions
        .create(new_session(admin.id, "same", Duration::hours(1)))
        .await
        .unwrap();
    assert!(
        sessions
            .create(new_session(admin.id, "same", Duration::hours(1)))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn deactivation_is_terminal_and_counted() {
    let db = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db.clone());
    let sessions = SurrealAdminSessionRepository::new(db);
    let admin = principals.create(new_admin("ops@shop.example")).await.unwrap();

    let a = sessions
        .create(new_session(admin.id, "a", Duration::hours(1)))
        .await
        .unwrap();
    sessions
        .create(new_session(admin.id, "b", Duration::hours(1)))
        .await
        .unwrap();

    sessions.deactivate_by_token("token-a").await.unwrap();
    sessions.deactivate_by_token("token-a").await.unwrap();
    let stored = sessions.get_by_id(a.id).await.unwrap();
    assert!(!stored.is_active);
    assert!(stored.revoked_at.is_some());

    assert_eq!(sessions.deactivate_for_principal(admin.id).await.unwrap(), 1);
    assert_eq!(sessions.count_active(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn consume_refresh_succeeds_once() {
    let db = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db.clone());
    let sessions = SurrealAdminSessionRepository::new(db);
    let admin = principals.create(new_admin("ops@shop.example")).await.unwrap();
    let session = sessions
        .create(new_session(admin.id, "r", Duration::hours(1)))
        .await
        .unwrap();

    let consumed = sessions.consume_refresh("refresh-r", Utc::now()).await.unwrap();
    assert_eq!(consumed.id, session.id);
    assert_eq!(consumed.principal_id, admin.id);

    let again = sessions.consume_refresh("refresh-r", Utc::now()).await;
    assert!(matches!(again, Err(GateError::NotFound { .. })));
    assert!(sessions.validate("token-r", Utc::now()).await.is_err());
}

#[tokio::test]
async fn expired_sessions_are_swept() {
    let db = setup().await;
    let principals = SurrealAdminPrincipalRepository::new(db.clone());
    let sessions = SurrealAdminSessionRepository::new(db);
    let admin = principals.create(new_admin("ops@shop.example")).await.unwrap();

    sessions
        .create(new_session(admin.id, "old", -Duration::minutes(5)))
        .await
        .unwrap();
    sessions
        .create(new_session(admin.id, "new", Duration::hours(1)))
        .await
        .unwrap();

    assert!(sessions.validate("token-old", Utc::now()).await.is_err());
    assert_eq!(sessions.deactivate_expired(Utc::now()).await.unwrap(), 1);
    assert_eq!(sessions.count_active(Utc::now()).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Local users and sync log
// ---------------------------------------------------------------------------

fn local_user(id: &str, origin: &str) -> CreateLocalUser {
    CreateLocalUser {
        id: id.into(),
        email: format!("{id}@shop.example"),
        full_name: id.into(),
        email_verified: false,
        origin_sync_id: origin.into(),
    }
}

#[tokio::test]
async fn insert_if_absent_reports_who_won() {
    let repo = SurrealLocalUserRepository::new(setup().await);

    let first = repo.insert_if_absent(local_user("u1", "sync-a")).await.unwrap();
    assert!(matches!(first, InsertOutcome::Inserted(ref r) if r.id == "u1"));

    let mut other = local_user("u1", "sync-b");
    other.email = "changed@shop.example".into();
    let second = repo.insert_if_absent(other).await.unwrap();
    match second {
        InsertOutcome::AlreadyPresent(record) => {
            assert_eq!(record.email, "u1@shop.example");
        }
        InsertOutcome::Inserted(_) => panic!("existing row must not be replaced"),
    }

    assert_eq!(repo.count().await.unwrap(), 1);
    assert_eq!(repo.list_ids().await.unwrap(), vec!["u1".to_string()]);
    assert!(repo.get_by_id("u2").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn sync_log_concludes_once() {
    let repo = SurrealSyncLogRepository::new(setup().await);

    let entry = repo
        .begin(CreateSyncLogEntry {
            external_id: "u1".into(),
            email: "u1@shop.example".into(),
        })
        .await
        .unwrap();
    assert_eq!(entry.status, SyncStatus::Pending);

    let done = repo
        .conclude(
            entry.id,
            SyncConclusion::Completed {
                local_id: "u1".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, SyncStatus::Completed);
    assert_eq!(done.local_id.as_deref(), Some("u1"));

    let again = repo
        .conclude(
            entry.id,
            SyncConclusion::Failed {
                error_message: "late".into(),
            },
        )
        .await;
    assert!(matches!(again, Err(GateError::Conflict { .. })));

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.pending, 0);
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activity_log_filters_and_pages() {
    let repo = SurrealActivityLogRepository::new(setup().await);
    let actor = Uuid::new_v4();

    for i in 0..3 {
        repo.append(
            CreateActivityLogEntry::new(Some(actor), "GET /admin/products", "API_REQUEST")
                .with_details(serde_json::json!({ "n": i })),
        )
        .await
        .unwrap();
    }
    repo.append(CreateActivityLogEntry::new(None, "ADMIN_LOGIN", "ADMIN_SESSION"))
        .await
        .unwrap();

    let page = repo
        .list(
            ActivityLogFilter {
                principal_id: Some(actor),
                ..Default::default()
            },
            Pagination { offset: 0, limit: 2 },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|e| e.principal_id == Some(actor)));

    let all = repo
        .list(ActivityLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 4);
}

#[tokio::test]
async fn non_object_details_are_wrapped() {
    let repo = SurrealActivityLogRepository::new(setup().await);

    let entry = repo
        .append(
            CreateActivityLogEntry::new(None, "NOTE", "TEST")
                .with_details(serde_json::json!("plain text")),
        )
        .await
        .unwrap();
    assert_eq!(entry.details, serde_json::json!({ "value": "plain text" }));
}

// ---------------------------------------------------------------------------
// Generic records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_store_crud_and_filters() {
    let store = SurrealRecordStore::new(setup().await);
    let products = TableName::new("product").unwrap();

    store
        .insert(&products, "mug", serde_json::json!({ "kind": "kitchen", "price": 12 }))
        .await
        .unwrap();
    store
        .insert(&products, "pan", serde_json::json!({ "kind": "kitchen", "price": 30 }))
        .await
        .unwrap();
    store
        .insert(&products, "hat", serde_json::json!({ "kind": "apparel", "price": 20 }))
        .await
        .unwrap();

    let mut filter = serde_json::Map::new();
    filter.insert("kind".into(), serde_json::json!("kitchen"));
    let kitchen = store
        .select(&products, filter, Pagination::default())
        .await
        .unwrap();
    assert_eq!(kitchen.len(), 2);
    assert!(kitchen.iter().all(|r| r["kind"] == "kitchen"));

    let mut bad = serde_json::Map::new();
    bad.insert("kind = 'x' OR true".into(), serde_json::json!(1));
    assert!(matches!(
        store.select(&products, bad, Pagination::default()).await,
        Err(GateError::Validation { .. })
    ));

    let err = store
        .update(&products, "sock", serde_json::json!({ "price": 1 }))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    store.delete(&products, "hat").await.unwrap();
    assert!(store.get(&products, "hat").await.unwrap_err().is_not_found());
}
