//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use storegate_auth::{
    ActivityRecorder, AuditedGateway, AuthConfig, IdentityProvider, SessionManager, SyncEngine,
};
use storegate_db::DbManager;
use storegate_db::repository::{
    SurrealActivityLogRepository, SurrealAdminPrincipalRepository, SurrealAdminSessionRepository,
    SurrealLocalUserRepository, SurrealRecordStore, SurrealSyncLogRepository,
};
use surrealdb::engine::any::Any;

use crate::config::ServerConfig;

pub type Sessions =
    SessionManager<SurrealAdminPrincipalRepository<Any>, SurrealAdminSessionRepository<Any>>;
pub type UserSync = SyncEngine<SurrealLocalUserRepository<Any>, SurrealSyncLogRepository<Any>>;
pub type Gateway = AuditedGateway<SurrealRecordStore<Any>>;

/// State shared by every handler. Cheap to clone.
pub struct AppState<I> {
    pub db: DbManager,
    pub sessions: Arc<Sessions>,
    pub sync: Arc<UserSync>,
    pub gateway: Arc<Gateway>,
    pub identity: Arc<I>,
    pub recorder: ActivityRecorder,
    pub config: Arc<ServerConfig>,
    pub started_at: DateTime<Utc>,
}

impl<I> Clone for AppState<I> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            sessions: Arc::clone(&self.sessions),
            sync: Arc::clone(&self.sync),
            gateway: Arc::clone(&self.gateway),
            identity: Arc::clone(&self.identity),
            recorder: self.recorder.clone(),
            config: Arc::clone(&self.config),
            started_at: self.started_at,
        }
    }
}

impl<I: IdentityProvider> AppState<I> {
    /// Wire repositories onto one datastore handle. Spawns the activity
    /// recorder, so this must run inside a tokio runtime.
    pub fn new(db: DbManager, identity: I, auth: AuthConfig, config: ServerConfig) -> Self {
        let client = db.client().clone();

        let recorder = ActivityRecorder::spawn(
            SurrealActivityLogRepository::new(client.clone()),
            config.activity_queue_capacity,
        );

        let sessions = SessionManager::new(
            SurrealAdminPrincipalRepository::with_pepper(client.clone(), auth.pepper.clone()),
            SurrealAdminSessionRepository::new(client.clone()),
            recorder.clone(),
            auth,
        );
        let sync = SyncEngine::new(
            SurrealLocalUserRepository::new(client.clone()),
            SurrealSyncLogRepository::new(client.clone()),
        );
        let gateway = AuditedGateway::new(SurrealRecordStore::new(client), recorder.clone());

        Self {
            db,
            sessions: Arc::new(sessions),
            sync: Arc::new(sync),
            gateway: Arc::new(gateway),
            identity: Arc::new(identity),
            recorder,
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}
