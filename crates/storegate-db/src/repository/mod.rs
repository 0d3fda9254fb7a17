//! SurrealDB repository implementations.

mod activity;
mod admin;
mod local_user;
mod record;
mod session;
mod sync_log;

pub use activity::SurrealActivityLogRepository;
pub use admin::{SurrealAdminPrincipalRepository, hash_password};
pub use local_user::SurrealLocalUserRepository;
pub use record::SurrealRecordStore;
pub use session::SurrealAdminSessionRepository;
pub use sync_log::SurrealSyncLogRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}
