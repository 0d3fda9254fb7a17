//! Admin session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::admin::AdminView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    pub id: Uuid,
    pub principal_id: Uuid,
    /// SHA-256 digest of the opaque session token.
    pub token_hash: String,
    /// SHA-256 digest of the opaque refresh token.
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateAdminSession {
    pub principal_id: Uuid,
    pub token_hash: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A session that passed every validity predicate, joined with its
/// principal in the same read.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_remember_me: bool,
    pub principal: AdminView,
}
