//! Local user record domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The application's own profile row for an end user.
///
/// `id` is always the external identity's id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalUserRecord {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLocalUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub email_verified: bool,
    /// Sync attempt that issued the insert; used to tell a fresh insert
    /// from one suppressed by the conflict guard.
    pub origin_sync_id: String,
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(LocalUserRecord),
    AlreadyPresent(LocalUserRecord),
}
