//! Repository trait definitions for data access abstraction.
//!
//! One narrow trait per entity. All operations are async and return
//! [`GateResult`]; the atomicity each operation promises is part of its
//! contract, not something callers assemble from reads and writes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{GateError, GateResult};
use crate::models::{
    activity::{ActivityLogEntry, CreateActivityLogEntry},
    admin::{AdminPrincipal, CreateAdminPrincipal},
    local_user::{CreateLocalUser, InsertOutcome, LocalUserRecord},
    session::{AdminSession, CreateAdminSession, ValidatedSession},
    sync_log::{CreateSyncLogEntry, SyncConclusion, SyncLogEntry, SyncLogStats},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Admin credentials and sessions
// ---------------------------------------------------------------------------

pub trait AdminPrincipalRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    fn create(
        &self,
        input: CreateAdminPrincipal,
    ) -> impl Future<Output = GateResult<AdminPrincipal>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GateResult<AdminPrincipal>> + Send;
    /// Only principals with `is_active = true` are returned.
    fn get_active_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = GateResult<AdminPrincipal>> + Send;
    /// Atomically increment `failed_attempts`; when the incremented value
    /// reaches `threshold`, set `locked_until` in the same transaction.
    fn record_failed_login(
        &self,
        id: Uuid,
        threshold: u32,
        locked_until: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<AdminPrincipal>> + Send;
    /// Reset the failure counter, clear any lockout and stamp
    /// `last_login_at`.
    fn record_successful_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<AdminPrincipal>> + Send;
    /// Soft (de)activation. Principals are never hard-deleted.
    fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> impl Future<Output = GateResult<AdminPrincipal>> + Send;
}

pub trait AdminSessionRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAdminSession,
    ) -> impl Future<Output = GateResult<AdminSession>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GateResult<AdminSession>> + Send;
    /// Single conditional read: token matches, session active, not
    /// expired at `now`, principal active. `NotFound` otherwise.
    fn validate(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<ValidatedSession>> + Send;
    /// Deactivate the session holding `token_hash`. Idempotent.
    fn deactivate_by_token(&self, token_hash: &str)
    -> impl Future<Output = GateResult<()>> + Send;
    /// Deactivate every active session of a principal; returns how many
    /// flipped.
    fn deactivate_for_principal(
        &self,
        principal_id: Uuid,
    ) -> impl Future<Output = GateResult<u64>> + Send;
    /// Conditionally deactivate the active, unexpired session holding
    /// `refresh_token_hash` and return it as it was. At most one caller
    /// wins; the rest get `NotFound`.
    fn consume_refresh(
        &self,
        refresh_token_hash: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<AdminSession>> + Send;
    /// Deactivate every active session that expired at or before `now`.
    fn deactivate_expired(&self, now: DateTime<Utc>)
    -> impl Future<Output = GateResult<u64>> + Send;
    fn count_active(&self, now: DateTime<Utc>) -> impl Future<Output = GateResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// End-user reconciliation
// ---------------------------------------------------------------------------

pub trait LocalUserRepository: Send + Sync {
    fn get_by_id(&self, id: &str) -> impl Future<Output = GateResult<LocalUserRecord>> + Send;
    /// Insert keyed on `id`, doing nothing when the row already exists.
    fn insert_if_absent(
        &self,
        input: CreateLocalUser,
    ) -> impl Future<Output = GateResult<InsertOutcome>> + Send;
    fn list_ids(&self) -> impl Future<Output = GateResult<Vec<String>>> + Send;
    fn count(&self) -> impl Future<Output = GateResult<u64>> + Send;
}

pub trait SyncLogRepository: Send + Sync {
    /// Append a new entry in `pending`.
    fn begin(
        &self,
        input: CreateSyncLogEntry,
    ) -> impl Future<Output = GateResult<SyncLogEntry>> + Send;
    /// Move a `pending` entry to its final state. Entries that already
    /// concluded are left untouched and reported as `Conflict`.
    fn conclude(
        &self,
        id: Uuid,
        conclusion: SyncConclusion,
    ) -> impl Future<Output = GateResult<SyncLogEntry>> + Send;
    fn list_for_external_id(
        &self,
        external_id: &str,
    ) -> impl Future<Output = GateResult<Vec<SyncLogEntry>>> + Send;
    fn stats(&self) -> impl Future<Output = GateResult<SyncLogStats>> + Send;
}

// ---------------------------------------------------------------------------
// Activity (append-only)
// ---------------------------------------------------------------------------

/// Query filters for activity log entries.
#[derive(Debug, Clone, Default)]
pub struct ActivityLogFilter {
    pub principal_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait ActivityLogRepository: Send + Sync {
    /// Append a new entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateActivityLogEntry,
    ) -> impl Future<Output = GateResult<ActivityLogEntry>> + Send;
    fn list(
        &self,
        filter: ActivityLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = GateResult<PaginatedResult<ActivityLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Generic record access for admin-governed tables
// ---------------------------------------------------------------------------

/// A validated table name. Only lower-case identifiers outside the
/// identity core's own tables are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

const RESERVED_TABLES: &[&str] = &[
    "admin_principal",
    "admin_session",
    "local_user",
    "sync_log",
    "activity_log",
    "_migration",
];

impl TableName {
    pub fn new(name: &str) -> GateResult<Self> {
        let valid = !name.is_empty()
            && name.len() <= 64
            && name.starts_with(|c: char| c.is_ascii_lowercase())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(GateError::Validation {
                message: format!("invalid table name: {name:?}"),
            });
        }
        if RESERVED_TABLES.contains(&name) {
            return Err(GateError::Validation {
                message: format!("table {name} is not accessible through the gateway"),
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed CRUD over JSON-shaped records of admin-governed tables
/// (products, categories, orders, ...). Record ids are strings.
pub trait RecordStore: Send + Sync {
    /// Records whose fields equal every entry of `filter`.
    fn select(
        &self,
        table: &TableName,
        filter: serde_json::Map<String, serde_json::Value>,
        pagination: Pagination,
    ) -> impl Future<Output = GateResult<Vec<serde_json::Value>>> + Send;
    fn get(
        &self,
        table: &TableName,
        id: &str,
    ) -> impl Future<Output = GateResult<serde_json::Value>> + Send;
    /// `Conflict` if a record with `id` exists.
    fn insert(
        &self,
        table: &TableName,
        id: &str,
        data: serde_json::Value,
    ) -> impl Future<Output = GateResult<serde_json::Value>> + Send;
    /// Merge `data` into an existing record; `NotFound` if absent.
    fn update(
        &self,
        table: &TableName,
        id: &str,
        data: serde_json::Value,
    ) -> impl Future<Output = GateResult<serde_json::Value>> + Send;
    /// `NotFound` if absent.
    fn delete(&self, table: &TableName, id: &str) -> impl Future<Output = GateResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_accepts_plain_identifiers() {
        assert_eq!(TableName::new("product").unwrap().as_str(), "product");
        assert!(TableName::new("order_item2").is_ok());
    }

    #[test]
    fn table_name_rejects_injection_and_reserved() {
        assert!(TableName::new("").is_err());
        assert!(TableName::new("product; DELETE admin_session").is_err());
        assert!(TableName::new("Product").is_err());
        assert!(TableName::new("9lives").is_err());
        assert!(TableName::new("admin_session").is_err());
        assert!(TableName::new("_migration").is_err());
    }
}
