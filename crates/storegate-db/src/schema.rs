//! Schema definitions and migration runner for SurrealDB.
//!
//! All identity-core tables use SCHEMAFULL mode. UUIDs are stored as
//! strings; enums are stored as strings with ASSERT constraints.
//! Admin-governed catalog tables reached through the record gateway are
//! left schemaless and are not defined here.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "admin_sessions",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "identity_sync",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: admin principals, sessions, activity log
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Admin principals (soft-deactivated, never hard-deleted)
-- =======================================================================
DEFINE TABLE admin_principal SCHEMAFULL;
DEFINE FIELD email ON TABLE admin_principal TYPE string \
    ASSERT string::len($value) > 0;
DEFINE FIELD password_hash ON TABLE admin_principal TYPE string \
    ASSERT string::len($value) > 0;
DEFINE FIELD role ON TABLE admin_principal TYPE string \
    ASSERT $value IN ['SuperAdmin', 'Admin', 'Editor', 'Viewer'];
DEFINE FIELD is_active ON TABLE admin_principal TYPE bool DEFAULT true;
DEFINE FIELD last_login_at ON TABLE admin_principal TYPE option<datetime>;
DEFINE FIELD failed_attempts ON TABLE admin_principal TYPE int DEFAULT 0;
DEFINE FIELD locked_until ON TABLE admin_principal TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE admin_principal TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE admin_principal TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_admin_principal_email ON TABLE admin_principal \
    COLUMNS email UNIQUE;

-- =======================================================================
-- Admin sessions (owned by their principal)
-- =======================================================================
DEFINE TABLE admin_session SCHEMAFULL;
DEFINE FIELD principal ON TABLE admin_session TYPE record<admin_principal>;
DEFINE FIELD token_hash ON TABLE admin_session TYPE string;
DEFINE FIELD refresh_token_hash ON TABLE admin_session TYPE string;
DEFINE FIELD expires_at ON TABLE admin_session TYPE datetime;
DEFINE FIELD is_remember_me ON TABLE admin_session TYPE bool DEFAULT false;
DEFINE FIELD ip_address ON TABLE admin_session TYPE option<string>;
DEFINE FIELD user_agent ON TABLE admin_session TYPE option<string>;
DEFINE FIELD is_active ON TABLE admin_session TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE admin_session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD revoked_at ON TABLE admin_session TYPE option<datetime>;
DEFINE INDEX idx_admin_session_token ON TABLE admin_session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_admin_session_refresh ON TABLE admin_session \
    COLUMNS refresh_token_hash UNIQUE;
DEFINE INDEX idx_admin_session_principal ON TABLE admin_session \
    COLUMNS principal;

DEFINE EVENT admin_session_cascade ON TABLE admin_principal \
    WHEN $event = 'DELETE' \
    THEN (DELETE admin_session WHERE principal = $before.id);

-- =======================================================================
-- Activity log (append-only)
-- =======================================================================
DEFINE TABLE activity_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD principal_id ON TABLE activity_log TYPE option<string>;
DEFINE FIELD action ON TABLE activity_log TYPE string;
DEFINE FIELD resource_type ON TABLE activity_log TYPE string;
DEFINE FIELD resource_id ON TABLE activity_log TYPE option<string>;
DEFINE FIELD details ON TABLE activity_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD ip_address ON TABLE activity_log TYPE option<string>;
DEFINE FIELD user_agent ON TABLE activity_log TYPE option<string>;
DEFINE FIELD created_at ON TABLE activity_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_activity_time ON TABLE activity_log COLUMNS created_at;
DEFINE INDEX idx_activity_principal ON TABLE activity_log \
    COLUMNS principal_id;
";

// -----------------------------------------------------------------------
// Schema v2: local user records and sync log
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Local users (record key = external identity id)
-- =======================================================================
DEFINE TABLE local_user SCHEMAFULL;
DEFINE FIELD email ON TABLE local_user TYPE string;
DEFINE FIELD full_name ON TABLE local_user TYPE string;
DEFINE FIELD email_verified ON TABLE local_user TYPE bool DEFAULT false;
DEFINE FIELD origin_sync_id ON TABLE local_user TYPE string;
DEFINE FIELD created_at ON TABLE local_user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE local_user TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Sync log (one entry per attempt)
-- =======================================================================
DEFINE TABLE sync_log SCHEMAFULL;
DEFINE FIELD external_id ON TABLE sync_log TYPE string;
DEFINE FIELD local_id ON TABLE sync_log TYPE option<string>;
DEFINE FIELD email ON TABLE sync_log TYPE string;
DEFINE FIELD status ON TABLE sync_log TYPE string \
    ASSERT $value IN ['pending', 'completed', 'failed'];
DEFINE FIELD error_message ON TABLE sync_log TYPE option<string>;
DEFINE FIELD created_at ON TABLE sync_log TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE sync_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_sync_log_external ON TABLE sync_log \
    COLUMNS external_id;
DEFINE INDEX idx_sync_log_status ON TABLE sync_log COLUMNS status;
";

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let latest: Vec<MigrationRecord> = result.take(0)?;
    Ok(latest.first().map_or(0, |m| m.version))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    let tag = format!("v{} ({})", migration.version, migration.name);

    db.query(migration.sql)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("{tag}: {e}")))?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("{tag} applied but not recorded: {e}")))?;

    Ok(())
}

/// Bring the schema up to date and return how many migrations ran.
///
/// Safe to call on every start: versions already listed in `_migration`
/// are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = applied_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        debug!(version = current, "schema up to date");
        return Ok(0);
    }

    for migration in &pending {
        apply(db, migration).await?;
        info!(version = migration.version, name = migration.name, "migration applied");
    }
    Ok(pending.len())
}
