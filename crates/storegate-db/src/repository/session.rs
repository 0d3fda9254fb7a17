//! SurrealDB implementation of [`AdminSessionRepository`].

use chrono::{DateTime, Utc};
use storegate_core::error::GateResult;
use storegate_core::models::admin::{AdminRole, AdminView};
use storegate_core::models::session::{AdminSession, CreateAdminSession, ValidatedSession};
use storegate_core::repository::AdminSessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

/// Projection shared by every query returning full session rows.
const SESSION_FIELDS: &str = "meta::id(id) AS record_id, \
     meta::id(principal) AS principal_id, \
     token_hash, refresh_token_hash, expires_at, is_remember_me, \
     ip_address, user_agent, is_active, created_at, revoked_at";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    principal_id: String,
    token_hash: String,
    refresh_token_hash: String,
    expires_at: DateTime<Utc>,
    is_remember_me: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<AdminSession, DbError> {
        Ok(AdminSession {
            id: parse_uuid(&self.record_id, "session")?,
            principal_id: parse_uuid(&self.principal_id, "principal")?,
            token_hash: self.token_hash,
            refresh_token_hash: self.refresh_token_hash,
            expires_at: self.expires_at,
            is_remember_me: self.is_remember_me,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            is_active: self.is_active,
            created_at: self.created_at,
            revoked_at: self.revoked_at,
        })
    }
}

/// Session joined with the principal fields needed on every request.
#[derive(Debug, SurrealValue)]
struct ValidatedRow {
    record_id: String,
    principal_id: String,
    expires_at: DateTime<Utc>,
    is_remember_me: bool,
    email: String,
    role: String,
    last_login_at: Option<DateTime<Utc>>,
}

impl ValidatedRow {
    fn try_into_validated(self) -> Result<ValidatedSession, DbError> {
        let role = AdminRole::parse(&self.role)
            .ok_or_else(|| DbError::Decode(format!("unknown admin role: {}", self.role)))?;
        Ok(ValidatedSession {
            session_id: parse_uuid(&self.record_id, "session")?,
            expires_at: self.expires_at,
            is_remember_me: self.is_remember_me,
            principal: AdminView {
                id: parse_uuid(&self.principal_id, "principal")?,
                email: self.email,
                role,
                last_login_at: self.last_login_at,
            },
        })
    }
}

fn first_session(rows: Vec<SessionRow>, id: String) -> Result<AdminSession, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "admin_session".into(),
            id,
        })?
        .try_into_session()
}

/// SurrealDB implementation of the admin session repository.
#[derive(Clone)]
pub struct SurrealAdminSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAdminSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AdminSessionRepository for SurrealAdminSessionRepository<C> {
    async fn create(&self, input: CreateAdminSession) -> GateResult<AdminSession> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('admin_session', $id) SET \
                 principal = type::record('admin_principal', $principal_id), \
                 token_hash = $token_hash, \
                 refresh_token_hash = $refresh_token_hash, \
                 expires_at = $expires_at, \
                 is_remember_me = $is_remember_me, \
                 ip_address = $ip_address, \
                 user_agent = $user_agent, \
                 is_active = true \
                 RETURN NONE;",
            )
            .query(format!(
                "SELECT {SESSION_FIELDS} FROM type::record('admin_session', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("principal_id", input.principal_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("refresh_token_hash", input.refresh_token_hash))
            .bind(("expires_at", input.expires_at))
            .bind(("is_remember_me", input.is_remember_me))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_session(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> GateResult<AdminSession> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "SELECT {SESSION_FIELDS} FROM type::record('admin_session', $id)"
            ))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_session(rows, id_str)?)
    }

    async fn validate(&self, token_hash: &str, now: DateTime<Utc>) -> GateResult<ValidatedSession> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, \
                 meta::id(principal) AS principal_id, \
                 expires_at, is_remember_me, \
                 principal.email AS email, \
                 principal.role AS role, \
                 principal.last_login_at AS last_login_at \
                 FROM admin_session \
                 WHERE token_hash = $token_hash \
                 AND is_active = true \
                 AND expires_at > $now \
                 AND principal.is_active = true \
                 LIMIT 1",
            )
            .bind(("token_hash", token_hash.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ValidatedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "admin_session".into(),
            id: "token".into(),
        })?;

        Ok(row.try_into_validated()?)
    }

    async fn deactivate_by_token(&self, token_hash: &str) -> GateResult<()> {
        self.db
            .query(
                "UPDATE admin_session SET is_active = false, revoked_at = time::now() \
                 WHERE token_hash = $token_hash AND is_active = true \
                 RETURN NONE",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn deactivate_for_principal(&self, principal_id: Uuid) -> GateResult<u64> {
        let mut result = self
            .db
            .query(
                "LET $changed = (UPDATE admin_session SET \
                 is_active = false, revoked_at = time::now() \
                 WHERE principal = type::record('admin_principal', $principal_id) \
                 AND is_active = true);",
            )
            .query("RETURN array::len($changed);")
            .bind(("principal_id", principal_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let affected: Option<u64> = result.take(1).map_err(DbError::from)?;
        Ok(affected.unwrap_or(0))
    }

    async fn consume_refresh(
        &self,
        refresh_token_hash: &str,
        now: DateTime<Utc>,
    ) -> GateResult<AdminSession> {
        // The WHERE clause is the single-use guard: a concurrent caller
        // finds `is_active = false` and matches nothing.
        let mut result = self
            .db
            .query(
                "LET $consumed = (UPDATE admin_session SET \
                 is_active = false, revoked_at = $now \
                 WHERE refresh_token_hash = $refresh_token_hash \
                 AND is_active = true AND expires_at > $now \
                 RETURN BEFORE);",
            )
            .query(format!("SELECT {SESSION_FIELDS} FROM $consumed"))
            .bind(("refresh_token_hash", refresh_token_hash.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_session(rows, "refresh_token".into())?)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> GateResult<u64> {
        let mut result = self
            .db
            .query(
                "LET $changed = (UPDATE admin_session SET \
                 is_active = false, revoked_at = $now \
                 WHERE is_active = true AND expires_at <= $now);",
            )
            .query("RETURN array::len($changed);")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let affected: Option<u64> = result.take(1).map_err(DbError::from)?;
        Ok(affected.unwrap_or(0))
    }

    async fn count_active(&self, now: DateTime<Utc>) -> GateResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM admin_session \
                 WHERE is_active = true AND expires_at > $now GROUP ALL",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
