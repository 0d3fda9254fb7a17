//! SurrealDB implementation of [`AdminPrincipalRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use storegate_core::error::GateResult;
use storegate_core::models::admin::{AdminPrincipal, AdminRole, CreateAdminPrincipal};
use storegate_core::repository::AdminPrincipalRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('admin_principal', $id)";

#[derive(Debug, SurrealValue)]
struct PrincipalRow {
    record_id: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PrincipalRow {
    fn try_into_principal(self) -> Result<AdminPrincipal, DbError> {
        let role = AdminRole::parse(&self.role)
            .ok_or_else(|| DbError::Decode(format!("unknown admin role: {}", self.role)))?;
        Ok(AdminPrincipal {
            id: parse_uuid(&self.record_id, "principal")?,
            email: self.email,
            password_hash: self.password_hash,
            role,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            failed_attempts: self.failed_attempts,
            locked_until: self.locked_until,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn single(rows: Vec<PrincipalRow>, id: String) -> Result<AdminPrincipal, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "admin_principal".into(),
            id,
        })?
        .try_into_principal()
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the admin credential store.
#[derive(Clone)]
pub struct SurrealAdminPrincipalRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealAdminPrincipalRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: Option<String>) -> Self {
        Self { db, pepper }
    }

    async fn fetch(&self, id: Uuid) -> Result<AdminPrincipal, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .await?;
        let rows: Vec<PrincipalRow> = result.take(0)?;
        single(rows, id_str)
    }
}

impl<C: Connection> AdminPrincipalRepository for SurrealAdminPrincipalRepository<C> {
    async fn create(&self, input: CreateAdminPrincipal) -> GateResult<AdminPrincipal> {
        let email = input.email.trim().to_lowercase();

        let mut existing = self
            .db
            .query("SELECT count() AS total FROM admin_principal WHERE email = $email GROUP ALL")
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;
        let counts: Vec<super::CountRow> = existing.take(0).map_err(DbError::from)?;
        if counts.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Err(DbError::Conflict {
                entity: "admin_principal".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        self.db
            .query(
                "CREATE type::record('admin_principal', $id) SET \
                 email = $email, \
                 password_hash = $password_hash, \
                 role = $role, \
                 is_active = true, \
                 failed_attempts = 0, \
                 last_login_at = NONE, \
                 locked_until = NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("email", email.clone()))
            .bind(("password_hash", password_hash))
            .bind(("role", input.role.as_str().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(principal_id = %id, email = %email, role = input.role.as_str(), "Admin principal provisioned");

        Ok(self.fetch(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> GateResult<AdminPrincipal> {
        Ok(self.fetch(id).await?)
    }

    async fn get_active_by_email(&self, email: &str) -> GateResult<AdminPrincipal> {
        let email = email.trim().to_lowercase();
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM admin_principal \
                 WHERE email = $email AND is_active = true",
            )
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        Ok(single(rows, format!("email={email}"))?)
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        threshold: u32,
        locked_until: DateTime<Utc>,
    ) -> GateResult<AdminPrincipal> {
        // `locked_until` is assigned before the increment so its
        // condition reads the pre-increment counter.
        let mut result = self
            .db
            .query(
                "UPDATE type::record('admin_principal', $id) SET \
                 locked_until = IF failed_attempts + 1 >= $threshold \
                     AND (locked_until = NONE OR locked_until <= $now) \
                     THEN $locked_until ELSE locked_until END, \
                 failed_attempts = failed_attempts + 1, \
                 updated_at = time::now() \
                 RETURN NONE;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .bind(("threshold", threshold))
            .bind(("locked_until", locked_until))
            .bind(("now", Utc::now()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PrincipalRow> = result.take(1).map_err(DbError::from)?;
        Ok(single(rows, id.to_string())?)
    }

    async fn record_successful_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> GateResult<AdminPrincipal> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('admin_principal', $id) SET \
                 failed_attempts = 0, \
                 locked_until = NONE, \
                 last_login_at = $at, \
                 updated_at = time::now() \
                 RETURN NONE;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PrincipalRow> = result.take(1).map_err(DbError::from)?;
        Ok(single(rows, id.to_string())?)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> GateResult<AdminPrincipal> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('admin_principal', $id) SET \
                 is_active = $is_active, updated_at = time::now() \
                 RETURN NONE;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .bind(("is_active", is_active))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PrincipalRow> = result.take(1).map_err(DbError::from)?;
        Ok(single(rows, id.to_string())?)
    }
}
