//! SurrealDB implementation of [`LocalUserRepository`].
//!
//! Records are keyed by the external identity id itself
//! (`local_user:⟨external_id⟩`), so the record key is the conflict
//! guard for concurrent first syncs.

use chrono::{DateTime, Utc};
use storegate_core::error::GateResult;
use storegate_core::models::local_user::{CreateLocalUser, InsertOutcome, LocalUserRecord};
use storegate_core::repository::LocalUserRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::CountRow;
use crate::error::DbError;

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('local_user', $id)";

#[derive(Debug, SurrealValue)]
struct LocalUserRow {
    record_id: String,
    email: String,
    full_name: String,
    email_verified: bool,
    origin_sync_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LocalUserRow {
    fn into_record(self) -> LocalUserRecord {
        LocalUserRecord {
            id: self.record_id,
            email: self.email,
            full_name: self.full_name,
            email_verified: self.email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    record_id: String,
}

/// SurrealDB implementation of the local user repository.
#[derive(Clone)]
pub struct SurrealLocalUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealLocalUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> LocalUserRepository for SurrealLocalUserRepository<C> {
    async fn get_by_id(&self, id: &str) -> GateResult<LocalUserRecord> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LocalUserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "local_user".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_record())
    }

    async fn insert_if_absent(&self, input: CreateLocalUser) -> GateResult<InsertOutcome> {
        let id = input.id.clone();
        let origin = input.origin_sync_id.clone();

        // IGNORE leaves an existing row untouched; the follow-up read
        // tells us whose insert landed via `origin_sync_id`.
        let mut result = self
            .db
            .query(
                "INSERT IGNORE INTO local_user { \
                 id: type::record('local_user', $id), \
                 email: $email, \
                 full_name: $full_name, \
                 email_verified: $email_verified, \
                 origin_sync_id: $origin_sync_id \
                 } RETURN NONE;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", input.id))
            .bind(("email", input.email))
            .bind(("full_name", input.full_name))
            .bind(("email_verified", input.email_verified))
            .bind(("origin_sync_id", input.origin_sync_id))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<LocalUserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "local_user".into(),
            id,
        })?;

        let inserted = row.origin_sync_id == origin;
        let record = row.into_record();
        Ok(if inserted {
            InsertOutcome::Inserted(record)
        } else {
            InsertOutcome::AlreadyPresent(record)
        })
    }

    async fn list_ids(&self) -> GateResult<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM local_user")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.record_id).collect())
    }

    async fn count(&self) -> GateResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM local_user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
