//! SurrealDB implementation of [`SyncLogRepository`].

use chrono::{DateTime, Utc};
use storegate_core::error::GateResult;
use storegate_core::models::sync_log::{
    CreateSyncLogEntry, SyncConclusion, SyncLogEntry, SyncLogStats, SyncStatus,
};
use storegate_core::repository::SyncLogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('sync_log', $id)";

#[derive(Debug, SurrealValue)]
struct SyncLogRow {
    record_id: String,
    external_id: String,
    local_id: Option<String>,
    email: String,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SyncLogRow {
    fn try_into_entry(self) -> Result<SyncLogEntry, DbError> {
        let status = SyncStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown sync status: {}", self.status)))?;
        Ok(SyncLogEntry {
            id: parse_uuid(&self.record_id, "sync log")?,
            external_id: self.external_id,
            local_id: self.local_id,
            email: self.email,
            status,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct StatusCountRow {
    status: String,
    total: u64,
}

fn single(rows: Vec<SyncLogRow>, id: String) -> Result<SyncLogEntry, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "sync_log".into(),
            id,
        })?
        .try_into_entry()
}

/// SurrealDB implementation of the sync log repository.
#[derive(Clone)]
pub struct SurrealSyncLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSyncLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SyncLogRepository for SurrealSyncLogRepository<C> {
    async fn begin(&self, input: CreateSyncLogEntry) -> GateResult<SyncLogEntry> {
        let id = Uuid::new_v4().to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('sync_log', $id) SET \
                 external_id = $external_id, \
                 local_id = NONE, \
                 email = $email, \
                 status = 'pending', \
                 error_message = NONE \
                 RETURN NONE;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", id.clone()))
            .bind(("external_id", input.external_id))
            .bind(("email", input.email))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SyncLogRow> = result.take(1).map_err(DbError::from)?;
        Ok(single(rows, id)?)
    }

    async fn conclude(&self, id: Uuid, conclusion: SyncConclusion) -> GateResult<SyncLogEntry> {
        let id_str = id.to_string();
        let (status, local_id, error_message) = match conclusion {
            SyncConclusion::Completed { local_id } => (SyncStatus::Completed, Some(local_id), None),
            SyncConclusion::Failed { error_message } => {
                (SyncStatus::Failed, None, Some(error_message))
            }
        };

        // Only a pending entry may transition; anything else is left as is.
        let mut result = self
            .db
            .query(
                "LET $changed = (UPDATE type::record('sync_log', $id) SET \
                 status = $status, \
                 local_id = $local_id, \
                 error_message = $error_message, \
                 updated_at = time::now() \
                 WHERE status = 'pending');",
            )
            .query("RETURN array::len($changed);")
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .bind(("status", status.as_str().to_string()))
            .bind(("local_id", local_id))
            .bind(("error_message", error_message))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let changed: Option<u64> = result.take(1).map_err(DbError::from)?;
        let rows: Vec<SyncLogRow> = result.take(2).map_err(DbError::from)?;
        let entry = single(rows, id_str)?;

        if changed.unwrap_or(0) == 0 {
            return Err(DbError::Conflict {
                entity: "sync_log".into(),
            }
            .into());
        }

        Ok(entry)
    }

    async fn list_for_external_id(&self, external_id: &str) -> GateResult<Vec<SyncLogEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM sync_log \
                 WHERE external_id = $external_id \
                 ORDER BY created_at ASC",
            )
            .bind(("external_id", external_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SyncLogRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(SyncLogRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn stats(&self) -> GateResult<SyncLogStats> {
        let mut result = self
            .db
            .query("SELECT status, count() AS total FROM sync_log GROUP BY status")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StatusCountRow> = result.take(0).map_err(DbError::from)?;
        let mut stats = SyncLogStats::default();
        for row in rows {
            match SyncStatus::parse(&row.status) {
                Some(SyncStatus::Pending) => stats.pending = row.total,
                Some(SyncStatus::Completed) => stats.completed = row.total,
                Some(SyncStatus::Failed) => stats.failed = row.total,
                None => {}
            }
        }
        Ok(stats)
    }
}
