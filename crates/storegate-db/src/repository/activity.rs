//! SurrealDB implementation of [`ActivityLogRepository`].

use chrono::{DateTime, Utc};
use storegate_core::error::GateResult;
use storegate_core::models::activity::{ActivityLogEntry, CreateActivityLogEntry};
use storegate_core::repository::{
    ActivityLogFilter, ActivityLogRepository, PaginatedResult, Pagination,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ActivityRow {
    record_id: String,
    principal_id: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: serde_json::Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn try_into_entry(self) -> Result<ActivityLogEntry, DbError> {
        let principal_id = self
            .principal_id
            .as_deref()
            .map(|raw| parse_uuid(raw, "principal"))
            .transpose()?;
        Ok(ActivityLogEntry {
            id: parse_uuid(&self.record_id, "activity")?,
            principal_id,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the append-only activity log.
#[derive(Clone)]
pub struct SurrealActivityLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealActivityLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ActivityLogRepository for SurrealActivityLogRepository<C> {
    async fn append(&self, input: CreateActivityLogEntry) -> GateResult<ActivityLogEntry> {
        let id = Uuid::new_v4().to_string();
        let details = if input.details.is_object() {
            input.details
        } else {
            serde_json::json!({ "value": input.details })
        };

        let mut result = self
            .db
            .query(
                "CREATE type::record('activity_log', $id) SET \
                 principal_id = $principal_id, \
                 action = $action, \
                 resource_type = $resource_type, \
                 resource_id = $resource_id, \
                 details = $details, \
                 ip_address = $ip_address, \
                 user_agent = $user_agent \
                 RETURN NONE;",
            )
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('activity_log', $id)",
            )
            .bind(("id", id.clone()))
            .bind(("principal_id", input.principal_id.map(|p| p.to_string())))
            .bind(("action", input.action))
            .bind(("resource_type", input.resource_type))
            .bind(("resource_id", input.resource_id))
            .bind(("details", details))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ActivityRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "activity_log".into(),
            id,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: ActivityLogFilter,
        pagination: Pagination,
    ) -> GateResult<PaginatedResult<ActivityLogEntry>> {
        let mut conditions = Vec::new();
        if filter.principal_id.is_some() {
            conditions.push("principal_id = $principal_id");
        }
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.resource_type.is_some() {
            conditions.push("resource_type = $resource_type");
        }
        if filter.from.is_some() {
            conditions.push("created_at >= $from");
        }
        if filter.to.is_some() {
            conditions.push("created_at <= $to");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let mut builder = self
            .db
            .query(format!(
                "SELECT count() AS total FROM activity_log {where_clause} GROUP ALL"
            ))
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM activity_log {where_clause} \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(principal_id) = filter.principal_id {
            builder = builder.bind(("principal_id", principal_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(resource_type) = filter.resource_type {
            builder = builder.bind(("resource_type", resource_type));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<ActivityRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(ActivityRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
