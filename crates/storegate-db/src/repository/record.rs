//! SurrealDB implementation of [`RecordStore`] for admin-governed tables.
//!
//! Table names arrive pre-validated as [`TableName`]; filter field names
//! are checked here before they are spliced into a query. All values are
//! bound as parameters.

use storegate_core::error::{GateError, GateResult};
use storegate_core::repository::{Pagination, RecordStore, TableName};
use surrealdb::{Connection, Surreal};

use crate::error::DbError;

type JsonMap = serde_json::Map<String, serde_json::Value>;

fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip any caller-supplied `id`; the record key is always explicit.
fn content(data: serde_json::Value) -> GateResult<serde_json::Value> {
    match data {
        serde_json::Value::Object(mut map) => {
            map.remove("id");
            Ok(serde_json::Value::Object(map))
        }
        _ => Err(GateError::Validation {
            message: "record data must be a JSON object".into(),
        }),
    }
}

/// Rename the projected `record_id` back to `id`.
fn with_plain_id(row: serde_json::Value) -> serde_json::Value {
    match row {
        serde_json::Value::Object(mut map) => {
            if let Some(id) = map.remove("record_id") {
                map.insert("id".into(), id);
            }
            serde_json::Value::Object(map)
        }
        other => other,
    }
}

/// Generic keyed store over schemaless SurrealDB tables.
#[derive(Clone)]
pub struct SurrealRecordStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRecordStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run a mutation that assigns `$changed` and return how many
    /// records it touched.
    async fn changed_count(
        &self,
        statement: &'static str,
        table: &TableName,
        id: &str,
        data: Option<serde_json::Value>,
    ) -> Result<u64, DbError> {
        let mut query = self
            .db
            .query(statement)
            .query("RETURN array::len($changed);")
            .bind(("table", table.as_str().to_string()))
            .bind(("id", id.to_string()));
        if let Some(data) = data {
            query = query.bind(("data", data));
        }
        let mut result = query
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let changed: Option<u64> = result.take(1)?;
        Ok(changed.unwrap_or(0))
    }
}

impl<C: Connection> RecordStore for SurrealRecordStore<C> {
    async fn select(
        &self,
        table: &TableName,
        filter: JsonMap,
        pagination: Pagination,
    ) -> GateResult<Vec<serde_json::Value>> {
        let mut conditions = Vec::with_capacity(filter.len());
        for (i, field) in filter.keys().enumerate() {
            if !is_field_name(field) {
                return Err(GateError::Validation {
                    message: format!("invalid filter field: {field:?}"),
                });
            }
            conditions.push(format!("{field} = $f{i}"));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let mut builder = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * OMIT id FROM type::table($table) \
                 {where_clause} LIMIT $limit START $offset"
            ))
            .bind(("table", table.as_str().to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (i, value) in filter.into_values().enumerate() {
            builder = builder.bind((format!("f{i}"), value));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(with_plain_id).collect())
    }

    async fn get(&self, table: &TableName, id: &str) -> GateResult<serde_json::Value> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * OMIT id \
                 FROM type::record($table, $id)",
            )
            .bind(("table", table.as_str().to_string()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: table.to_string(),
            id: id.to_string(),
        })?;
        Ok(with_plain_id(row))
    }

    async fn insert(
        &self,
        table: &TableName,
        id: &str,
        data: serde_json::Value,
    ) -> GateResult<serde_json::Value> {
        let data = content(data)?;
        let created = self
            .changed_count(
                "LET $changed = IF record::exists(type::record($table, $id)) \
                 THEN [] ELSE (CREATE type::record($table, $id) CONTENT $data) END;",
                table,
                id,
                Some(data),
            )
            .await?;
        if created == 0 {
            return Err(GateError::Conflict {
                entity: table.to_string(),
            });
        }
        self.get(table, id).await
    }

    async fn update(
        &self,
        table: &TableName,
        id: &str,
        data: serde_json::Value,
    ) -> GateResult<serde_json::Value> {
        let data = content(data)?;
        let updated = self
            .changed_count(
                "LET $changed = (UPDATE type::record($table, $id) MERGE $data);",
                table,
                id,
                Some(data),
            )
            .await?;
        if updated == 0 {
            return Err(GateError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            });
        }
        self.get(table, id).await
    }

    async fn delete(&self, table: &TableName, id: &str) -> GateResult<()> {
        let deleted = self
            .changed_count(
                "LET $changed = (DELETE type::record($table, $id) RETURN BEFORE);",
                table,
                id,
                None,
            )
            .await?;
        if deleted == 0 {
            return Err(GateError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
