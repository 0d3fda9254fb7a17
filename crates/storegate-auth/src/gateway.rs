//! Data access gateway for admin-governed tables.
//!
//! Reads pass straight through to the [`RecordStore`]. Every successful
//! mutation is recorded in the activity log against the acting admin.

use storegate_core::error::GateResult;
use storegate_core::models::activity::CreateActivityLogEntry;
use storegate_core::repository::{Pagination, RecordStore, TableName};
use uuid::Uuid;

use crate::audit::ActivityRecorder;

pub const ACTION_INSERT: &str = "INSERT";
pub const ACTION_UPDATE: &str = "UPDATE";
pub const ACTION_DELETE: &str = "DELETE";

/// Who is performing a mutation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub principal_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct AuditedGateway<R: RecordStore> {
    store: R,
    recorder: ActivityRecorder,
}

impl<R: RecordStore> AuditedGateway<R> {
    pub fn new(store: R, recorder: ActivityRecorder) -> Self {
        Self { store, recorder }
    }

    pub async fn select(
        &self,
        table: &TableName,
        filter: serde_json::Map<String, serde_json::Value>,
        pagination: Pagination,
    ) -> GateResult<Vec<serde_json::Value>> {
        self.store.select(table, filter, pagination).await
    }

    pub async fn get(&self, table: &TableName, id: &str) -> GateResult<serde_json::Value> {
        self.store.get(table, id).await
    }

    pub async fn insert(
        &self,
        actor: &Actor,
        table: &TableName,
        id: &str,
        data: serde_json::Value,
    ) -> GateResult<serde_json::Value> {
        let record = self.store.insert(table, id, data).await?;
        self.audit(actor, ACTION_INSERT, table, id, serde_json::json!({}));
        Ok(record)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        table: &TableName,
        id: &str,
        data: serde_json::Value,
    ) -> GateResult<serde_json::Value> {
        let fields: Vec<String> = data
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        let record = self.store.update(table, id, data).await?;
        self.audit(
            actor,
            ACTION_UPDATE,
            table,
            id,
            serde_json::json!({ "fields": fields }),
        );
        Ok(record)
    }

    pub async fn delete(&self, actor: &Actor, table: &TableName, id: &str) -> GateResult<()> {
        self.store.delete(table, id).await?;
        self.audit(actor, ACTION_DELETE, table, id, serde_json::json!({}));
        Ok(())
    }

    fn audit(
        &self,
        actor: &Actor,
        action: &str,
        table: &TableName,
        id: &str,
        details: serde_json::Value,
    ) {
        self.recorder.record(
            CreateActivityLogEntry::new(Some(actor.principal_id), action, table.as_str())
                .with_resource_id(id)
                .with_details(details)
                .with_client(actor.ip_address.clone(), actor.user_agent.clone()),
        );
    }
}
