//! Generic CRUD over admin-governed tables through the audited gateway.

use std::collections::HashMap;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use storegate_auth::{Actor, IdentityProvider};
use storegate_core::repository::{Pagination, TableName};

use crate::error::ApiError;
use crate::middleware::AdminContext;
use crate::state::AppState;

const MAX_PAGE_SIZE: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub id: String,
    pub data: serde_json::Value,
}

fn actor(admin: &AdminContext) -> Actor {
    Actor {
        principal_id: admin.session.principal.id,
        ip_address: admin.client.ip_address.clone(),
        user_agent: admin.client.user_agent.clone(),
    }
}

/// `offset` and `limit` page the result; every other query parameter
/// is an equality filter on a string field.
pub async fn list<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    Path(table): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let table = TableName::new(&table)?;
    let defaults = Pagination::default();
    let pagination = Pagination {
        offset: take_number(&mut params, "offset")?.unwrap_or(defaults.offset),
        limit: take_number(&mut params, "limit")?
            .unwrap_or(defaults.limit)
            .min(MAX_PAGE_SIZE),
    };
    let filter = params
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();

    Ok(Json(state.gateway.select(&table, filter, pagination).await?))
}

fn take_number(params: &mut HashMap<String, String>, key: &str) -> Result<Option<u64>, ApiError> {
    params
        .remove(key)
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| ApiError::bad_request(format!("{key} must be a non-negative integer")))
        })
        .transpose()
}

pub async fn create<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    Extension(admin): Extension<AdminContext>,
    Path(table): Path<String>,
    Json(body): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let table = TableName::new(&table)?;
    if body.id.trim().is_empty() {
        return Err(ApiError::bad_request("id must not be empty"));
    }
    let record = state
        .gateway
        .insert(&actor(&admin), &table, &body.id, body.data)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn fetch<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let table = TableName::new(&table)?;
    Ok(Json(state.gateway.get(&table, &id).await?))
}

pub async fn update<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    Extension(admin): Extension<AdminContext>,
    Path((table, id)): Path<(String, String)>,
    Json(data): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let table = TableName::new(&table)?;
    Ok(Json(
        state.gateway.update(&actor(&admin), &table, &id, data).await?,
    ))
}

pub async fn remove<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    Extension(admin): Extension<AdminContext>,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let table = TableName::new(&table)?;
    state.gateway.delete(&actor(&admin), &table, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
