//! Create and list endpoints, shared by every record kind.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, ApiResponse, AppState};
use crate::models::CollectionRecord;
use crate::store::{Filter, Page};

/// Default page size for list endpoints.
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    skip: i64,
    limit: Option<i64>,
    user_id: Option<String>,
}

/// `POST /{kind}` — validate the body and insert it.
pub async fn create<T: CollectionRecord>(
    State(state): State<AppState>,
    body: Result<Json<T>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let kind = T::KIND;
    let Json(body) = body?;
    let record = body.into_record()?;

    let collection = state.storage.get_collection(kind.collection()).await;
    let id = collection
        .insert(record)
        .await
        .map_err(|e| ApiError::storage(&format!("Error creating {}", kind.label()), e))?;

    info!(kind = %kind, id = %id, "Record created");
    Ok(Json(ApiResponse::ok(
        format!("Created {} entry", kind.label()),
        serde_json::json!({ "id": id }),
    )))
}

/// `GET /{kind}?skip&limit&user_id` — one page plus the total count.
pub async fn list<T: CollectionRecord>(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let kind = T::KIND;
    let Query(params) = params?;
    let page = Page::from_signed(params.skip, Some(params.limit.unwrap_or(DEFAULT_LIMIT)));
    let filter = match params.user_id {
        Some(user_id) => Filter::new().where_eq("user_id", user_id),
        None => Filter::new(),
    };

    let collection = state.storage.get_collection(kind.collection()).await;
    let context = format!("Error retrieving {}", kind.label());
    let items = collection
        .query(&filter, page)
        .await
        .map_err(|e| ApiError::storage(&context, e))?;
    let count = collection
        .count(&filter)
        .await
        .map_err(|e| ApiError::storage(&context, e))?;

    let returned = items.len();
    let mut data = serde_json::Map::new();
    data.insert(
        kind.list_key().to_string(),
        serde_json::Value::Array(items.into_iter().map(serde_json::Value::Object).collect()),
    );

    Ok(Json(
        ApiResponse::ok(
            format!("Retrieved {returned} of {count} {}", kind.label()),
            serde_json::Value::Object(data),
        )
        .with_count(count),
    ))
}
