use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::require_edit_token,
    error::AppError,
    paging::{Page, PageRequest, paginate},
    query::FoodQuery,
    record::{FOOD_CATEGORIES, Record, normalize_path_id, strip_internal},
    state::AppState,
    utils::{get_fields_from_body, get_ids_from_body},
};

#[derive(Serialize)]
pub struct Filters {
    categories: Vec<String>,
}

#[derive(Serialize)]
pub struct Item {
    item: Option<Record>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    deleted_count: u64,
}

pub async fn filters_handler(State(state): State<Arc<AppState>>) -> Result<Json<Filters>, AppError> {
    let values = state.reader.distinct(FOOD_CATEGORIES).await?;

    let mut categories: Vec<String> = values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(label) if !label.is_empty() => Some(label),
            _ => None,
        })
        .collect();
    categories.sort();

    Ok(Json(Filters { categories }))
}

pub async fn foods_handler(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page>, AppError> {
    let query = FoodQuery::from_pairs(pairs);
    let filter = query.predicate();
    let request = PageRequest::from_params(
        query.page.as_deref(),
        query.page_size.as_deref(),
        query.prefer_materials.as_deref(),
    );

    let page = paginate(state.reader.as_ref(), &filter, request).await?;

    Ok(Json(page))
}

pub async fn food_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let id = normalize_path_id(&id);
    let item = state.reader.find_one(&id).await?.map(strip_internal);

    Ok(Json(Item { item }))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Item>, AppError> {
    require_edit_token(&headers, state.edit_token())?;

    let id = normalize_path_id(&id);
    let fields = get_fields_from_body(&body)?;

    state.writer.update_one(&id, fields).await?;
    let item = state.writer.find_one(&id).await?.map(strip_internal);

    Ok(Json(Item { item }))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deleted>, AppError> {
    require_edit_token(&headers, state.edit_token())?;

    let id = normalize_path_id(&id);
    let deleted_count = state.writer.delete_one(&id).await?;

    Ok(Json(Deleted { deleted_count }))
}

pub async fn bulk_delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Deleted>, AppError> {
    require_edit_token(&headers, state.edit_token())?;

    let ids = get_ids_from_body(&body)?;
    let deleted_count = state.writer.delete_many(&ids).await?;

    Ok(Json(Deleted { deleted_count }))
}
