use super::error::ApiError;
use super::{Admin, AppState, JsonBody};
use crate::catalog::models::{Item, ItemFields, NewItem};
use crate::catalog::search::{search, ItemQuery, SearchHit};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn list_items(State(state): State<AppState>, _admin: Admin) -> Json<Vec<Item>> {
    Json(state.catalog.items())
}

pub async fn search_items(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<ItemQuery>,
) -> Json<Vec<SearchHit>> {
    let items = state.catalog.items();
    let regions = state.catalog.regions();
    Json(search(&items, &regions, &query))
}

pub async fn create_item(
    State(state): State<AppState>,
    _admin: Admin,
    JsonBody(item): JsonBody<NewItem>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let item = state.catalog.add_item(item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
    JsonBody(mut fields): JsonBody<ItemFields>,
) -> Result<Json<Item>, ApiError> {
    fields.extra.remove("id");
    let item = state.catalog.update_item(Item { id, fields }).await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_item(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
