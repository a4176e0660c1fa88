use super::error::ApiError;
use super::{Admin, AppState, JsonBody};
use crate::catalog::models::{Item, NewRegion, Region, RegionFields};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn list_regions(State(state): State<AppState>, _admin: Admin) -> Json<Vec<Region>> {
    Json(state.catalog.regions())
}

pub async fn create_region(
    State(state): State<AppState>,
    _admin: Admin,
    JsonBody(region): JsonBody<NewRegion>,
) -> Result<(StatusCode, Json<Region>), ApiError> {
    let region = state.catalog.add_region(region).await?;
    Ok((StatusCode::CREATED, Json(region)))
}

pub async fn update_region(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
    JsonBody(mut fields): JsonBody<RegionFields>,
) -> Result<Json<Region>, ApiError> {
    fields.extra.remove("id");
    let region = state.catalog.update_region(Region { id, fields }).await?;
    Ok(Json(region))
}

pub async fn delete_region(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_region(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Items still pointing at a region; checked before deleting or renaming it.
pub async fn list_region_items(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Json<Vec<Item>> {
    Json(state.catalog.items_in_region(&id))
}
