//! Maintenance window handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::db::maintenance::{self, MaintenanceWindowDraft, MaintenanceWindowPatch};
use crate::error::ApiResult;
use crate::AppState;

/// GET /maintenance-windows
pub async fn list_windows(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let windows = maintenance::list_all(&state.db).await?;
    Ok(Json(json!(windows)))
}

/// POST /maintenance-windows
pub async fn create_window(
    State(state): State<AppState>,
    Json(draft): Json<MaintenanceWindowDraft>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let window = maintenance::create(&state.db, &draft).await?;
    Ok((StatusCode::CREATED, Json(json!(window))))
}

/// GET /maintenance-windows/single/:id
pub async fn get_window(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let window = maintenance::get(&state.db, id).await?;
    Ok(Json(json!(window)))
}

/// PUT /maintenance-windows/single/:id
pub async fn update_window(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<MaintenanceWindowPatch>,
) -> ApiResult<Json<Value>> {
    let window = maintenance::update(&state.db, id, &patch).await?;
    Ok(Json(json!(window)))
}

/// DELETE /maintenance-windows/single/:id
pub async fn delete_window(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    maintenance::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Maintenance window deleted successfully" })))
}

/// GET /maintenance-windows/kpis/:kpis
pub async fn window_kpis(
    State(state): State<AppState>,
    Path(kpis): Path<String>,
) -> ApiResult<Json<Value>> {
    let counts = maintenance::kpis(&state.db, &kpis).await?;
    Ok(Json(json!(counts)))
}
