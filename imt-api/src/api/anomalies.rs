//! Anomaly CRUD, pagination, and KPI handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::db::anomalies::{self, AnomalyDraft, AnomalyPatch};
use crate::error::{ApiError, ApiResult};
use crate::services::kpi;
use crate::AppState;

/// GET /anomalies
pub async fn list_anomalies(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let records = anomalies::list_all(&state.db).await?;
    Ok(Json(json!(records)))
}

/// POST /anomalies
///
/// Multipart create: descriptive fields as form values plus a mandatory
/// `filex` attachment. The attachment is stored under `{id}_{filename}`
/// and a signed URL is returned alongside the record.
pub async fn create_anomaly(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut draft = AnomalyDraft::default();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "filex" {
            let file_name = field.file_name().unwrap_or("attachment").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidInput(format!("Failed to read file: {}", e)))?;
            file = Some((file_name, bytes.to_vec()));
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::InvalidInput(format!("Failed to read field {}: {}", name, e)))?;

        match name.as_str() {
            "unit" => draft.unit = Some(text),
            "equipment_id" => draft.equipment_id = Some(text),
            "system_name" => draft.system_name = Some(text),
            "description" => draft.description = Some(text),
            "equipment_description" => draft.equipment_description = Some(text),
            "owning_section" => draft.owning_section = Some(text),
            "integrity_score" => draft.integrity_score = text.trim().parse().ok(),
            "availability_score" => draft.availability_score = text.trim().parse().ok(),
            "process_safety_score" => draft.process_safety_score = text.trim().parse().ok(),
            "criticality_score" => draft.criticality_score = text.trim().parse().ok(),
            "priority_level" => draft.priority_level = Some(text),
            "notes" => draft.notes = Some(text),
            "maintenance_date" => {
                draft.maintenance_date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
            }
            // Extra form fields from the upload page are ignored
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::InvalidInput("No file provided".to_string()))?;

    let created = anomalies::create(&state.db, &draft).await?;

    let key = format!("{}_{}", created.id, file_name);
    state.attachments.put(&key, &bytes).await?;
    anomalies::set_attachment_key(&state.db, created.id, &key).await?;

    let file_url = state
        .attachments
        .sign_url(&key, state.config.attachment_url_ttl_secs)
        .await?;
    let record = anomalies::get(&state.db, created.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Anomaly created successfully",
            "data": record,
            "file_url": file_url,
        })),
    ))
}

/// GET /anomalies/single/:id
pub async fn get_anomaly(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let record = anomalies::get(&state.db, id).await?;
    Ok(Json(json!(record)))
}

/// PUT /anomalies/single/:id
///
/// Typed partial update; payloads with unknown field names are rejected.
pub async fn update_anomaly(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let patch: AnomalyPatch = serde_json::from_value(body)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid update payload: {}", e)))?;

    let updated = anomalies::update(&state.db, id, &patch).await?;
    Ok(Json(json!(updated)))
}

/// DELETE /anomalies/single/:id
pub async fn delete_anomaly(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    anomalies::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Anomaly deleted successfully" })))
}

/// GET /anomalies/page/:page_number
pub async fn anomalies_page(
    State(state): State<AppState>,
    Path(page_number): Path<i64>,
) -> ApiResult<Json<Value>> {
    let page = anomalies::list_page(&state.db, page_number).await?;

    Ok(Json(json!({
        "anomalies": page.anomalies,
        "total_pages": page.total_pages,
        "total_anomalies": page.total_count,
    })))
}

/// GET /anomalies/total_anomalies
pub async fn total_anomalies(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let total = anomalies::count(&state.db).await?;
    Ok(Json(json!({ "total_anomalies": total })))
}

/// GET /anomalies/kpis/:kpis
pub async fn anomaly_kpis(
    State(state): State<AppState>,
    Path(kpis): Path<String>,
) -> ApiResult<Json<Value>> {
    let records = kpi::query(&state.db, &kpis).await?;
    Ok(Json(json!({ "anomalies": records })))
}
