//! Bulk import endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::services::import;
use crate::AppState;

/// POST /anomalies/export_anomalies
///
/// Accepts one xlsx upload in the `filex` field, runs the prediction
/// pipeline, and bulk-persists the normalized rows.
pub async fn export_anomalies(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("filex") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidInput(format!("Failed to read file: {}", e)))?;
            file = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::InvalidInput("No file provided".to_string()))?;

    let created = import::run(&state, &file_name, bytes).await?;

    Ok(Json(json!({
        "message": "File processed successfully with predictions",
        "exported_anomalies": created,
        "count": created.len(),
    })))
}
