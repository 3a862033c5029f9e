//! Bulk import pipeline
//!
//! One synchronous flow per upload: forward the workbook to the prediction
//! service, parse the annotated workbook it returns, normalize the table,
//! and persist every row in a single transaction. A failure at any step
//! leaves the store untouched.

use tracing::info;

use crate::db::anomalies::{self, Anomaly};
use crate::error::{ApiError, ApiResult};
use crate::services::{normalizer, spreadsheet};
use crate::AppState;

/// Run the import pipeline for one uploaded workbook
pub async fn run(state: &AppState, file_name: &str, bytes: Vec<u8>) -> ApiResult<Vec<Anomaly>> {
    if !file_name.ends_with(".xlsx") {
        return Err(ApiError::InvalidInput(
            "File must be an xlsx file".to_string(),
        ));
    }

    let annotated = state
        .predictor
        .predict_all(file_name, bytes)
        .await
        .map_err(|e| ApiError::UpstreamUnavailable(e.to_string()))?;

    let table = spreadsheet::parse_xlsx(&annotated)
        .map_err(|e| ApiError::UpstreamResponseInvalid(e.to_string()))?;

    let table = normalizer::normalize_table(&table);
    let drafts = normalizer::to_drafts(&table);

    let created = anomalies::bulk_insert(&state.db, &drafts)
        .await
        .map_err(|e| ApiError::PersistenceFailure(e.to_string()))?;

    info!(count = created.len(), file = %file_name, "bulk import committed");

    Ok(created)
}
