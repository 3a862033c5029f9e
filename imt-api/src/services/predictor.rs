//! Prediction service client
//!
//! Sends an uploaded workbook to the external scoring model and returns the
//! annotated workbook bytes. The request carries an explicit timeout so a
//! hung upstream cannot hang the import request forever.

use imt_common::Config;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;

/// MIME type of xlsx workbooks
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Prediction client errors
#[derive(Debug, Error)]
pub enum PredictorError {
    /// Transport failure, including timeouts
    #[error("prediction service unreachable: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("prediction service returned HTTP {0}: {1}")]
    Api(u16, String),
}

/// HTTP client for the prediction service
pub struct PredictorClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PredictorClient {
    pub fn new(config: &Config) -> Result<Self, PredictorError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.predictor_timeout_secs))
            .build()
            .map_err(|e| PredictorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.predictor_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST the workbook to `{base}/predict_all` and return the annotated
    /// workbook bytes
    pub async fn predict_all(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>, PredictorError> {
        let url = format!("{}/predict_all", self.base_url);

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(XLSX_MIME)
            .map_err(|e| PredictorError::Network(e.to_string()))?;
        let form = Form::new().part("filex", part);

        tracing::debug!(url = %url, "forwarding workbook to prediction service");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PredictorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PredictorError::Api(status.as_u16(), error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PredictorError::Network(e.to_string()))?;

        tracing::info!(bytes = body.len(), "prediction service returned annotated workbook");

        Ok(body.to_vec())
    }
}
