//! imt-api library - maintenance tracking backend
//!
//! Anomaly lifecycle, bulk import through the external prediction service,
//! KPI queries, maintenance windows, and user/session management behind an
//! axum HTTP API.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use imt_common::Config;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::attachments::AttachmentStore;
use crate::services::predictor::PredictorClient;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;

/// Upload size cap for attachment and import requests
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved runtime configuration
    pub config: Arc<Config>,
    /// Attachment object store
    pub attachments: Arc<dyn AttachmentStore>,
    /// Prediction service client
    pub predictor: Arc<PredictorClient>,
}

impl AppState {
    /// Create new application state from explicitly constructed components
    pub fn new(
        db: SqlitePool,
        config: Config,
        attachments: Arc<dyn AttachmentStore>,
        predictor: PredictorClient,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            attachments,
            predictor: Arc::new(predictor),
        }
    }
}

/// Build application router
///
/// Every anomaly endpoint requires a bearer token except bulk import,
/// which stays open unless `require_auth_for_import` is set.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Param segments never share a level with a static sibling: the axum
    // 0.7 router rejects such inserts, so page/single/kpis live under
    // static prefixes.
    let mut protected = Router::new()
        .route(
            "/anomalies",
            get(api::anomalies::list_anomalies).post(api::anomalies::create_anomaly),
        )
        .route(
            "/anomalies/single/:id",
            get(api::anomalies::get_anomaly)
                .put(api::anomalies::update_anomaly)
                .delete(api::anomalies::delete_anomaly),
        )
        .route("/anomalies/total_anomalies", get(api::anomalies::total_anomalies))
        .route("/anomalies/kpis/:kpis", get(api::anomalies::anomaly_kpis))
        .route(
            "/anomalies/page/:page_number",
            get(api::anomalies::anomalies_page),
        )
        .route(
            "/maintenance-windows",
            get(api::maintenance::list_windows).post(api::maintenance::create_window),
        )
        .route(
            "/maintenance-windows/kpis/:kpis",
            get(api::maintenance::window_kpis),
        )
        .route(
            "/maintenance-windows/single/:id",
            get(api::maintenance::get_window)
                .put(api::maintenance::update_window)
                .delete(api::maintenance::delete_window),
        )
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/users", get(api::auth::list_users))
        .route("/auth/update_status", post(api::auth::toggle_user_status))
        .route(
            "/auth/users/:id",
            axum::routing::put(api::auth::update_user).delete(api::auth::delete_user),
        )
        .route("/auth/statistics", get(api::auth::user_statistics));

    if state.config.require_auth_for_import {
        protected = protected.route(
            "/anomalies/export_anomalies",
            post(api::import::export_anomalies),
        );
    }

    let protected = protected.layer(middleware::from_fn_with_state(
        state.clone(),
        api::auth::require_auth,
    ));

    let mut public = Router::new()
        .merge(api::health::health_routes())
        .route("/auth/login", post(api::auth::login))
        .route("/auth/signup", post(api::auth::signup));

    if !state.config.require_auth_for_import {
        public = public.route(
            "/anomalies/export_anomalies",
            post(api::import::export_anomalies),
        );
    }

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
