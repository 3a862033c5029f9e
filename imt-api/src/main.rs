//! imt-api - Industrial Maintenance Tracker backend
//!
//! Records equipment anomalies, links them to maintenance windows, and
//! bulk-imports predictor-scored workbooks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use imt_api::services::attachments::LocalAttachmentStore;
use imt_api::services::predictor::PredictorClient;
use imt_api::{build_router, AppState};
use imt_common::Config;

#[derive(Debug, Parser)]
#[command(name = "imt-api", version, about = "Maintenance tracking backend")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "IMT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the database and attachments
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bind address override
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting IMT backend (imt-api) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref(), args.data_dir.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    config.ensure_data_dir()?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = imt_common::db::init_database(&db_path).await?;

    let attachments = Arc::new(LocalAttachmentStore::new(
        config.attachments_dir(),
        config.attachment_signing_secret.clone(),
    ));
    let predictor =
        PredictorClient::new(&config).map_err(|e| anyhow::anyhow!("predictor client: {}", e))?;
    info!("Prediction service: {}", config.predictor_base_url);
    if !config.require_auth_for_import {
        info!("Bulk import endpoint is open (require_auth_for_import = false)");
    }

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config, attachments, predictor);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("imt-api listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
