//! Configuration loading
//!
//! Every tunable lives in one explicit [`Config`] struct that is resolved
//! once at startup and injected into each component at construction time.
//! Resolution priority for the config file and data directory:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Runtime configuration for the IMT backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Directory holding the database and attachment files
    pub data_dir: PathBuf,
    /// Base URL of the external prediction service
    pub predictor_base_url: String,
    /// Request timeout for prediction calls, in seconds
    pub predictor_timeout_secs: u64,
    /// Lifetime of signed attachment URLs, in seconds
    pub attachment_url_ttl_secs: u64,
    /// Secret used to sign attachment URLs
    pub attachment_signing_secret: String,
    /// Lifetime of issued bearer tokens, in seconds
    pub session_ttl_secs: i64,
    /// Whether the bulk-import endpoint requires authentication.
    /// The upstream deployment keeps this endpoint open; flip to true to
    /// close the asymmetry.
    pub require_auth_for_import: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5810".to_string(),
            data_dir: default_data_dir(),
            predictor_base_url: "http://127.0.0.1:8000".to_string(),
            predictor_timeout_secs: 30,
            attachment_url_ttl_secs: 3600,
            attachment_signing_secret: "insecure-dev-secret".to_string(),
            session_ttl_secs: 86_400,
            require_auth_for_import: false,
        }
    }
}

impl Config {
    /// Resolve configuration from CLI overrides, environment, and TOML file.
    pub fn load(cli_config_path: Option<&Path>, cli_data_dir: Option<&Path>) -> Result<Config> {
        let mut config = match resolve_config_file(cli_config_path) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?
            }
            None => Config::default(),
        };

        apply_env_overrides(&mut config);

        if let Some(dir) = cli_data_dir {
            config.data_dir = dir.to_path_buf();
        }

        if config.attachment_signing_secret == Config::default().attachment_signing_secret {
            warn!("Attachment signing secret is the compiled default; set attachment_signing_secret for production");
        }

        Ok(config)
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("imt.db")
    }

    /// Directory holding stored attachment objects
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    /// Create the data directory if missing
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Locate the config file: CLI argument, then IMT_CONFIG, then the
/// platform config directory. Returns None when nothing exists.
fn resolve_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("IMT_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let default = dirs::config_dir().map(|d| d.join("imt").join("config.toml"))?;
    default.exists().then_some(default)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(addr) = std::env::var("IMT_BIND_ADDRESS") {
        config.bind_address = addr;
    }
    if let Ok(dir) = std::env::var("IMT_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(url) = std::env::var("IMT_PREDICTOR_URL") {
        config.predictor_base_url = url;
    }
    if let Ok(secs) = std::env::var("IMT_PREDICTOR_TIMEOUT_SECS") {
        match secs.parse() {
            Ok(secs) => config.predictor_timeout_secs = secs,
            Err(_) => warn!("Ignoring unparsable IMT_PREDICTOR_TIMEOUT_SECS={}", secs),
        }
    }
    if let Ok(secret) = std::env::var("IMT_ATTACHMENT_SIGNING_SECRET") {
        config.attachment_signing_secret = secret;
    }
    if let Ok(flag) = std::env::var("IMT_REQUIRE_AUTH_FOR_IMPORT") {
        config.require_auth_for_import = matches!(flag.as_str(), "1" | "true" | "yes");
    }
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("imt"))
        .unwrap_or_else(|| PathBuf::from("./imt_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.predictor_timeout_secs, 30);
        assert_eq!(config.attachment_url_ttl_secs, 3600);
        assert!(!config.require_auth_for_import);
        assert_eq!(config.database_path(), config.data_dir.join("imt.db"));
        assert_eq!(config.attachments_dir(), config.data_dir.join("attachments"));
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            bind_address = "0.0.0.0:8080"
            data_dir = "/var/lib/imt"
            predictor_base_url = "http://predictor.internal:9000"
            predictor_timeout_secs = 5
            require_auth_for_import = true
            "#,
        )
        .expect("valid config");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/imt"));
        assert_eq!(config.predictor_base_url, "http://predictor.internal:9000");
        assert_eq!(config.predictor_timeout_secs, 5);
        assert!(config.require_auth_for_import);
        // Unspecified keys fall back to defaults
        assert_eq!(config.session_ttl_secs, 86_400);
    }

    #[test]
    fn test_parse_toml_rejects_unknown_keys() {
        let result: std::result::Result<Config, _> = toml::from_str("predictor_url = \"typo\"");
        assert!(result.is_err());
    }
}
