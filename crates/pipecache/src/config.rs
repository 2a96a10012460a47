//! Configuration file support
//!
//! Settings are layered: the TOML file given with `--config` is the base,
//! environment variables override it, command line flags override both.
//!
//! ```toml
//! backend = "s3"
//!
//! [s3]
//! endpoint_url = "http://minio:9000"
//! bucket = "airflow-cache"
//!
//! [local]
//! root = "/var/cache/pipecache"
//!
//! [retry]
//! max_attempts = 5
//! ```

use crate::errors::{CliError, CliResult};
use pipecache_cache::RetryConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// S3-compatible object store
    #[default]
    S3,
    /// Directory on the local filesystem
    Local,
}

/// `[s3]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct S3Section {
    /// Endpoint URL (`MLFLOW_S3_ENDPOINT_URL`)
    pub endpoint_url: Option<String>,
    /// Region (`AWS_REGION`)
    pub region: Option<String>,
    /// Access key id (`AWS_ACCESS_KEY_ID`)
    pub access_key_id: Option<String>,
    /// Secret access key (`AWS_SECRET_ACCESS_KEY`)
    pub secret_access_key: Option<String>,
    /// Bucket name (`PIPECACHE_BUCKET`)
    pub bucket: Option<String>,
    /// Path-style addressing (`PIPECACHE_S3_PATH_STYLE`)
    pub path_style: Option<bool>,
    /// Operation timeout in seconds (`PIPECACHE_S3_TIMEOUT_SECS`)
    pub timeout_secs: Option<u64>,
}

impl S3Section {
    /// Value of the setting that the environment variable `name` controls
    #[must_use]
    pub fn var(&self, name: &str) -> Option<String> {
        match name {
            "MLFLOW_S3_ENDPOINT_URL" => self.endpoint_url.clone(),
            "AWS_REGION" => self.region.clone(),
            "AWS_ACCESS_KEY_ID" => self.access_key_id.clone(),
            "AWS_SECRET_ACCESS_KEY" => self.secret_access_key.clone(),
            "PIPECACHE_BUCKET" => self.bucket.clone(),
            "PIPECACHE_S3_PATH_STYLE" => self.path_style.map(|v| v.to_string()),
            "PIPECACHE_S3_TIMEOUT_SECS" => self.timeout_secs.map(|v| v.to_string()),
            _ => None,
        }
    }
}

/// `[local]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocalSection {
    /// Root directory of the store
    pub root: Option<PathBuf>,
}

/// Contents of a pipecache configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default backend
    pub backend: Option<Backend>,
    /// S3 settings
    #[serde(default)]
    pub s3: S3Section,
    /// Local store settings
    #[serde(default)]
    pub local: LocalSection,
    /// Retry policy for store calls
    pub retry: Option<RetryConfig>,
}

impl FileConfig {
    /// Parse configuration from TOML text
    pub fn parse(text: &str, origin: &Path) -> CliResult<Self> {
        toml::from_str(text).map_err(|e| {
            CliError::config_with_help(
                format!("Invalid configuration file {}: {e}", origin.display()),
                "See `pipecache --help` for the supported keys",
            )
        })
    }

    /// Load configuration from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| CliError::file("read", path, e))?;
        let config = Self::parse(&text, path)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }
}
