//! Connection settings for an S3-compatible store

use pipecache_cache::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Endpoint used when `MLFLOW_S3_ENDPOINT_URL` is unset
pub const DEFAULT_ENDPOINT: &str = "http://minio:9000";
/// Credential used when `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` are unset
pub const DEFAULT_CREDENTIAL: &str = "minioadmin";
/// Region used when `AWS_REGION` is unset
pub const DEFAULT_REGION: &str = "us-east-1";
/// Bucket used when `PIPECACHE_BUCKET` is unset
pub const DEFAULT_BUCKET: &str = "airflow-cache";
/// Per-operation timeout used when `PIPECACHE_S3_TIMEOUT_SECS` is unset
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Settings for [`crate::S3Store`]
#[derive(Clone)]
pub struct S3Config {
    /// Endpoint URL; `None` uses the AWS endpoint for the region
    pub endpoint_url: Option<String>,
    /// Signing region
    pub region: String,
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// Bucket holding cache entries
    pub bucket: String,
    /// Use path-style addressing (`http://host/bucket/key`), needed by MinIO
    pub force_path_style: bool,
    /// Upper bound on a single store call, including connect
    pub operation_timeout: Duration,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("force_path_style", &self.force_path_style)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint_url: Some(DEFAULT_ENDPOINT.to_string()),
            region: DEFAULT_REGION.to_string(),
            access_key_id: DEFAULT_CREDENTIAL.to_string(),
            secret_access_key: SecretString::from(DEFAULT_CREDENTIAL),
            bucket: DEFAULT_BUCKET.to_string(),
            force_path_style: true,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }
}

impl S3Config {
    /// Read settings from the process environment
    ///
    /// Unset variables fall back to the MinIO defaults above.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let operation_timeout = match get("PIPECACHE_S3_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                Error::configuration(format!(
                    "PIPECACHE_S3_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?),
            None => defaults.operation_timeout,
        };
        let force_path_style = match get("PIPECACHE_S3_PATH_STYLE").as_deref() {
            None => defaults.force_path_style,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            Some(other) => {
                return Err(Error::configuration(format!(
                    "PIPECACHE_S3_PATH_STYLE must be true or false, got '{other}'"
                )));
            }
        };

        Ok(Self {
            endpoint_url: get("MLFLOW_S3_ENDPOINT_URL").or(defaults.endpoint_url),
            region: get("AWS_REGION").unwrap_or(defaults.region),
            access_key_id: get("AWS_ACCESS_KEY_ID").unwrap_or(defaults.access_key_id),
            secret_access_key: get("AWS_SECRET_ACCESS_KEY")
                .map_or(defaults.secret_access_key, SecretString::from),
            bucket: get("PIPECACHE_BUCKET").unwrap_or(defaults.bucket),
            force_path_style,
            operation_timeout,
        })
    }

    /// Check the settings before building a client
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::configuration("bucket name must not be empty"));
        }
        if let Some(endpoint) = &self.endpoint_url
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(Error::configuration(format!(
                "endpoint URL '{endpoint}' must start with http:// or https://"
            )));
        }
        if self.access_key_id.is_empty() || self.secret_access_key.expose_secret().is_empty() {
            return Err(Error::configuration("S3 credentials must not be empty"));
        }
        if self.operation_timeout.is_zero() {
            return Err(Error::configuration("operation timeout must be positive"));
        }
        Ok(())
    }
}
