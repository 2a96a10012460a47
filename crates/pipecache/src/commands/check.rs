//! `pipecache check`

use crate::cli::{KeyArgs, StoreArgs};
use crate::commands::open_cache;
use crate::config::FileConfig;
use crate::errors::{CliError, CliResult};
use pipecache_cache::{ArtifactCache, EntryManifest, Error, LookupResult};
use serde::Serialize;

/// JSON summary printed by `check`
#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    /// Whether a complete entry exists
    pub hit: bool,
    /// Rendered cache key
    pub key: &'a str,
    /// Location of the payload object
    pub payload: String,
    /// Location of the manifest object
    pub metadata: String,
    /// Manifest of the entry on a hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<&'a EntryManifest>,
}

impl<'a> CheckReport<'a> {
    /// Summarize a lookup against `cache`
    #[must_use]
    pub fn new(cache: &ArtifactCache, result: &'a LookupResult) -> Self {
        Self {
            hit: result.hit,
            key: result.key.as_str(),
            payload: cache.store().location(&result.key.payload_object()),
            metadata: cache.store().location(&result.key.metadata_object()),
            manifest: result.entry.as_ref().map(|e| &e.manifest),
        }
    }
}

/// Look up the entry and render the report as pretty JSON
pub async fn execute(key: &KeyArgs, store: &StoreArgs, file: &FileConfig) -> CliResult<String> {
    let params = key.params()?;
    let cache = open_cache(store, file).await?;
    let result = cache
        .lookup(&key.namespace, &params, key.data.as_deref())
        .await?;
    serde_json::to_string_pretty(&CheckReport::new(&cache, &result))
        .map_err(|e| CliError::from(Error::serialization(format!("Failed to render report: {e}"))))
}
