//! `pipecache publish`

use crate::cli::{KeyArgs, StoreArgs};
use crate::commands::open_cache;
use crate::config::FileConfig;
use crate::errors::{CliError, CliResult};
use pipecache_cache::Metadata;
use std::path::Path;

/// Parse `--metadata`, either inline JSON or `@path` to a JSON file
pub fn parse_metadata(raw: Option<&str>) -> CliResult<Metadata> {
    let Some(raw) = raw else {
        return Ok(Metadata::new());
    };
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).map_err(|e| CliError::file("read", path, e))?,
        None => raw.to_string(),
    };
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::config(format!(
            "--metadata must be a JSON object, got {other}"
        ))),
        Err(e) => Err(CliError::config_with_help(
            format!("Invalid --metadata JSON: {e}"),
            "Example: --metadata '{\"r2_score\": 0.87}'",
        )),
    }
}

/// Publish the payload file and print the entry key
pub async fn execute(
    key: &KeyArgs,
    store: &StoreArgs,
    file: &FileConfig,
    payload: &Path,
    metadata: Option<&str>,
) -> CliResult<String> {
    let params = key.params()?;
    let metadata = parse_metadata(metadata)?;
    let cache = open_cache(store, file).await?;
    let published = cache
        .publish_file(
            &key.namespace,
            &params,
            key.data.as_deref(),
            payload,
            metadata,
        )
        .await?;
    Ok(published.to_string())
}
