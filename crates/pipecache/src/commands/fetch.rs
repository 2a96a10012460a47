//! `pipecache fetch`

use crate::cli::{KeyArgs, StoreArgs};
use crate::commands::open_cache;
use crate::config::FileConfig;
use crate::errors::CliResult;
use pipecache_cache::Error;
use std::path::Path;

/// Download the cached payload to `output` and print the path
///
/// Fails with a not-found error when there is no complete entry.
pub async fn execute(
    key: &KeyArgs,
    store: &StoreArgs,
    file: &FileConfig,
    output: &Path,
    verify: bool,
) -> CliResult<String> {
    let params = key.params()?;
    let cache = open_cache(store, file).await?;
    let result = cache
        .lookup(&key.namespace, &params, key.data.as_deref())
        .await?;
    let Some(entry) = result.entry else {
        return Err(Error::not_found(result.key.as_str()).into());
    };
    if verify {
        cache.fetch_verified_to(&entry, output).await?;
    } else {
        cache.fetch_payload_to(&entry.key, output).await?;
    }
    Ok(output.display().to_string())
}
