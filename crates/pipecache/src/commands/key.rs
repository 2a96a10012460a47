//! `pipecache key`

use crate::cli::KeyArgs;
use crate::errors::CliResult;
use pipecache_cache::CacheKey;

/// Derive the cache key without contacting any store
pub fn execute(args: &KeyArgs) -> CliResult<String> {
    let params = args.params()?;
    let key = CacheKey::build(&args.namespace, &params, args.data.as_deref())?;
    Ok(key.to_string())
}
