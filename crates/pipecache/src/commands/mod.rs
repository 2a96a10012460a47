//! Subcommand implementations
//!
//! Each command returns its stdout text and exit code instead of printing,
//! so `main` is the only place that writes to the terminal.

pub mod check;
pub mod fetch;
pub mod gate;
pub mod key;
pub mod publish;

use crate::cli::{Commands, StoreArgs};
use crate::config::{Backend, FileConfig};
use crate::errors::{CliResult, EXIT_OK};
use pipecache_cache::{
    ArtifactCache, Error, LocalStore, ObjectStore, RetryConfig, retry_with_backoff,
};
use pipecache_s3::{S3Config, S3Store};
use std::sync::Arc;
use tracing::info;

/// What a command wants written to stdout, and how the process should exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text for stdout; empty means print nothing
    pub stdout: String,
    /// Process exit code
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout text
    #[must_use]
    pub fn text(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: EXIT_OK,
        }
    }
}

/// Run a parsed subcommand
pub async fn execute(command: Commands, file: &FileConfig) -> CliResult<CommandOutput> {
    match command {
        Commands::Key { key } => key::execute(&key).map(CommandOutput::text),
        Commands::Check { key, store } => check::execute(&key, &store, file)
            .await
            .map(CommandOutput::text),
        Commands::Gate {
            key,
            store,
            polarity,
            exit_code,
            skip_exit_code,
        } => {
            let mode = if exit_code {
                gate::OutputMode::ExitCode { skip_exit_code }
            } else {
                gate::OutputMode::Stdout(polarity)
            };
            gate::execute(&key, &store, file, mode).await
        }
        Commands::Publish {
            key,
            store,
            payload,
            metadata,
        } => publish::execute(&key, &store, file, &payload, metadata.as_deref())
            .await
            .map(CommandOutput::text),
        Commands::Fetch {
            key,
            store,
            output,
            verify,
        } => fetch::execute(&key, &store, file, &output, verify)
            .await
            .map(CommandOutput::text),
    }
}

/// Retry policy after layering the file and `--max-attempts`
#[must_use]
pub fn resolve_retry(store: &StoreArgs, file: &FileConfig) -> RetryConfig {
    let mut retry = file.retry.clone().unwrap_or_default();
    if let Some(attempts) = store.max_attempts {
        retry.max_attempts = attempts;
    }
    retry
}

/// S3 settings after layering file, environment and flags
pub fn resolve_s3_config(store: &StoreArgs, file: &FileConfig) -> pipecache_cache::Result<S3Config> {
    let mut config = S3Config::from_lookup(|name| {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| file.s3.var(name))
    })?;
    if let Some(bucket) = &store.bucket {
        config.bucket.clone_from(bucket);
    }
    if let Some(endpoint) = &store.endpoint_url {
        config.endpoint_url = Some(endpoint.clone());
    }
    Ok(config)
}

/// Open the configured store and wrap it in an [`ArtifactCache`]
///
/// The bucket (or root directory) is created if needed.
pub async fn open_cache(
    store: &StoreArgs,
    file: &FileConfig,
) -> pipecache_cache::Result<ArtifactCache> {
    let backend = store.backend.or(file.backend).unwrap_or_default();
    let retry = resolve_retry(store, file);

    let object_store: Arc<dyn ObjectStore> = match backend {
        Backend::Local => {
            let root = store
                .root
                .clone()
                .or_else(|| file.local.root.clone())
                .ok_or_else(|| {
                    Error::configuration("the local backend needs --root or a [local] root")
                })?;
            Arc::new(LocalStore::new(root))
        }
        Backend::S3 => {
            let config = resolve_s3_config(store, file)?;
            Arc::new(S3Store::new(&config).await?)
        }
    };

    retry_with_backoff(&retry, "ensure_bucket", || object_store.ensure_bucket_exists()).await?;
    info!(
        backend = object_store.name(),
        location = %object_store.location(""),
        "Opened cache store"
    );
    Ok(ArtifactCache::new(object_store).with_retry(retry))
}
