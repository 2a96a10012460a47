//! Object store capability surface used by the cache
//!
//! Implementations map their backend's failures onto the crate taxonomy:
//! an absent object is `Ok(false)` for [`ObjectStore::exists`] and
//! [`Error::NotFound`] for reads, transport failures are
//! [`Error::StoreUnavailable`]. Implementations do not retry; that is left to
//! the caller (see [`crate::retry`]).

use crate::{Error, Result};
use async_trait::async_trait;

/// Minimal put/get/exists interface over a bucket-like store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs ("s3", "local", "memory")
    fn name(&self) -> &'static str;

    /// Human-readable location of an object (e.g. `s3://bucket/key`)
    fn location(&self, key: &str) -> String;

    /// Create the backing bucket if it does not exist yet
    ///
    /// Idempotent: calling it against an existing bucket is not an error.
    async fn ensure_bucket_exists(&self) -> Result<()>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Store bytes under `key`, replacing any previous object
    async fn put_bytes(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read the bytes stored under `key`
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>>;

    /// Store a JSON document under `key`
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| Error::serialization(format!("Failed to encode {key}: {e}")))?;
        self.put_bytes(key, &bytes).await
    }

    /// Read a JSON document stored under `key`
    async fn get_json(&self, key: &str) -> Result<serde_json::Value> {
        let bytes = self.get_bytes(key).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::serialization(format!("Object {key} is not valid JSON: {e}")))
    }
}
