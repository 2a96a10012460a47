//! Artifact cache: lookup and publish of cached pipeline results
//!
//! An entry is two sibling objects, the payload at `<key>.bin` and the
//! manifest at `<key>.json`. Publish writes the payload first and the
//! manifest second; the manifest is the commit marker. Lookup requires both
//! objects, so an interrupted publish reads as a miss.

use crate::hash::{Fingerprint, Params};
use crate::key::CacheKey;
use crate::local::write_atomically;
use crate::retry::{RetryConfig, retry_with_backoff};
use crate::store::ObjectStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Caller-supplied metadata stored alongside a payload (metrics etc.)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Contents of the manifest object of an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryManifest {
    /// Namespace the entry was published under
    pub namespace: String,
    /// Parameters the payload was produced from
    pub params: Params,
    /// Fingerprint of `params`
    pub params_fingerprint: Fingerprint,
    /// Fingerprint of the source data file, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_fingerprint: Option<Fingerprint>,
    /// When the entry was published
    pub created_at: DateTime<Utc>,
    /// Size of the payload in bytes
    pub payload_size: u64,
    /// SHA-256 of the payload bytes
    pub payload_sha256: Fingerprint,
    /// Version of pipecache that published the entry
    pub tool_version: String,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// A committed cache entry whose payload has not been downloaded
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Key of the entry
    pub key: CacheKey,
    /// Parsed manifest
    pub manifest: EntryManifest,
}

impl CacheEntry {
    /// Read one caller-supplied metadata field
    #[must_use]
    pub fn metadata(&self, field: &str) -> Option<&serde_json::Value> {
        self.manifest.metadata.get(field)
    }
}

/// Outcome of [`ArtifactCache::lookup`]
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// Whether a complete entry exists
    pub hit: bool,
    /// Key that was looked up
    pub key: CacheKey,
    /// The entry, present only when `hit` is true
    pub entry: Option<CacheEntry>,
}

impl LookupResult {
    fn miss(key: CacheKey) -> Self {
        Self {
            hit: false,
            key,
            entry: None,
        }
    }

    fn found(entry: CacheEntry) -> Self {
        Self {
            hit: true,
            key: entry.key.clone(),
            entry: Some(entry),
        }
    }
}

/// Content-addressed cache of pipeline artifacts over an [`ObjectStore`]
///
/// Cloning is cheap; clones share the underlying store client.
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("store", &self.store.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ArtifactCache {
    /// Create a cache over `store` with the default retry policy
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy applied to store calls
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Look up the entry for a namespace, parameter set and optional data file
    ///
    /// Never fails because an entry is missing; that is a miss. Fails with
    /// [`Error::StoreUnavailable`] when the store cannot be reached.
    pub async fn lookup(
        &self,
        namespace: &str,
        params: &Params,
        data_path: Option<&Path>,
    ) -> Result<LookupResult> {
        let key = CacheKey::build(namespace, params, data_path)?;
        self.lookup_key(&key).await
    }

    /// Look up an already derived key
    pub async fn lookup_key(&self, key: &CacheKey) -> Result<LookupResult> {
        let payload_object = key.payload_object();
        let metadata_object = key.metadata_object();

        let (has_payload, has_metadata) = tokio::try_join!(
            self.exists(&payload_object),
            self.exists(&metadata_object)
        )?;

        match (has_payload, has_metadata) {
            (true, true) => {}
            (false, false) => {
                info!(key = %key, store = self.store.name(), "Cache miss");
                return Ok(LookupResult::miss(key.clone()));
            }
            (true, false) => {
                warn!(
                    key = %key,
                    object = %payload_object,
                    "Payload present without manifest (interrupted publish?); treating as miss"
                );
                return Ok(LookupResult::miss(key.clone()));
            }
            (false, true) => {
                warn!(
                    key = %key,
                    object = %metadata_object,
                    "Manifest present without payload; treating as miss"
                );
                return Ok(LookupResult::miss(key.clone()));
            }
        }

        let manifest = match self.read_manifest(&metadata_object).await {
            Ok(manifest) => manifest,
            Err(err) if err.is_not_found() => {
                warn!(key = %key, "Manifest disappeared between existence check and read; treating as miss");
                return Ok(LookupResult::miss(key.clone()));
            }
            Err(err) => return Err(err),
        };

        if manifest.params_fingerprint != *key.params_fingerprint() {
            return Err(Error::integrity(
                key.as_str(),
                key.params_fingerprint().as_hex(),
                manifest.params_fingerprint.as_hex(),
            ));
        }

        info!(key = %key, store = self.store.name(), created_at = %manifest.created_at, "Cache hit");
        Ok(LookupResult::found(CacheEntry {
            key: key.clone(),
            manifest,
        }))
    }

    /// Publish a payload and its metadata, returning the entry key
    ///
    /// An existing entry for the same key is overwritten.
    pub async fn publish(
        &self,
        namespace: &str,
        params: &Params,
        data_path: Option<&Path>,
        payload: &[u8],
        metadata: Metadata,
    ) -> Result<CacheKey> {
        let key = CacheKey::build(namespace, params, data_path)?;
        let manifest = EntryManifest {
            namespace: namespace.to_string(),
            params: params.clone(),
            params_fingerprint: key.params_fingerprint().clone(),
            data_fingerprint: key.data_fingerprint().cloned(),
            created_at: Utc::now(),
            payload_size: payload.len() as u64,
            payload_sha256: Fingerprint::of_bytes(payload),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            metadata,
        };
        let manifest_json = serde_json::to_value(&manifest)
            .map_err(|e| Error::serialization(format!("Failed to encode manifest: {e}")))?;

        // Payload must be acknowledged before the manifest is written.
        let payload_object = key.payload_object();
        retry_with_backoff(&self.retry, "put_payload", || {
            self.store.put_bytes(&payload_object, payload)
        })
        .await?;
        debug!(key = %key, size = payload.len(), "Payload written");

        let metadata_object = key.metadata_object();
        retry_with_backoff(&self.retry, "put_manifest", || {
            self.store.put_json(&metadata_object, &manifest_json)
        })
        .await?;

        info!(
            key = %key,
            location = %self.store.location(&payload_object),
            size = payload.len(),
            "Published cache entry"
        );
        Ok(key)
    }

    /// Publish a payload read from a local file
    pub async fn publish_file(
        &self,
        namespace: &str,
        params: &Params,
        data_path: Option<&Path>,
        payload_path: &Path,
        metadata: Metadata,
    ) -> Result<CacheKey> {
        let payload = tokio::fs::read(payload_path)
            .await
            .map_err(|e| Error::io(e, payload_path, "read"))?;
        self.publish(namespace, params, data_path, &payload, metadata)
            .await
    }

    /// Download the payload of an entry
    ///
    /// Fails with [`Error::NotFound`] if the payload object is absent.
    pub async fn fetch_payload(&self, key: &CacheKey) -> Result<Vec<u8>> {
        let payload_object = key.payload_object();
        let data = retry_with_backoff(&self.retry, "get_payload", || {
            self.store.get_bytes(&payload_object)
        })
        .await?;
        debug!(key = %key, size = data.len(), "Fetched payload");
        Ok(data)
    }

    /// Download the payload and check it against the manifest
    pub async fn fetch_verified(&self, entry: &CacheEntry) -> Result<Vec<u8>> {
        let data = self.fetch_payload(&entry.key).await?;
        let size = data.len() as u64;
        if size != entry.manifest.payload_size {
            return Err(Error::integrity(
                entry.key.as_str(),
                format!("{} bytes", entry.manifest.payload_size),
                format!("{size} bytes"),
            ));
        }
        let digest = Fingerprint::of_bytes(&data);
        if digest != entry.manifest.payload_sha256 {
            return Err(Error::integrity(
                entry.key.as_str(),
                entry.manifest.payload_sha256.as_hex(),
                digest.as_hex(),
            ));
        }
        Ok(data)
    }

    /// Download the payload into `destination`, returning its size
    ///
    /// Parent directories are created. The file is written through a
    /// temporary sibling and renamed, so `destination` is never left
    /// half-written.
    pub async fn fetch_payload_to(&self, key: &CacheKey, destination: &Path) -> Result<u64> {
        let data = self.fetch_payload(key).await?;
        Self::write_payload(key, data, destination).await
    }

    /// Like [`Self::fetch_payload_to`], checking the payload first
    ///
    /// Nothing is written when the integrity check fails.
    pub async fn fetch_verified_to(&self, entry: &CacheEntry, destination: &Path) -> Result<u64> {
        let data = self.fetch_verified(entry).await?;
        Self::write_payload(&entry.key, data, destination).await
    }

    async fn write_payload(key: &CacheKey, data: Vec<u8>, destination: &Path) -> Result<u64> {
        let size = data.len() as u64;
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&target, &data))
            .await
            .map_err(|e| Error::io_no_path(std::io::Error::other(e), "join"))?
            .map_err(|e| Error::io(e, destination, "write"))?;
        info!(key = %key, path = %destination.display(), size, "Payload downloaded");
        Ok(size)
    }

    async fn exists(&self, object: &str) -> Result<bool> {
        retry_with_backoff(&self.retry, "exists", || self.store.exists(object)).await
    }

    async fn read_manifest(&self, object: &str) -> Result<EntryManifest> {
        let json = retry_with_backoff(&self.retry, "get_manifest", || self.store.get_json(object))
            .await?;
        serde_json::from_value(json)
            .map_err(|e| Error::serialization(format!("Manifest {object} is malformed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn cache() -> (ArtifactCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = ArtifactCache::new(store.clone()).with_retry(RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
        });
        (cache, store)
    }

    fn params() -> Params {
        Params::new().with("n_estimators", 100).with("max_depth", 10)
    }

    fn metrics() -> Metadata {
        let mut m = Metadata::new();
        m.insert("r2_score".into(), json!(0.87));
        m
    }

    #[tokio::test]
    async fn test_empty_store_is_miss() {
        let (cache, _) = cache();
        let result = cache.lookup("models/rf", &params(), None).await.unwrap();
        assert!(!result.hit);
        assert!(result.entry.is_none());
    }

    #[tokio::test]
    async fn test_publish_then_lookup_hits() {
        let (cache, _) = cache();
        let key = cache
            .publish("models/rf", &params(), None, b"MODEL", metrics())
            .await
            .unwrap();

        let result = cache.lookup("models/rf", &params(), None).await.unwrap();
        assert!(result.hit);
        assert_eq!(result.key, key);
        let entry = result.entry.unwrap();
        assert_eq!(entry.metadata("r2_score"), Some(&json!(0.87)));
        assert_eq!(entry.manifest.payload_size, 5);
        assert_eq!(entry.manifest.params, params());
        assert_eq!(cache.fetch_payload(&key).await.unwrap(), b"MODEL");
    }

    #[tokio::test]
    async fn test_lookup_does_not_download_payload() {
        let (cache, store) = cache();
        let key = cache
            .publish("models/rf", &params(), None, b"BIG MODEL", Metadata::new())
            .await
            .unwrap();
        let result = cache.lookup_key(&key).await.unwrap();
        assert!(result.hit);
        assert_eq!(store.reads(&key.payload_object()), 0);
        assert_eq!(store.reads(&key.metadata_object()), 1);
    }

    #[tokio::test]
    async fn test_failed_manifest_write_leaves_miss() {
        let (cache, store) = cache();
        store.fail_puts_ending_with(crate::key::METADATA_SUFFIX);

        let err = cache
            .publish("models/rf", &params(), None, b"MODEL", Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));

        let key = CacheKey::build("models/rf", &params(), None).unwrap();
        assert_eq!(store.keys(), vec![key.payload_object()]);
        let result = cache.lookup_key(&key).await.unwrap();
        assert!(!result.hit);
    }

    #[tokio::test]
    async fn test_failed_payload_write_publishes_nothing() {
        let (cache, store) = cache();
        store.fail_puts_ending_with(crate::key::PAYLOAD_SUFFIX);
        assert!(
            cache
                .publish("models/rf", &params(), None, b"MODEL", Metadata::new())
                .await
                .is_err()
        );
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_manifest_only_is_miss() {
        let (cache, store) = cache();
        let key = CacheKey::build("models/rf", &params(), None).unwrap();
        store
            .put_json(&key.metadata_object(), &json!({"garbage": true}))
            .await
            .unwrap();
        let result = cache.lookup_key(&key).await.unwrap();
        assert!(!result.hit);
        assert!(result.entry.is_none());
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_serialization_error() {
        let (cache, store) = cache();
        let key = CacheKey::build("models/rf", &params(), None).unwrap();
        store.put_bytes(&key.payload_object(), b"MODEL").await.unwrap();
        store
            .put_bytes(&key.metadata_object(), b"{\"namespace\": 3")
            .await
            .unwrap();
        let err = cache.lookup_key(&key).await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_store_propagates() {
        let (cache, store) = cache();
        store.set_unavailable(true);
        let err = cache.lookup("models/rf", &params(), None).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (cache, store) = cache();
        store.fail_next(1);
        let result = cache.lookup("models/rf", &params(), None).await.unwrap();
        assert!(!result.hit);
    }

    #[tokio::test]
    async fn test_invalid_namespace_rejected_before_store_access() {
        let (cache, store) = cache();
        store.set_unavailable(true);
        let err = cache.lookup("../etc", &params(), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidNamespace { .. }));
    }

    #[tokio::test]
    async fn test_republish_overwrites() {
        let (cache, _) = cache();
        let k1 = cache
            .publish("models/rf", &params(), None, b"V1", Metadata::new())
            .await
            .unwrap();
        let k2 = cache
            .publish("models/rf", &params(), None, b"V2", metrics())
            .await
            .unwrap();
        assert_eq!(k1, k2);
        assert_eq!(cache.fetch_payload(&k1).await.unwrap(), b"V2");
        let entry = cache.lookup_key(&k1).await.unwrap().entry.unwrap();
        assert_eq!(entry.metadata("r2_score"), Some(&json!(0.87)));
    }

    #[tokio::test]
    async fn test_fetch_verified_detects_tampering() {
        let (cache, store) = cache();
        let key = cache
            .publish("models/rf", &params(), None, b"MODEL", Metadata::new())
            .await
            .unwrap();
        let entry = cache.lookup_key(&key).await.unwrap().entry.unwrap();
        assert_eq!(cache.fetch_verified(&entry).await.unwrap(), b"MODEL");

        store.put_bytes(&key.payload_object(), b"MODEX").await.unwrap();
        let err = cache.fetch_verified(&entry).await.unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
    }

    #[tokio::test]
    async fn test_fetch_verified_to_writes_nothing_on_mismatch() {
        let (cache, store) = cache();
        let key = cache
            .publish("models/rf", &params(), None, b"MODEL", Metadata::new())
            .await
            .unwrap();
        let entry = cache.lookup_key(&key).await.unwrap().entry.unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("model.pkl");

        store.put_bytes(&key.payload_object(), b"TAMPERED").await.unwrap();
        assert!(cache.fetch_verified_to(&entry, &target).await.is_err());
        assert!(!target.exists());

        store.put_bytes(&key.payload_object(), b"MODEL").await.unwrap();
        assert_eq!(cache.fetch_verified_to(&entry, &target).await.unwrap(), 5);
        assert_eq!(std::fs::read(&target).unwrap(), b"MODEL");
    }

    #[tokio::test]
    async fn test_fetch_missing_payload_is_not_found() {
        let (cache, _) = cache();
        let key = CacheKey::build("models/rf", &params(), None).unwrap();
        assert!(cache.fetch_payload(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_manifest_roundtrips_through_json() {
        let manifest = EntryManifest {
            namespace: "models/rf".into(),
            params: params(),
            params_fingerprint: Fingerprint::of_bytes(b"p"),
            data_fingerprint: None,
            created_at: Utc::now(),
            payload_size: 3,
            payload_sha256: Fingerprint::of_bytes(b"abc"),
            tool_version: "0.1.0".into(),
            metadata: metrics(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("data_fingerprint").is_none());
        let back: EntryManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }
}
