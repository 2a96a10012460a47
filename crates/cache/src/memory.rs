//! In-process object store
//!
//! Backs tests and dry runs. Supports simple fault injection so callers can
//! exercise the unavailable-store paths without a network.

use crate::store::ObjectStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    reads: HashMap<String, usize>,
    unavailable: bool,
    fail_next: usize,
    reject_put_suffix: Option<String>,
}

/// Object store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent call fail with [`Error::StoreUnavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Fail the next `n` calls with [`Error::StoreUnavailable`], then recover
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Fail every `put_bytes` whose key ends with `suffix`
    pub fn fail_puts_ending_with(&self, suffix: &str) {
        self.lock().reject_put_suffix = Some(suffix.to_string());
    }

    /// Number of `get_bytes` calls made for `key`
    #[must_use]
    pub fn reads(&self, key: &str) -> usize {
        self.lock().reads.get(key).copied().unwrap_or(0)
    }

    /// Keys currently stored, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove an object, returning whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.lock().objects.remove(key).is_some()
    }

    fn check(state: &mut State, operation: &str, key: &str) -> Result<()> {
        if state.unavailable {
            return Err(Error::store_unavailable(
                operation,
                Some(key),
                "memory store marked unavailable",
            ));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::store_unavailable(
                operation,
                Some(key),
                "injected transient failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }

    async fn ensure_bucket_exists(&self) -> Result<()> {
        let mut state = self.lock();
        Self::check(&mut state, "ensure_bucket", "")
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut state = self.lock();
        Self::check(&mut state, "exists", key)?;
        Ok(state.objects.contains_key(key))
    }

    async fn put_bytes(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        Self::check(&mut state, "put", key)?;
        if state
            .reject_put_suffix
            .as_deref()
            .is_some_and(|suffix| key.ends_with(suffix))
        {
            return Err(Error::store_unavailable(
                "put",
                Some(key),
                "injected write failure",
            ));
        }
        state.objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let mut state = self.lock();
        Self::check(&mut state, "get", key)?;
        *state.reads.entry(key.to_string()).or_default() += 1;
        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_exists() {
        let store = MemoryStore::new();
        assert!(!store.exists("a").await.unwrap());
        store.put_bytes("a", b"hello").await.unwrap();
        assert!(store.exists("a").await.unwrap());
        assert_eq!(store.get_bytes("a").await.unwrap(), b"hello");
        assert_eq!(store.reads("a"), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_bytes("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_json_roundtrip_and_malformed_json() {
        let store = MemoryStore::new();
        let value = serde_json::json!({"r2_score": 0.87});
        store.put_json("m.json", &value).await.unwrap();
        assert_eq!(store.get_json("m.json").await.unwrap(), value);

        store.put_bytes("bad.json", b"{not json").await.unwrap();
        let err = store.get_json("bad.json").await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_and_fail_next() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.exists("a").await.unwrap_err().is_retryable());
        store.set_unavailable(false);

        store.fail_next(2);
        assert!(store.exists("a").await.is_err());
        assert!(store.exists("a").await.is_err());
        assert!(store.exists("a").await.is_ok());
    }
}
