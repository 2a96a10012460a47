//! Filesystem object store
//!
//! Objects live under a root directory at the relative path given by their
//! key. Writes land in a temporary file in the target directory and are then
//! renamed into place, so a concurrent reader sees either the old object, the
//! new one, or nothing.

use crate::store::ObjectStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root` (the directory is created lazily)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the store and its root directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        store.ensure_bucket_exists().await?;
        Ok(store)
    }

    /// Root directory of the store
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let clean = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::configuration(format!(
                "object key '{key}' does not map to a path inside the store"
            )));
        }
        Ok(self.root.join(rel))
    }
}

fn unavailable(operation: &str, key: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::store_unavailable(
        operation,
        Some(key),
        format!("{}: {err}", path.display()),
    )
}

pub(crate) fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "object path has no parent"))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn location(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }

    async fn ensure_bucket_exists(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| {
                Error::store_unavailable(
                    "ensure_bucket",
                    None,
                    format!("{}: {e}", self.root.display()),
                )
            })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable("exists", key, &path, &e)),
        }
    }

    async fn put_bytes(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        let target = path.clone();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || write_atomically(&target, &data))
            .await
            .map_err(|e| Error::store_unavailable("put", Some(key), format!("writer task failed: {e}")))?
            .map_err(|e| unavailable("put", key, &path, &e))?;
        tracing::debug!(key, path = %path.display(), "Wrote object");
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found(key)),
            Err(e) => Err(unavailable("get", key, &path, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("cache/bucket");
        let store = LocalStore::open(&root).await.unwrap();
        assert!(store.root().is_dir());
        // second call is a no-op
        store.ensure_bucket_exists().await.unwrap();
    }

    #[tokio::test]
    async fn test_unusable_root_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let err = LocalStore::open(blocker.join("bucket")).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_nested_keys_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path()).await.unwrap();
        store
            .put_bytes("models/rf_abc.bin", b"MODEL")
            .await
            .unwrap();
        assert!(store.exists("models/rf_abc.bin").await.unwrap());
        assert_eq!(store.get_bytes("models/rf_abc.bin").await.unwrap(), b"MODEL");
        assert!(temp.path().join("models/rf_abc.bin").is_file());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path()).await.unwrap();
        store.put_bytes("k", b"first").await.unwrap();
        store.put_bytes("k", b"second").await.unwrap();
        assert_eq!(store.get_bytes("k").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path()).await.unwrap();
        store.put_bytes("ns/obj", b"x").await.unwrap();
        let names: Vec<_> = std::fs::read_dir(temp.path().join("ns"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("obj")]);
    }

    #[tokio::test]
    async fn test_missing_and_traversal() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path()).await.unwrap();
        assert!(!store.exists("nope").await.unwrap());
        assert!(store.get_bytes("nope").await.unwrap_err().is_not_found());

        for bad in ["../escape", "/etc/passwd", "a/../../b", ""] {
            let err = store.exists(bad).await.unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_directory_is_not_an_object() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path()).await.unwrap();
        std::fs::create_dir_all(temp.path().join("models")).unwrap();
        assert!(!store.exists("models").await.unwrap());
    }
}
