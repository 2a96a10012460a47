//! Cache key derivation
//!
//! A key has the form `<namespace>_<params>[_<data>]` where both fingerprints
//! are hex digests. The payload and the manifest of an entry live in sibling
//! objects named `<key>.bin` and `<key>.json`.

use crate::hash::{FINGERPRINT_HEX_LEN, Fingerprint, Params, fingerprint_file, fingerprint_params};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Suffix of the payload object
pub const PAYLOAD_SUFFIX: &str = ".bin";
/// Suffix of the manifest object
pub const METADATA_SUFFIX: &str = ".json";

const MAX_NAMESPACE_LEN: usize = 512;

/// Opaque identifier of one (namespace, params, data) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey {
    namespace: String,
    params_fingerprint: Fingerprint,
    data_fingerprint: Option<Fingerprint>,
    rendered: String,
}

impl CacheKey {
    /// Derive the key for a namespace, parameter set and optional data file
    ///
    /// The data file is only read when `data_path` is given.
    pub fn build(namespace: &str, params: &Params, data_path: Option<&Path>) -> Result<Self> {
        validate_namespace(namespace)?;
        let params_fingerprint = fingerprint_params(params)?;
        let data_fingerprint = data_path.map(fingerprint_file).transpose()?;
        Ok(Self::from_parts(namespace, params_fingerprint, data_fingerprint))
    }

    fn from_parts(
        namespace: &str,
        params_fingerprint: Fingerprint,
        data_fingerprint: Option<Fingerprint>,
    ) -> Self {
        let rendered = match &data_fingerprint {
            Some(data) => format!("{namespace}_{params_fingerprint}_{data}"),
            None => format!("{namespace}_{params_fingerprint}"),
        };
        Self {
            namespace: namespace.to_string(),
            params_fingerprint,
            data_fingerprint,
            rendered,
        }
    }

    /// Parse a rendered key back into its parts
    ///
    /// Trailing `_<digest>` segments are taken as fingerprints, the rest is
    /// the namespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let (head, last) = split_fingerprint(raw).ok_or_else(|| {
            Error::serialization(format!("'{raw}' does not end with a fingerprint"))
        })?;
        let (namespace, params, data) = match split_fingerprint(head) {
            Some((namespace, params)) => (namespace, params, Some(last)),
            None => (head, last, None),
        };
        validate_namespace(namespace)?;
        Ok(Self::from_parts(namespace, params, data))
    }

    /// The logical namespace
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fingerprint of the canonical parameter set
    #[must_use]
    pub const fn params_fingerprint(&self) -> &Fingerprint {
        &self.params_fingerprint
    }

    /// Fingerprint of the data file, if the key covers one
    #[must_use]
    pub const fn data_fingerprint(&self) -> Option<&Fingerprint> {
        self.data_fingerprint.as_ref()
    }

    /// The rendered key string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Object key of the binary payload
    #[must_use]
    pub fn payload_object(&self) -> String {
        format!("{}{PAYLOAD_SUFFIX}", self.rendered)
    }

    /// Object key of the JSON manifest
    #[must_use]
    pub fn metadata_object(&self) -> String {
        format!("{}{METADATA_SUFFIX}", self.rendered)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.rendered
    }
}

fn split_fingerprint(raw: &str) -> Option<(&str, Fingerprint)> {
    let (head, tail) = raw.rsplit_once('_')?;
    if head.is_empty() || tail.len() != FINGERPRINT_HEX_LEN {
        return None;
    }
    Fingerprint::from_hex(tail).ok().map(|fp| (head, fp))
}

/// Check that a namespace is usable as an object key prefix
///
/// Allowed: ASCII letters, digits, `-`, `_`, `.`, and `/` between non-empty
/// segments. Rejected: `.`/`..` segments, leading or trailing `/`, empty
/// segments, anything longer than 512 bytes, and a trailing
/// `_<fingerprint>` that [`CacheKey::parse`] could not tell apart from a key
/// component.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    let reject = |reason: &str| -> Result<()> { Err(Error::invalid_namespace(namespace, reason)) };

    if namespace.is_empty() {
        return reject("namespace is empty");
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return reject("namespace exceeds 512 bytes");
    }
    if let Some(c) = namespace
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Err(Error::invalid_namespace(
            namespace,
            format!("character {c:?} is not allowed"),
        ));
    }
    if namespace.starts_with('/') {
        return reject("namespace must not start with '/'");
    }
    if namespace.ends_with('/') {
        return reject("namespace must not end with '/'");
    }
    if split_fingerprint(namespace).is_some() {
        return reject("namespace must not end with '_' followed by a fingerprint");
    }
    for segment in namespace.split('/') {
        match segment {
            "" => return reject("namespace contains an empty path segment"),
            "." | ".." => return reject("namespace contains a relative path segment"),
            _ => {}
        }
    }
    Ok(())
}
