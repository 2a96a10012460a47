//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Namespace rejected by validation
    #[error("Invalid cache namespace '{namespace}': {reason}")]
    #[diagnostic(
        code(pipecache::cache::invalid_namespace),
        help("Namespaces may contain ASCII letters, digits, '-', '_', '.' and '/' separated segments")
    )]
    InvalidNamespace {
        /// The namespace as supplied by the caller
        namespace: String,
        /// Why it was rejected
        reason: String,
    },

    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(pipecache::cache::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create")
        operation: String,
    },

    /// Object not present in the store
    #[error("Object not found: {key}")]
    #[diagnostic(
        code(pipecache::cache::not_found),
        help("The entry was never published or has been removed out of band")
    )]
    NotFound {
        /// The object key that was not found
        key: String,
    },

    /// Transport or connectivity failure talking to the store
    #[error("Object store unavailable during {operation}: {message}")]
    #[diagnostic(
        code(pipecache::cache::store_unavailable),
        help("Check the endpoint URL, credentials and network reachability of the object store")
    )]
    StoreUnavailable {
        /// Store operation that failed (e.g., "exists", "put", "get")
        operation: String,
        /// Object key involved, if any
        key: Option<String>,
        /// Description of the failure
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(pipecache::cache::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// Payload does not match the digest recorded in its manifest
    #[error("Integrity check failed for {key}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(pipecache::cache::integrity),
        help("The payload object was modified after publish; republish the entry")
    )]
    Integrity {
        /// Cache key of the entry
        key: String,
        /// Value recorded in the manifest
        expected: String,
        /// Value computed from the downloaded payload
        actual: String,
    },

    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(pipecache::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },
}

impl Error {
    /// Create an invalid namespace error
    #[must_use]
    pub fn invalid_namespace(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNamespace {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a store unavailable error for an operation on a key
    #[must_use]
    pub fn store_unavailable(
        operation: impl Into<String>,
        key: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::StoreUnavailable {
            operation: operation.into(),
            key: key.map(str::to_string),
            message: message.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an integrity error
    #[must_use]
    pub fn integrity(
        key: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            key: key.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Whether retrying the same call could succeed
    ///
    /// Only transport failures qualify. Missing objects and malformed
    /// payloads are deterministic outcomes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Whether this error means the store answered "no such object"
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
