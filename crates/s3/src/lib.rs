//! S3-compatible object store backend for pipecache
//!
//! Provides [`S3Store`], an [`pipecache_cache::ObjectStore`] built on the AWS
//! SDK, and [`S3Config`], its connection settings with MinIO-friendly
//! defaults read from the environment.

#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod config;
pub mod store;

// Re-export main types for convenience
pub use config::S3Config;
pub use store::{FailureKind, S3Store, classify};
