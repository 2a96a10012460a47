//! Content-addressed artifact cache for pipeline steps
//!
//! This crate lets an orchestrated pipeline skip an expensive step (model
//! training, feature extraction) when its result for the same inputs is
//! already stored in an object store:
//! - Deterministic fingerprints of parameter sets and data files
//! - Cache keys of the form `<namespace>_<params>[_<data>]`
//! - Two-object entries (payload + JSON manifest) with manifest-last commit
//! - A fail-open run/skip decision for the orchestrator
//!
//! # Overview
//!
//! ```text
//! step -> GateDecision(ArtifactCache::lookup(ns, params, data))
//!      -> hit:  skip, fetch payload
//!      -> miss: run, ArtifactCache::publish(result)
//! ```
//!
//! Stores implement [`ObjectStore`]. [`MemoryStore`] and [`LocalStore`] live
//! here; the S3 backend is in `pipecache-s3`.

// TODO(cache-docs): Add # Errors documentation to all fallible public functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod artifact;
mod error;
pub mod gate;
pub mod hash;
pub mod key;
pub mod local;
pub mod memory;
pub mod retry;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use artifact::{ArtifactCache, CacheEntry, EntryManifest, LookupResult, Metadata};
pub use gate::{GateDecision, RunReason, should_run_expensive_step};
pub use hash::{Fingerprint, ParamValue, Params, fingerprint_file, fingerprint_params};
pub use key::{CacheKey, validate_namespace};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use retry::{RetryConfig, retry_with_backoff};
pub use store::ObjectStore;
