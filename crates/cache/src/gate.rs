//! Run/skip decision for an expensive pipeline step
//!
//! The gate fails open: if the cache cannot answer, the step runs.

use crate::artifact::LookupResult;
use crate::key::CacheKey;
use crate::{Error, Result};
use std::fmt;
use tracing::{info, warn};

/// Why the expensive step has to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    /// No complete entry for the key
    Miss,
    /// The store could not be consulted
    CacheUnavailable,
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "cache miss"),
            Self::CacheUnavailable => write!(f, "cache unavailable"),
        }
    }
}

/// Outcome of gating a step on the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the expensive step
    Run {
        /// Why the step runs
        reason: RunReason,
    },
    /// Skip the step and reuse the cached entry
    Skip {
        /// Key of the cached entry to reuse
        key: CacheKey,
    },
}

impl GateDecision {
    /// Build a decision from a lookup outcome
    ///
    /// Store failures and unreadable entries become
    /// [`RunReason::CacheUnavailable`]. Errors that indicate a caller bug,
    /// such as an invalid namespace or a missing data file, are returned.
    pub fn from_lookup(lookup: Result<LookupResult>) -> Result<Self> {
        match lookup {
            Ok(result) if result.hit => {
                info!(key = %result.key, "Cached artifact found, skipping step");
                Ok(Self::Skip { key: result.key })
            }
            Ok(result) => {
                info!(key = %result.key, "No cached artifact, running step");
                Ok(Self::Run {
                    reason: RunReason::Miss,
                })
            }
            Err(
                err @ (Error::StoreUnavailable { .. }
                | Error::Serialization { .. }
                | Error::Integrity { .. }),
            ) => {
                warn!(error = %err, "Cache check failed, running step");
                Ok(Self::Run {
                    reason: RunReason::CacheUnavailable,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Whether the expensive step should run
    #[must_use]
    pub const fn should_run(&self) -> bool {
        matches!(self, Self::Run { .. })
    }
}

/// Decide whether to run the expensive step
///
/// `Ok(true)` means run. A hit is the only outcome that yields `Ok(false)`.
/// Store failures fail open like [`GateDecision::from_lookup`]; caller
/// errors are returned unchanged.
pub fn should_run_expensive_step(lookup: Result<LookupResult>) -> Result<bool> {
    GateDecision::from_lookup(lookup).map(|decision| decision.should_run())
}
