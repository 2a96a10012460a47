//! `pipecache gate`: the orchestrator adapter
//!
//! The cache answers "should the expensive step run". Orchestrators phrase
//! their conditional primitive differently: Airflow's `ShortCircuitOperator`
//! continues downstream when the callable returns true, other tools skip
//! when a flag is true. The inversion happens here and nowhere else.

use crate::cli::{KeyArgs, StoreArgs};
use crate::commands::{CommandOutput, open_cache};
use crate::config::FileConfig;
use crate::errors::{CliResult, EXIT_OK};
use pipecache_cache::GateDecision;
use tracing::info;

/// Meaning of the boolean printed for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Polarity {
    /// `true` means "continue to the expensive step" (Airflow `ShortCircuitOperator`)
    ContinueIfTrue,
    /// `true` means "skip the expensive step"
    SkipIfTrue,
}

impl Polarity {
    /// Translate a run/skip decision into this polarity
    #[must_use]
    pub const fn render(self, should_run: bool) -> bool {
        match self {
            Self::ContinueIfTrue => should_run,
            Self::SkipIfTrue => !should_run,
        }
    }
}

/// How the decision is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Print `true` / `false` on stdout and exit 0
    Stdout(Polarity),
    /// Print nothing; exit 0 to run, `skip_exit_code` to skip
    ExitCode {
        /// Exit code signalling "skip"
        skip_exit_code: i32,
    },
}

/// Render a decision for the orchestrator
#[must_use]
pub fn render(decision: &GateDecision, mode: OutputMode) -> CommandOutput {
    let should_run = decision.should_run();
    match mode {
        OutputMode::Stdout(polarity) => CommandOutput::text(polarity.render(should_run).to_string()),
        OutputMode::ExitCode { skip_exit_code } => CommandOutput {
            stdout: String::new(),
            exit_code: if should_run { EXIT_OK } else { skip_exit_code },
        },
    }
}

/// Look up the entry and report whether the step must run
///
/// A store that cannot be reached, including one that fails while the
/// bucket is being bootstrapped, yields "run".
pub async fn execute(
    key: &KeyArgs,
    store: &StoreArgs,
    file: &FileConfig,
    mode: OutputMode,
) -> CliResult<CommandOutput> {
    let params = key.params()?;
    let lookup = match open_cache(store, file).await {
        Ok(cache) => {
            cache
                .lookup(&key.namespace, &params, key.data.as_deref())
                .await
        }
        Err(err) => Err(err),
    };
    let decision = GateDecision::from_lookup(lookup)?;
    match &decision {
        GateDecision::Run { reason } => info!(namespace = %key.namespace, %reason, "Gate: run"),
        GateDecision::Skip { key } => info!(%key, "Gate: skip"),
    }
    Ok(render(&decision, mode))
}
