//! pipecache command line interface
//!
//! Wires the artifact cache into an orchestrator: `gate` tells a
//! conditional step whether to run, `publish` stores the result, `fetch`
//! materializes a cached result for the next step.

#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod tracing;

use crate::cli::{Cli, Commands};
use crate::commands::CommandOutput;
use crate::config::FileConfig;
use crate::errors::CliResult;
use ::tracing::Instrument;

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Key { .. } => "key",
        Commands::Check { .. } => "check",
        Commands::Gate { .. } => "gate",
        Commands::Publish { .. } => "publish",
        Commands::Fetch { .. } => "fetch",
    }
}

/// Load configuration and run the parsed command
pub async fn run(cli: Cli) -> CliResult<CommandOutput> {
    let file = FileConfig::load(cli.config.as_deref())?;
    let span = ::tracing::info_span!(
        "command",
        command = command_name(&cli.command),
        run_id = %crate::tracing::run_id(),
    );
    commands::execute(cli.command, &file).instrument(span).await
}
