//! Command line definition

use crate::commands::gate::Polarity;
use crate::config::Backend;
use crate::errors::{CliError, CliResult};
use crate::tracing::{LogLevel, TracingConfig, TracingFormat};
use clap::{Args, Parser, Subcommand};
use pipecache_cache::{ParamValue, Params};
use std::path::PathBuf;

/// Exit code Airflow's `BashOperator` treats as "skipped"
pub const DEFAULT_SKIP_EXIT_CODE: i32 = 99;

/// Top-level arguments
#[derive(Parser, Debug)]
#[command(name = "pipecache")]
#[command(about = "Skip expensive pipeline steps whose results are already cached")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Log level for pipecache crates when `RUST_LOG` is unset
    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log line format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "compact",
        help = "Log output format"
    )]
    pub log_format: TracingFormat,

    /// Shorthand for `--log-format json`
    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,

    /// Filter directives, overriding `RUST_LOG` and `--level`
    #[arg(
        long,
        global = true,
        value_name = "DIRECTIVES",
        help = "Tracing filter, e.g. pipecache_s3=debug"
    )]
    pub log_filter: Option<String>,

    /// Optional TOML configuration file
    #[arg(
        long,
        global = true,
        env = "PIPECACHE_CONFIG",
        help = "Path to a TOML configuration file"
    )]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Logging setup requested on the command line
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: if self.json {
                TracingFormat::Json
            } else {
                self.log_format
            },
            level: self.level.into(),
            filter: self.log_filter.clone(),
        }
    }
}

/// Which cache entry a command refers to
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Logical namespace of the entry
    #[arg(long, short = 'n', help = "Logical namespace, e.g. models/random_forest")]
    pub namespace: String,

    /// `NAME=VALUE` parameters
    #[arg(
        long = "param",
        short = 'p',
        value_name = "NAME=VALUE",
        value_parser = parse_param,
        help = "Parameter (repeatable); values are typed as int, float, bool, null or string"
    )]
    pub params: Vec<(String, ParamValue)>,

    /// Parameters given as one JSON object
    #[arg(long, value_name = "JSON", help = "Parameters as a flat JSON object")]
    pub params_json: Option<String>,

    /// Data file fingerprinted into the key
    #[arg(long, help = "Data file whose content is part of the key")]
    pub data: Option<PathBuf>,
}

impl KeyArgs {
    /// Merge `--params-json` and `--param` into one set; `--param` wins
    pub fn params(&self) -> CliResult<Params> {
        let mut params = match &self.params_json {
            Some(json) => serde_json::from_str::<Params>(json).map_err(|e| {
                CliError::config_with_help(
                    format!("Invalid --params-json: {e}"),
                    "Pass a flat JSON object of scalars, e.g. '{\"max_depth\": 10}'",
                )
            })?,
            None => Params::new(),
        };
        for (name, value) in &self.params {
            params.insert(name.clone(), value.clone());
        }
        Ok(params)
    }
}

/// Where the cache lives
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Store backend
    #[arg(long, value_enum, env = "PIPECACHE_BACKEND", help = "Store backend [default: s3]")]
    pub backend: Option<Backend>,

    /// Root directory of the local backend
    #[arg(
        long,
        env = "PIPECACHE_LOCAL_ROOT",
        help = "Root directory for the local backend"
    )]
    pub root: Option<PathBuf>,

    /// S3 bucket
    #[arg(long, help = "Bucket name (overrides PIPECACHE_BUCKET)")]
    pub bucket: Option<String>,

    /// S3 endpoint
    #[arg(long, help = "S3 endpoint URL (overrides MLFLOW_S3_ENDPOINT_URL)")]
    pub endpoint_url: Option<String>,

    /// Attempts per store call
    #[arg(long, help = "Attempts per store call, including the first")]
    pub max_attempts: Option<usize>,
}

/// pipecache subcommands
// flattened argument groups carry no doc comment of their own
#[allow(missing_docs)]
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the cache key
    #[command(about = "Print the cache key for a namespace, parameters and data file")]
    Key {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Look up an entry
    #[command(about = "Look up an entry and print a JSON summary")]
    Check {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Gate the expensive step
    #[command(about = "Decide whether the expensive step must run")]
    Gate {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        store: StoreArgs,
        /// Meaning of the printed boolean
        #[arg(
            long,
            value_enum,
            default_value = "continue-if-true",
            help = "Meaning of the printed boolean for the orchestrator"
        )]
        polarity: Polarity,
        /// Report through the exit code
        #[arg(long, help = "Report through the exit code instead of stdout")]
        exit_code: bool,
        /// Exit code for "skip"
        #[arg(
            long,
            default_value_t = DEFAULT_SKIP_EXIT_CODE,
            help = "Exit code meaning \"skip\" with --exit-code"
        )]
        skip_exit_code: i32,
    },
    /// Publish a new entry
    #[command(about = "Publish a payload file and its metadata")]
    Publish {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        store: StoreArgs,
        /// Payload file
        #[arg(long, help = "File holding the payload")]
        payload: PathBuf,
        /// Metadata JSON, inline or `@file`
        #[arg(
            long,
            value_name = "JSON|@FILE",
            help = "Metadata JSON object, inline or @path"
        )]
        metadata: Option<String>,
    },
    /// Download a cached payload
    #[command(about = "Download the cached payload to a file")]
    Fetch {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        store: StoreArgs,
        /// Destination file
        #[arg(long, short = 'o', help = "Destination file")]
        output: PathBuf,
        /// Verify size and digest
        #[arg(long, help = "Check size and digest against the manifest")]
        verify: bool,
    },
}

fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name is empty in '{raw}'"));
    }
    let value = ParamValue::infer(value).map_err(|e| e.to_string())?;
    Ok((name.to_string(), value))
}

/// Parse the process arguments, exiting on usage errors
pub fn parse() -> Cli {
    Cli::parse()
}
