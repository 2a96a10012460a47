//! CLI error types with exit code mapping

use miette::Diagnostic;
use thiserror::Error;

/// Success exit code
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Cache or store error exit code
pub const EXIT_CACHE: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(pipecache::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// Error raised by the cache or its store (exit code 3)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] pipecache_cache::Error),

    /// File operation failed (exit code 2)
    #[error("Failed to {operation} {}", path.display())]
    #[diagnostic(
        code(pipecache::cli::file_error),
        help("Check file permissions and ensure the path exists")
    )]
    File {
        /// Operation that failed
        operation: String,
        /// Path involved
        path: std::path::PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a file error
    #[must_use]
    pub fn file(
        operation: impl Into<String>,
        path: impl Into<std::path::PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::File {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::File { .. } => EXIT_CLI,
            Self::Cache(
                pipecache_cache::Error::InvalidNamespace { .. }
                | pipecache_cache::Error::Configuration { .. },
            ) => EXIT_CLI,
            Self::Cache(_) => EXIT_CACHE,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
