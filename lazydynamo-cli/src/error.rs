use colored::Colorize;
use std::fmt;
use std::process;

/// Exit codes for the CLI.
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Unified error type for CLI operations.
pub enum CliError {
    /// A background fetch failed.
    Fetch(lazydynamo_core::FetchError),
    /// DynamoDB client could not be built.
    Aws(lazydynamo_aws::AwsError),
    /// Local cache maintenance failed.
    Cache(lazydynamo_core::CacheError),
    /// Configuration issues.
    Config(String),
    /// Table not found.
    TableNotFound(String),
    /// Argument / usage errors.
    Usage(String),
    /// I/O and encoding errors while writing output.
    Output(String),
    /// Session driven out of order.
    Internal(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Fetch(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Aws(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Cache(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Config(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::TableNotFound(name) => write!(
                f,
                "{} table '{name}' not found\n  {} run 'lazydynamo tables' to list tables",
                "error:".red().bold(),
                "help:".cyan().bold(),
            ),
            CliError::Usage(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Output(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Internal(msg) => write!(f, "{} internal: {msg}", "error:".red().bold()),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<lazydynamo_core::FetchError> for CliError {
    fn from(e: lazydynamo_core::FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<lazydynamo_aws::AwsError> for CliError {
    fn from(e: lazydynamo_aws::AwsError) -> Self {
        CliError::Aws(e)
    }
}

impl From<lazydynamo_core::CacheError> for CliError {
    fn from(e: lazydynamo_core::CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(format!("JSON error: {e}"))
    }
}

/// Print error and exit with the appropriate code.
pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    let code = match &err {
        CliError::Usage(_) => EXIT_USAGE,
        _ => EXIT_ERROR,
    };
    process::exit(code)
}

pub type CliResult<T> = std::result::Result<T, CliError>;
