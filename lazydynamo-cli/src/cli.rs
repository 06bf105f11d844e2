use clap::{Parser, Subcommand, ValueEnum};
use lazydynamo_core::SegmentPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lazydynamo", about = "Terminal browser for DynamoDB tables", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to config file (default: ~/.lazydynamo/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// AWS region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// DynamoDB endpoint URL override (e.g. LocalStack)
    #[arg(long = "endpoint-url", global = true)]
    pub endpoint_url: Option<String>,

    /// Cache directory (default: ~/.lazydynamo/cache)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tables
    Tables {
        /// Fuzzy filter (case-insensitive, characters in order)
        #[arg(long, short = 'f')]
        filter: Option<String>,

        /// Ignore the cache and fetch from DynamoDB
        #[arg(long)]
        refresh: bool,
    },

    /// Read every row of a table
    Scan {
        /// Table name
        table: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = ScanFormat::Lines)]
        format: ScanFormat,

        /// Pretty-print only the row at this index
        #[arg(long)]
        inspect: Option<usize>,

        /// Ignore the cache and scan DynamoDB
        #[arg(long)]
        refresh: bool,

        /// Scan segments: "half", "all", or a number
        #[arg(long)]
        segments: Option<SegmentPolicy>,
    },

    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanFormat {
    /// One compact JSON document per line
    Lines,
    /// A pretty-printed JSON array
    Json,
    /// A table with one column per attribute
    Table,
    /// CSV with one column per attribute
    Csv,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached resources
    List,

    /// Remove cached resources (everything by default)
    Clear {
        /// Only this table's rows
        #[arg(long, conflicts_with = "collections")]
        table: Option<String>,

        /// Only the table list
        #[arg(long)]
        collections: bool,
    },

    /// Print the cache directory
    Path,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,
}
