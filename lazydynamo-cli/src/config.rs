//! Configuration: `~/.lazydynamo/config.toml`, command-line overrides, defaults
//!
//! Precedence is flag > file > default. Every key is optional:
//!
//! ```toml
//! region = "eu-west-1"
//! endpoint = "http://localhost:4566"
//! cache_dir = "/tmp/lazydynamo-cache"
//! cache_ttl_hours = 72
//! segments = "half"        # "all", "half" or a number
//! page_size = 100
//! scan_timeout_secs = 120
//! max_attempts = 5
//! binary_encoding = "base64"   # or "bytes"
//! refresh_wait_secs = 10       # how long to let background cache refreshes finish at exit
//! ```

use crate::cli::Cli;
use crate::error::{CliError, CliResult};
use lazydynamo_aws::{DynamoDbConfig, DEFAULT_MAX_ATTEMPTS};
use lazydynamo_core::{
    BinaryEncoding, ScanConfig, SegmentPolicy, DEFAULT_CACHE_TTL, DEFAULT_PAGE_SIZE,
    DEFAULT_SCAN_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LAZYDYNAMO_DIR: &str = ".lazydynamo";
const CONFIG_FILE: &str = "config.toml";
const CACHE_DIR: &str = "cache";

pub const DEFAULT_REGION: &str = "us-east-1";

/// Upper bound on waiting for background cache refreshes before exit.
pub const DEFAULT_REFRESH_WAIT: Duration = Duration::from_secs(10);

/// Contents of `config.toml`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl_hours: Option<u64>,
    pub segments: Option<String>,
    pub page_size: Option<i32>,
    pub scan_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub binary_encoding: Option<String>,
    pub refresh_wait_secs: Option<u64>,
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub segments: Option<SegmentPolicy>,
}

impl Overrides {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            region: cli.region.clone(),
            endpoint: cli.endpoint_url.clone(),
            cache_dir: cli.cache_dir.clone(),
            segments: None,
        }
    }
}

/// Effective configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub region: String,
    pub endpoint: Option<String>,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub scan: ScanConfig,
    pub max_attempts: u32,
    pub binary_encoding: BinaryEncoding,
    pub refresh_wait: Duration,
}

/// `~/.lazydynamo`
pub fn lazydynamo_dir() -> CliResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(LAZYDYNAMO_DIR))
        .ok_or_else(|| CliError::Config("cannot determine home directory".to_string()))
}

/// Config file location, honouring a `--config` override
pub fn config_path(config_override: Option<&Path>) -> CliResult<PathBuf> {
    match config_override {
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(lazydynamo_dir()?.join(CONFIG_FILE)),
    }
}

/// Read `path`; a missing file is an empty config
pub fn load_file(path: &Path) -> CliResult<FileConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(e) => {
            return Err(CliError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };
    toml::from_str(&content)
        .map_err(|e| CliError::Config(format!("failed to parse {}: {e}", path.display())))
}

impl Settings {
    /// Load the config file and apply command-line overrides
    pub fn load(cli: &Cli) -> CliResult<Self> {
        let path = config_path(cli.config.as_deref())?;
        let file = load_file(&path)?;
        Self::from_parts(path, file, Overrides::from_cli(cli), &lazydynamo_dir()?)
    }

    /// Combine a parsed file and overrides; `home` is the `~/.lazydynamo` directory
    pub fn from_parts(
        config_path: PathBuf,
        file: FileConfig,
        overrides: Overrides,
        home: &Path,
    ) -> CliResult<Self> {
        let segments = match (overrides.segments, file.segments.as_deref()) {
            (Some(policy), _) => policy,
            (None, Some(raw)) => raw
                .parse()
                .map_err(|e: String| CliError::Config(format!("segments: {e}")))?,
            (None, None) => SegmentPolicy::default(),
        };

        let page_size = file.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size < 1 {
            return Err(CliError::Config("page_size must be at least 1".to_string()));
        }

        let binary_encoding = match file.binary_encoding.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| CliError::Config(format!("binary_encoding: {e}")))?,
            None => BinaryEncoding::default(),
        };

        let scan = ScanConfig::default()
            .with_segments(segments)
            .with_page_size(page_size)
            .with_timeout(
                file.scan_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_SCAN_TIMEOUT),
            );

        Ok(Self {
            config_path,
            region: overrides
                .region
                .or(file.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: overrides.endpoint.or(file.endpoint),
            cache_dir: overrides
                .cache_dir
                .or(file.cache_dir)
                .unwrap_or_else(|| home.join(CACHE_DIR)),
            cache_ttl: file
                .cache_ttl_hours
                .map(|h| Duration::from_secs(h * 60 * 60))
                .unwrap_or(DEFAULT_CACHE_TTL),
            scan,
            max_attempts: file.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            binary_encoding,
            refresh_wait: file
                .refresh_wait_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REFRESH_WAIT),
        })
    }

    pub fn dynamodb_config(&self) -> DynamoDbConfig {
        DynamoDbConfig {
            region: Some(self.region.clone()),
            endpoint: self.endpoint.clone(),
            timeout_ms: None,
            max_attempts: self.max_attempts,
        }
    }

    /// Rows for `config show`
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("config_path", self.config_path.display().to_string()),
            ("region", self.region.clone()),
            (
                "endpoint",
                self.endpoint.clone().unwrap_or_else(|| "(default)".to_string()),
            ),
            ("cache_dir", self.cache_dir.display().to_string()),
            (
                "cache_ttl_hours",
                (self.cache_ttl.as_secs() / 3600).to_string(),
            ),
            ("segments", self.scan.segments.to_string()),
            ("page_size", self.scan.page_size.to_string()),
            ("scan_timeout_secs", self.scan.timeout.as_secs().to_string()),
            ("max_attempts", self.max_attempts.to_string()),
            ("binary_encoding", self.binary_encoding.to_string()),
            ("refresh_wait_secs", self.refresh_wait.as_secs().to_string()),
        ]
    }
}
