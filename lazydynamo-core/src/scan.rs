//! Parallel segmented full-table scan
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       ScanEngine::scan_table                   │
//! │  describe ─▶ KeySchema                                         │
//! │  ┌───────────┐ ┌───────────┐       ┌───────────┐               │
//! │  │ segment 0 │ │ segment 1 │  ...  │ segment N │  (JoinSet)    │
//! │  └─────┬─────┘ └─────┬─────┘       └─────┬─────┘               │
//! │        │ pages       │ pages             │ pages               │
//! │        ▼             ▼                   ▼                     │
//! │   Mutex<Vec<Record>> accumulator   +   bounded error channel   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each segment worker pages through its own segment with a sanitized
//! continuation token until the service stops returning one. A failing worker
//! reports on the error channel and exits; siblings keep running. Once every
//! worker has finished, any reported error fails the whole scan and the
//! accumulated records are discarded.
//!
//! All page calls share one deadline taken when the scan starts.

use crate::error::{ScanError, ServiceError};
use crate::key_schema::{resolve_key_schema, KeySchema};
use crate::service::{ScanRequest, TableService};
use crate::value::Record;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// Records requested per page call.
pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// Deadline for a whole scan, shared by every segment.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(120);

/// How many scan segments to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SegmentPolicy {
    /// One segment per logical core
    AllCores,
    /// Half the logical cores, bounding connection concurrency
    #[default]
    HalfCores,
    /// Exact segment count
    Fixed(u32),
}

impl SegmentPolicy {
    /// Resolve against this machine's available parallelism
    pub fn resolve(&self) -> i32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        self.resolve_with(cores)
    }

    /// Resolve against a given core count; never less than 1
    pub fn resolve_with(&self, cores: usize) -> i32 {
        let n = match self {
            SegmentPolicy::AllCores => cores,
            SegmentPolicy::HalfCores => cores / 2,
            SegmentPolicy::Fixed(n) => *n as usize,
        };
        i32::try_from(n).unwrap_or(i32::MAX).max(1)
    }
}

impl FromStr for SegmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SegmentPolicy::AllCores),
            "half" => Ok(SegmentPolicy::HalfCores),
            other => match other.parse::<u32>() {
                Ok(0) => Err("segment count must be at least 1".to_string()),
                Ok(n) => Ok(SegmentPolicy::Fixed(n)),
                Err(_) => Err(format!(
                    "invalid segment policy '{s}' (expected 'all', 'half' or a number)"
                )),
            },
        }
    }
}

impl fmt::Display for SegmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentPolicy::AllCores => f.write_str("all"),
            SegmentPolicy::HalfCores => f.write_str("half"),
            SegmentPolicy::Fixed(n) => write!(f, "{n}"),
        }
    }
}

/// Scan tuning
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub segments: SegmentPolicy,
    /// Upper bound on records per page call
    pub page_size: i32,
    /// Deadline for the whole scan
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            segments: SegmentPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl ScanConfig {
    pub fn with_segments(mut self, segments: SegmentPolicy) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Full-table reader over a [`TableService`]
#[derive(Debug, Clone)]
pub struct ScanEngine {
    service: Arc<dyn TableService>,
    config: ScanConfig,
}

struct SegmentWorker {
    service: Arc<dyn TableService>,
    table: String,
    schema: Arc<KeySchema>,
    segment: i32,
    total_segments: i32,
    page_size: i32,
    deadline: Instant,
    timeout: Duration,
    records: Arc<Mutex<Vec<Record>>>,
    errors: mpsc::Sender<ScanError>,
}

impl ScanEngine {
    pub fn new(service: Arc<dyn TableService>, config: ScanConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Read every record of `table`
    ///
    /// Result order across segments is unspecified.
    pub async fn scan_table(&self, table: &str) -> Result<Vec<Record>, ScanError> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;

        let elements = timeout_at(deadline, self.service.describe_key_schema(table))
            .await
            .map_err(|_| ScanError::Timeout {
                table: table.to_string(),
                after: self.config.timeout,
            })?
            .map_err(|source| ScanError::DescribeFailed {
                table: table.to_string(),
                source,
            })?;
        let schema = Arc::new(resolve_key_schema(&elements).map_err(|source| {
            ScanError::Schema {
                table: table.to_string(),
                source,
            }
        })?);

        let total_segments = self.config.segments.resolve();
        tracing::info!(
            table,
            segments = total_segments,
            page_size = self.config.page_size,
            partition_key = %schema.partition_key,
            "starting parallel scan"
        );

        let records = Arc::new(Mutex::new(Vec::new()));
        let (err_tx, mut err_rx) = mpsc::channel(total_segments as usize);
        let mut workers = JoinSet::new();

        for segment in 0..total_segments {
            workers.spawn(
                SegmentWorker {
                    service: Arc::clone(&self.service),
                    table: table.to_string(),
                    schema: Arc::clone(&schema),
                    segment,
                    total_segments,
                    page_size: self.config.page_size,
                    deadline,
                    timeout: self.config.timeout,
                    records: Arc::clone(&records),
                    errors: err_tx.clone(),
                }
                .run(),
            );
        }
        drop(err_tx);

        let mut panicked = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(table, error = %e, "scan worker did not complete");
                panicked.get_or_insert_with(|| ScanError::WorkerPanicked(e.to_string()));
            }
        }

        if let Ok(err) = err_rx.try_recv() {
            tracing::warn!(table, error = %err, "scan failed; discarding partial results");
            return Err(err);
        }
        if let Some(err) = panicked {
            return Err(err);
        }

        let records = std::mem::take(&mut *records.lock());
        tracing::info!(
            table,
            rows = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );
        Ok(records)
    }
}

impl SegmentWorker {
    async fn run(self) {
        let mut token: Option<Record> = None;
        let mut pages = 0usize;

        loop {
            let request = ScanRequest {
                table: self.table.clone(),
                limit: self.page_size,
                segment: self.segment,
                total_segments: self.total_segments,
                exclusive_start_key: token.take(),
            };

            let page = match timeout_at(self.deadline, self.service.scan_segment(request)).await {
                Ok(Ok(page)) => page,
                Ok(Err(source)) => {
                    self.report(ScanError::Segment {
                        segment: self.segment,
                        source,
                    });
                    return;
                }
                Err(_) => {
                    self.report(ScanError::Timeout {
                        table: self.table.clone(),
                        after: self.timeout,
                    });
                    return;
                }
            };

            pages += 1;
            let count = page.items.len();
            self.records.lock().extend(page.items);
            tracing::debug!(
                table = %self.table,
                segment = self.segment,
                pages,
                rows = count,
                "segment page read"
            );

            // The service decides when a segment ends
            let raw = match page.last_evaluated_key {
                Some(raw) if !raw.is_empty() => raw,
                _ => break,
            };
            token = self
                .schema
                .sanitize_token(Some(&raw))
                .filter(|t| !t.is_empty());
            if token.is_none() {
                self.report(ScanError::Segment {
                    segment: self.segment,
                    source: ServiceError::invalid_request(
                        "continuation token has no key attributes",
                    ),
                });
                return;
            }
        }
    }

    fn report(&self, err: ScanError) {
        tracing::debug!(table = %self.table, segment = self.segment, error = %err, "segment failed");
        // Capacity is one slot per segment and each worker reports at most once.
        let _ = self.errors.try_send(err);
    }
}
