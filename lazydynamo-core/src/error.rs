//! Error types for table discovery, scanning and caching

use crate::key_schema::KeyType;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`TableService`](crate::service::TableService)
///
/// Cloneable so a failure can travel inside a [`FetchEvent`](crate::fetch::FetchEvent).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Table (or other resource) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request was rate limited after the client's own retries
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The call did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The service rejected the request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other service or transport failure
    #[error("Service error: {0}")]
    Service(String),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }
}

/// Malformed key schema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeySchemaError {
    #[error("key schema has no partition (HASH) key")]
    MissingPartitionKey,

    #[error("key schema declares more than one {key_type} key")]
    DuplicateKey { key_type: KeyType },
}

/// A single record could not be normalized
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("unsupported attribute value type {type_name} at '{path}'")]
    UnsupportedType { path: String, type_name: String },
}

/// Failure of a whole-table scan
///
/// A scan either returns every record or one of these; partial results are
/// never surfaced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("failed to describe table '{table}': {source}")]
    DescribeFailed {
        table: String,
        #[source]
        source: ServiceError,
    },

    #[error("table '{table}' has an invalid key schema: {source}")]
    Schema {
        table: String,
        #[source]
        source: KeySchemaError,
    },

    #[error("scan of segment {segment} failed: {source}")]
    Segment {
        segment: i32,
        #[source]
        source: ServiceError,
    },

    #[error("scan of table '{table}' exceeded its {}s deadline", .after.as_secs())]
    Timeout { table: String, after: Duration },

    #[error("scan worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Local cache file failure
///
/// Never surfaced by [`FileCache::read_through`](crate::cache::FileCache::read_through);
/// read failures there degrade to a cache miss and write failures are logged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {} is not valid: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cache record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fatal failure of one background fetch, delivered to the UI as an event
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("failed to list tables: {0}")]
    ListTables(#[source] ServiceError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The background task ended without producing a result
    #[error("fetch aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Short human-readable cause, suitable for an error surface
    pub fn cause(&self) -> String {
        match self {
            FetchError::ListTables(e) => e.to_string(),
            FetchError::Scan(ScanError::DescribeFailed { source, .. }) => source.to_string(),
            FetchError::Scan(ScanError::Segment { source, .. }) => source.to_string(),
            FetchError::Scan(e) => e.to_string(),
            FetchError::Aborted(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
