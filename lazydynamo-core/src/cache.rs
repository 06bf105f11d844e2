//! Stale-while-revalidate file cache
//!
//! One JSON file per resource:
//!
//! ```text
//! <cache_dir>/
//!   collections.json          # table list
//!   tables/<table>.json       # serialized rows of one table
//! ```
//!
//! Each file holds `{ "data": [...], "updated": "<RFC 3339>" }`. Writes go to a
//! uniquely named temp file in the same directory and are renamed into place,
//! so readers see either the old record or the new one.
//!
//! The cache is an accelerator only. [`FileCache::read_through`] treats any
//! unreadable file as a miss and logs (but does not return) write failures.
//!
//! Background refreshes are tracked by the cache (shared across clones).
//! Short-lived callers should [`FileCache::drain_refreshes`] before exiting,
//! otherwise runtime shutdown cancels them.

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// How long a cache record counts as fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(72 * 60 * 60);

const COLLECTIONS_FILE: &str = "collections.json";
const TABLES_DIR: &str = "tables";

/// Logical resource a cache record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The table list
    Collections,
    /// Rows of one table
    Rows(String),
}

impl CacheKey {
    pub fn rows(table: impl Into<String>) -> Self {
        CacheKey::Rows(table.into())
    }

    fn relative_path(&self) -> PathBuf {
        match self {
            CacheKey::Collections => PathBuf::from(COLLECTIONS_FILE),
            CacheKey::Rows(table) => {
                Path::new(TABLES_DIR).join(format!("{}.json", urlencoding::encode(table)))
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Collections => f.write_str("collections"),
            CacheKey::Rows(table) => write!(f, "rows:{table}"),
        }
    }
}

/// Persisted cache contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub data: Vec<String>,
    pub updated: DateTime<Utc>,
}

impl CacheRecord {
    /// New record stamped with the current time
    pub fn new(data: Vec<String>) -> Self {
        Self {
            data,
            updated: Utc::now(),
        }
    }

    /// True while `now - updated < ttl`
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.updated) < ttl,
            // A TTL too large for chrono never expires
            Err(_) => true,
        }
    }
}

/// Where a [`Cached`] value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Served from a fresh cache file; a background refresh was started
    Cache { updated: DateTime<Utc> },
    /// Fetched from the service during this call
    Service,
}

/// Result of [`FileCache::read_through`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached {
    pub data: Vec<String>,
    pub origin: Origin,
}

/// Summary of one cache file, for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub updated: DateTime<Utc>,
    pub len: usize,
}

/// File-backed cache rooted at one directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    refreshes: Arc<Mutex<JoinSet<()>>>,
}

impl FileCache {
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            refreshes: Arc::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.relative_path())
    }

    /// Read the record for `key`, `Ok(None)` if there is none
    pub async fn load(&self, key: &CacheKey) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CacheError::Decode { path, source })
    }

    /// Atomically replace the record for `key`
    pub async fn store(&self, key: &CacheKey, record: &CacheRecord) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(&self.dir).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| CacheError::io(&parent, e))?;

        let content = serde_json::to_vec(record)?;

        // Unique tmp name: PID + counter so concurrent refreshes never share one
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

        tokio::fs::write(&tmp, &content)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(&path, e));
        }

        tracing::debug!(key = %key, rows = record.data.len(), path = %path.display(), "cache stored");
        Ok(())
    }

    /// Serve `key` from cache when fresh, otherwise fetch it
    ///
    /// - Fresh record: returned immediately; `fetch` runs in a background
    ///   task whose result only ever overwrites the cache.
    /// - Missing, unreadable or stale record: `fetch` runs now. Success is
    ///   stored and returned; failure is returned and the existing file is
    ///   left as it was.
    pub async fn read_through<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Cached, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<String>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let existing = match self.load(key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ignoring unreadable cache file");
                None
            }
        };

        if let Some(record) = existing {
            if record.is_fresh(ttl, Utc::now()) {
                tracing::debug!(key = %key, updated = %record.updated, "cache hit; refreshing in background");
                self.spawn_refresh(key.clone(), fetch);
                return Ok(Cached {
                    data: record.data,
                    origin: Origin::Cache {
                        updated: record.updated,
                    },
                });
            }
            tracing::debug!(key = %key, updated = %record.updated, "cache stale");
        }

        let data = fetch().await?;
        let record = CacheRecord::new(data);
        if let Err(e) = self.store(key, &record).await {
            tracing::warn!(key = %key, error = %e, "failed to write cache");
        }
        Ok(Cached {
            data: record.data,
            origin: Origin::Service,
        })
    }

    fn spawn_refresh<F, Fut, E>(&self, key: CacheKey, fetch: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<String>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let writer = FileCache::new(self.dir.clone());
        let mut refreshes = self.refreshes.lock();
        while refreshes.try_join_next().is_some() {}
        refreshes.spawn(async move {
            match fetch().await {
                Ok(data) => {
                    if let Err(e) = writer.store(&key, &CacheRecord::new(data)).await {
                        tracing::warn!(key = %key, error = %e, "background cache write failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "background refresh failed");
                }
            }
        });
    }

    /// Number of background refreshes not yet collected
    pub fn pending_refreshes(&self) -> usize {
        self.refreshes.lock().len()
    }

    /// Wait up to `timeout` for background refreshes started so far
    ///
    /// Returns false if some were still running at the deadline; those are
    /// aborted and their cache files left as they were.
    pub async fn drain_refreshes(&self, timeout: Duration) -> bool {
        let mut pending = std::mem::take(&mut *self.refreshes.lock());
        if pending.is_empty() {
            return true;
        }
        tracing::debug!(pending = pending.len(), "waiting for background refreshes");

        let deadline = Instant::now() + timeout;
        loop {
            match timeout_at(deadline, pending.join_next()).await {
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "background refresh did not complete");
                }
                Ok(None) => return true,
                Err(_) => {
                    tracing::warn!(pending = pending.len(), "abandoning background refreshes");
                    pending.abort_all();
                    return false;
                }
            }
        }
    }

    /// List cached resources, skipping files that cannot be decoded
    pub async fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();

        if let Some(entry) = self.entry(CacheKey::Collections).await {
            entries.push(entry);
        }

        let tables_dir = self.dir.join(TABLES_DIR);
        let mut dir = match tokio::fs::read_dir(&tables_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(CacheError::io(tables_dir, e)),
        };

        let mut tables = Vec::new();
        while let Some(file) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&tables_dir, e))?
        {
            let name = file.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            if let Some(table) = urlencoding::decode(stem).ok().map(Cow::into_owned) {
                tables.push(table);
            }
        }
        tables.sort();

        for table in tables {
            if let Some(entry) = self.entry(CacheKey::Rows(table)).await {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn entry(&self, key: CacheKey) -> Option<CacheEntry> {
        match self.load(&key).await {
            Ok(Some(record)) => Some(CacheEntry {
                path: self.path_for(&key),
                key,
                updated: record.updated,
                len: record.data.len(),
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping unreadable cache file");
                None
            }
        }
    }

    /// Remove one cached resource, or everything when `key` is `None`
    ///
    /// Returns the number of files removed.
    pub async fn clear(&self, key: Option<&CacheKey>) -> Result<usize, CacheError> {
        match key {
            Some(key) => remove_if_exists(&self.path_for(key)).await.map(usize::from),
            None => {
                let mut removed = usize::from(
                    remove_if_exists(&self.path_for(&CacheKey::Collections)).await?,
                );
                let tables_dir = self.dir.join(TABLES_DIR);
                let mut dir = match tokio::fs::read_dir(&tables_dir).await {
                    Ok(dir) => dir,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
                    Err(e) => return Err(CacheError::io(tables_dir, e)),
                };
                while let Some(file) = dir
                    .next_entry()
                    .await
                    .map_err(|e| CacheError::io(&tables_dir, e))?
                {
                    if remove_if_exists(&file.path()).await? {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool, CacheError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}
