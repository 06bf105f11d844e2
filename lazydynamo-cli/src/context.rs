use crate::config::Settings;
use crate::error::{CliError, CliResult};
use lazydynamo_aws::DynamoDbTableService;
use lazydynamo_core::{
    Browser, FetchEvent, FetchOrchestrator, FetchState, FileCache, Origin, ScanEngine,
    TableService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 16;

/// Orchestrator and browser model wired to DynamoDB and the file cache
pub struct Session {
    orchestrator: FetchOrchestrator,
    events: mpsc::Receiver<FetchEvent>,
    browser: Browser,
    origin: Option<Origin>,
}

/// File cache at the configured location
pub fn build_cache(settings: &Settings) -> FileCache {
    FileCache::new(settings.cache_dir.clone())
}

impl Session {
    /// Connect to DynamoDB; `refresh` bypasses fresh cache entries
    pub async fn connect(settings: &Settings, refresh: bool) -> CliResult<Self> {
        let service = DynamoDbTableService::connect(settings.dynamodb_config()).await?;
        tracing::debug!(?service, endpoint = ?settings.endpoint, "connected");
        Ok(Self::with_service(Arc::new(service), settings, refresh))
    }

    pub fn with_service(
        service: Arc<dyn TableService>,
        settings: &Settings,
        refresh: bool,
    ) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let engine = ScanEngine::new(Arc::clone(&service), settings.scan.clone());
        let ttl = if refresh {
            Duration::ZERO
        } else {
            settings.cache_ttl
        };
        let orchestrator = FetchOrchestrator::new(service, engine, build_cache(settings), tx)
            .with_ttl(ttl)
            .with_binary_encoding(settings.binary_encoding);

        Self {
            orchestrator,
            events: rx,
            browser: Browser::new(),
            origin: None,
        }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Where the last completed fetch got its data
    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    /// Load the table list
    pub async fn load_tables(&mut self) -> CliResult<()> {
        self.orchestrator.start().await;
        self.wait().await
    }

    /// Load every row of `table`; the table list must already be loaded
    pub async fn load_rows(&mut self, table: &str) -> CliResult<()> {
        if !self.browser.tables().iter().any(|t| t == table) {
            return Err(CliError::TableNotFound(table.to_string()));
        }
        self.orchestrator.select_table(table).await;
        self.wait().await
    }

    /// Give background cache refreshes up to `wait` to land before exit
    pub async fn finish(self, wait: Duration) {
        if !self.orchestrator.cache().drain_refreshes(wait).await {
            tracing::info!(?wait, "cache refresh still running at exit; left for next run");
        }
    }

    /// Feed events into the browser until no fetch is in flight
    async fn wait(&mut self) -> CliResult<()> {
        while let Some(event) = self.events.recv().await {
            let origin = match &event {
                FetchEvent::CollectionsFetched { origin, .. }
                | FetchEvent::RowsFetched { origin, .. } => Some(*origin),
                _ => None,
            };
            if self.browser.apply(event) {
                if let Some(origin) = origin {
                    self.origin = Some(origin);
                    match origin {
                        Origin::Cache { updated } => {
                            tracing::info!(%updated, "served from cache")
                        }
                        Origin::Service => tracing::info!("fetched from DynamoDB"),
                    }
                }
            }
            if !self.browser.fetch_state().is_loading() {
                break;
            }
        }

        match self.browser.fetch_state() {
            FetchState::FetchFailed { error, .. } => Err(CliError::Fetch(error.clone())),
            FetchState::Idle => Err(CliError::Internal("fetch was never started".to_string())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, Overrides};
    use lazydynamo_core::{
        CacheKey, CacheRecord, FetchError, KeySchemaElement, Record, ScanError, SegmentPolicy, ServiceError, TypedValue,
        ViewState,
    };
    use std::path::Path;

    fn settings(cache_dir: &Path) -> Settings {
        Settings::from_parts(
            cache_dir.join("config.toml"),
            FileConfig::default(),
            Overrides {
                cache_dir: Some(cache_dir.to_path_buf()),
                segments: Some(SegmentPolicy::Fixed(2)),
                ..Default::default()
            },
            cache_dir,
        )
        .unwrap()
    }

    fn record(id: usize) -> Record {
        let mut r = Record::new();
        r.insert("id".into(), TypedValue::String(format!("u{id}")));
        r.insert("age".into(), TypedValue::Number(id.to_string()));
        r
    }

    fn service() -> lazydynamo_core::MemoryTableService {
        let svc = lazydynamo_core::MemoryTableService::new();
        svc.put_table(
            "Users",
            vec![KeySchemaElement::partition("id")],
            (0..5).map(record).collect(),
        );
        svc
    }

    #[tokio::test]
    async fn test_load_tables_and_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session =
            Session::with_service(Arc::new(service()), &settings(tmp.path()), false);

        session.load_tables().await.unwrap();
        assert_eq!(session.browser().tables(), &["Users".to_string()]);
        assert_eq!(session.origin(), Some(Origin::Service));

        session.load_rows("Users").await.unwrap();
        assert_eq!(session.browser().view(), &ViewState::BrowsingTableRows);
        assert_eq!(session.browser().rows().len(), 5);
    }

    #[tokio::test]
    async fn test_refresh_lands_before_finish_returns() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings(tmp.path());
        let cache = build_cache(&settings);
        let key = CacheKey::Collections;
        cache
            .store(&key, &CacheRecord::new(vec!["Old".to_string()]))
            .await
            .unwrap();

        let mut session = Session::with_service(Arc::new(service()), &settings, false);
        session.load_tables().await.unwrap();
        assert_eq!(session.browser().tables(), &["Old".to_string()]);
        assert!(matches!(session.origin(), Some(Origin::Cache { .. })));

        session.finish(Duration::from_secs(5)).await;
        let stored = cache.load(&key).await.unwrap().unwrap();
        assert_eq!(stored.data, vec!["Users".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_without_fetch_is_internal_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(1);
        let mut session =
            Session::with_service(Arc::new(service()), &settings(tmp.path()), false);
        session.events = rx;
        drop(tx);

        let err = session.wait().await.unwrap_err();
        assert!(matches!(err, CliError::Internal(_)));
        assert!(err.to_string().contains("fetch was never started"));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session =
            Session::with_service(Arc::new(service()), &settings(tmp.path()), false);
        session.load_tables().await.unwrap();
        let err = session.load_rows("Nope").await.unwrap_err();
        assert!(matches!(err, CliError::TableNotFound(t) if t == "Nope"));
    }

    #[tokio::test]
    async fn test_scan_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service();
        svc.fail_segment("Users", 1, ServiceError::throttled("slow down"));
        let mut session = Session::with_service(Arc::new(svc), &settings(tmp.path()), false);

        session.load_tables().await.unwrap();
        let err = session.load_rows("Users").await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Fetch(FetchError::Scan(ScanError::Segment { segment: 1, .. }))
        ));
        assert_eq!(session.browser().view(), &ViewState::BrowsingCollections);
    }
}
