//! Background fetches and the browser state machine they drive
//!
//! The UI loop never awaits network or disk I/O. It asks a
//! [`FetchOrchestrator`] to start a fetch, which immediately emits
//! [`FetchEvent::Started`] and runs the work in a spawned task that reports
//! exactly one completion event on the same channel. The UI feeds every event
//! into its [`Browser`], a pure model with no I/O:
//!
//! ```text
//!              start                 success
//!   Idle ─────────────▶ FetchingCollections ──────▶ CollectionsReady
//!                              │ error                    │ selectTable
//!                              ▼                          ▼
//!                         FetchFailed ◀──── error ─── FetchingRows ──▶ RowsReady
//!                                                          success
//! ```
//!
//! Each request carries a [`FetchTicket`] with a sequence number. The browser
//! only honours events for the latest ticket of each kind, so a newer
//! `select_table` supersedes an older one without cancelling it.

use crate::cache::{CacheKey, FileCache, Origin, DEFAULT_CACHE_TTL};
use crate::error::FetchError;
use crate::filter::filter_tables;
use crate::scan::ScanEngine;
use crate::service::TableService;
use crate::value::{records_to_rows, BinaryEncoding};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What a fetch is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    Collections,
    Rows { table: String },
}

/// Identity of one fetch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Increases with every request issued by one orchestrator
    pub seq: u64,
    pub target: FetchTarget,
}

/// Messages from background fetches to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Started(FetchTicket),
    CollectionsFetched {
        ticket: FetchTicket,
        tables: Vec<String>,
        origin: Origin,
    },
    RowsFetched {
        ticket: FetchTicket,
        rows: Vec<String>,
        origin: Origin,
    },
    Failed {
        ticket: FetchTicket,
        error: FetchError,
    },
}

impl FetchEvent {
    pub fn ticket(&self) -> &FetchTicket {
        match self {
            FetchEvent::Started(ticket)
            | FetchEvent::CollectionsFetched { ticket, .. }
            | FetchEvent::RowsFetched { ticket, .. }
            | FetchEvent::Failed { ticket, .. } => ticket,
        }
    }
}

/// Fetch lifecycle as seen by the UI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    FetchingCollections,
    CollectionsReady,
    FetchingRows {
        table: String,
    },
    RowsReady {
        table: String,
    },
    FetchFailed {
        target: FetchTarget,
        error: FetchError,
    },
}

/// Inputs to [`FetchState::transition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchInput {
    Start,
    SelectTable(String),
    Succeeded,
    Failed(FetchError),
}

impl FetchState {
    /// Transition table; `None` means the input is not legal in this state
    pub fn transition(&self, input: &FetchInput) -> Option<FetchState> {
        use FetchState::*;

        match (self, input) {
            (Idle | CollectionsReady | RowsReady { .. } | FetchFailed { .. }, FetchInput::Start) => {
                Some(FetchingCollections)
            }
            (FetchingCollections, FetchInput::Succeeded) => Some(CollectionsReady),
            (FetchingCollections, FetchInput::Failed(error)) => Some(FetchFailed {
                target: FetchTarget::Collections,
                error: error.clone(),
            }),
            (
                CollectionsReady | FetchingRows { .. } | RowsReady { .. } | FetchFailed { .. },
                FetchInput::SelectTable(table),
            ) => Some(FetchingRows {
                table: table.clone(),
            }),
            (FetchingRows { table }, FetchInput::Succeeded) => Some(RowsReady {
                table: table.clone(),
            }),
            (FetchingRows { table }, FetchInput::Failed(error)) => Some(FetchFailed {
                target: FetchTarget::Rows {
                    table: table.clone(),
                },
                error: error.clone(),
            }),
            _ => None,
        }
    }

    /// Target of the fetch currently in flight, if any
    pub fn in_flight(&self) -> Option<FetchTarget> {
        match self {
            FetchState::FetchingCollections => Some(FetchTarget::Collections),
            FetchState::FetchingRows { table } => Some(FetchTarget::Rows {
                table: table.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight().is_some()
    }
}

/// What the UI is showing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    BrowsingCollections,
    BrowsingTableRows,
    InspectingRow {
        index: usize,
    },
    HelpOverlay {
        previous: Box<ViewState>,
    },
}

/// User navigation that does not involve a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    ShowCollections,
    /// Return to the loaded rows; no effect before any rows have loaded
    ShowRows,
    Inspect(usize),
    Back,
    ToggleHelp,
    SetFilter(String),
}

/// UI-side model: fetch state, view state and the data they refer to
#[derive(Debug, Default)]
pub struct Browser {
    fetch: FetchState,
    view: ViewState,
    tables: Vec<String>,
    rows: Vec<String>,
    table: Option<String>,
    error: Option<FetchError>,
    filter: String,
    latest_collections: u64,
    latest_rows: u64,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_state(&self) -> &FetchState {
        &self.fetch
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Tables matching the current filter
    pub fn visible_tables(&self) -> Vec<&str> {
        filter_tables(&self.tables, &self.filter)
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Table whose rows are loaded
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Last fetch failure, cleared by the next success
    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Pretty-printed JSON of the row being inspected
    pub fn inspected_row(&self) -> Option<String> {
        let ViewState::InspectingRow { index } = self.view else {
            return None;
        };
        let raw = self.rows.get(index)?;
        Some(
            serde_json::from_str::<serde_json::Value>(raw)
                .and_then(|v| serde_json::to_string_pretty(&v))
                .unwrap_or_else(|_| raw.clone()),
        )
    }

    fn latest_mut(&mut self, target: &FetchTarget) -> &mut u64 {
        match target {
            FetchTarget::Collections => &mut self.latest_collections,
            FetchTarget::Rows { .. } => &mut self.latest_rows,
        }
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        let latest = match ticket.target {
            FetchTarget::Collections => self.latest_collections,
            FetchTarget::Rows { .. } => self.latest_rows,
        };
        ticket.seq == latest && self.fetch.in_flight().as_ref() == Some(&ticket.target)
    }

    /// Apply one event; returns false if it was stale or not legal now
    pub fn apply(&mut self, event: FetchEvent) -> bool {
        match event {
            FetchEvent::Started(ticket) => {
                if ticket.seq <= *self.latest_mut(&ticket.target) {
                    return self.ignore(&ticket, "superseded start");
                }
                let input = match &ticket.target {
                    FetchTarget::Collections => FetchInput::Start,
                    FetchTarget::Rows { table } => FetchInput::SelectTable(table.clone()),
                };
                let Some(next) = self.fetch.transition(&input) else {
                    return self.ignore(&ticket, "start not legal");
                };
                *self.latest_mut(&ticket.target) = ticket.seq;
                self.fetch = next;
                true
            }
            FetchEvent::CollectionsFetched { ticket, tables, .. } => {
                if !self.is_current(&ticket) {
                    return self.ignore(&ticket, "stale result");
                }
                let Some(next) = self.fetch.transition(&FetchInput::Succeeded) else {
                    return self.ignore(&ticket, "result not legal");
                };
                self.fetch = next;
                self.tables = tables;
                self.error = None;
                self.view = ViewState::BrowsingCollections;
                true
            }
            FetchEvent::RowsFetched { ticket, rows, .. } => {
                if !self.is_current(&ticket) {
                    return self.ignore(&ticket, "stale result");
                }
                let Some(next) = self.fetch.transition(&FetchInput::Succeeded) else {
                    return self.ignore(&ticket, "result not legal");
                };
                if let FetchState::RowsReady { table } = &next {
                    self.table = Some(table.clone());
                }
                self.fetch = next;
                self.rows = rows;
                self.error = None;
                self.view = ViewState::BrowsingTableRows;
                true
            }
            FetchEvent::Failed { ticket, error } => {
                if !self.is_current(&ticket) {
                    return self.ignore(&ticket, "stale failure");
                }
                let Some(next) = self.fetch.transition(&FetchInput::Failed(error.clone())) else {
                    return self.ignore(&ticket, "failure not legal");
                };
                tracing::debug!(seq = ticket.seq, error = %error, "fetch failed");
                self.fetch = next;
                self.error = Some(error);
                true
            }
        }
    }

    fn ignore(&self, ticket: &FetchTicket, reason: &str) -> bool {
        tracing::trace!(seq = ticket.seq, target = ?ticket.target, state = ?self.fetch, reason, "ignoring fetch event");
        false
    }

    /// Apply a navigation action; returns false if it had no effect
    pub fn act(&mut self, action: ViewAction) -> bool {
        match action {
            ViewAction::SetFilter(query) => {
                self.filter = query;
                true
            }
            ViewAction::ShowCollections => {
                if self.view == ViewState::BrowsingCollections {
                    return false;
                }
                self.view = ViewState::BrowsingCollections;
                true
            }
            ViewAction::ShowRows => {
                if self.table.is_none() || self.view == ViewState::BrowsingTableRows {
                    return false;
                }
                self.view = ViewState::BrowsingTableRows;
                true
            }
            ViewAction::ToggleHelp => {
                self.view = match std::mem::take(&mut self.view) {
                    ViewState::HelpOverlay { previous } => *previous,
                    other => ViewState::HelpOverlay {
                        previous: Box::new(other),
                    },
                };
                true
            }
            ViewAction::Inspect(index) => {
                if self.view != ViewState::BrowsingTableRows || index >= self.rows.len() {
                    return false;
                }
                self.view = ViewState::InspectingRow { index };
                true
            }
            ViewAction::Back => {
                let next = match &self.view {
                    ViewState::BrowsingCollections => return false,
                    ViewState::BrowsingTableRows => ViewState::BrowsingCollections,
                    ViewState::InspectingRow { .. } => ViewState::BrowsingTableRows,
                    ViewState::HelpOverlay { previous } => (**previous).clone(),
                };
                self.view = next;
                true
            }
        }
    }
}

/// Issues background fetches and reports them as [`FetchEvent`]s
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    service: Arc<dyn TableService>,
    engine: ScanEngine,
    cache: FileCache,
    ttl: Duration,
    encoding: BinaryEncoding,
    events: mpsc::Sender<FetchEvent>,
    seq: Arc<AtomicU64>,
}

impl FetchOrchestrator {
    pub fn new(
        service: Arc<dyn TableService>,
        engine: ScanEngine,
        cache: FileCache,
        events: mpsc::Sender<FetchEvent>,
    ) -> Self {
        Self {
            service,
            engine,
            cache,
            ttl: DEFAULT_CACHE_TTL,
            encoding: BinaryEncoding::default(),
            events,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_binary_encoding(mut self, encoding: BinaryEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    fn next_ticket(&self, target: FetchTarget) -> FetchTicket {
        FetchTicket {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            target,
        }
    }

    /// Fetch the table list
    pub async fn start(&self) -> FetchTicket {
        let ticket = self.next_ticket(FetchTarget::Collections);
        let service = Arc::clone(&self.service);
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let done = ticket.clone();

        self.dispatch(ticket.clone(), async move {
            let result = cache
                .read_through(&CacheKey::Collections, ttl, move || async move {
                    service
                        .list_all_tables()
                        .await
                        .map_err(FetchError::ListTables)
                })
                .await;
            match result {
                Ok(cached) => FetchEvent::CollectionsFetched {
                    ticket: done,
                    tables: cached.data,
                    origin: cached.origin,
                },
                Err(error) => FetchEvent::Failed { ticket: done, error },
            }
        })
        .await;
        ticket
    }

    /// Fetch the rows of `table`, superseding any earlier row fetch
    pub async fn select_table(&self, table: &str) -> FetchTicket {
        let ticket = self.next_ticket(FetchTarget::Rows {
            table: table.to_string(),
        });
        let engine = self.engine.clone();
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let encoding = self.encoding;
        let table = table.to_string();
        let done = ticket.clone();

        self.dispatch(ticket.clone(), async move {
            let key = CacheKey::rows(table.as_str());
            let result = cache
                .read_through(&key, ttl, move || async move {
                    let records = engine.scan_table(&table).await?;
                    Ok::<_, FetchError>(records_to_rows(&records, encoding))
                })
                .await;
            match result {
                Ok(cached) => FetchEvent::RowsFetched {
                    ticket: done,
                    rows: cached.data,
                    origin: cached.origin,
                },
                Err(error) => FetchEvent::Failed { ticket: done, error },
            }
        })
        .await;
        ticket
    }

    /// Emit `Started`, then run `work` in the background and emit its event
    async fn dispatch<F>(&self, ticket: FetchTicket, work: F)
    where
        F: std::future::Future<Output = FetchEvent> + Send + 'static,
    {
        tracing::debug!(seq = ticket.seq, target = ?ticket.target, "fetch started");
        if self
            .events
            .send(FetchEvent::Started(ticket.clone()))
            .await
            .is_err()
        {
            tracing::debug!(seq = ticket.seq, "event receiver closed; not fetching");
            return;
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match tokio::spawn(work).await {
                Ok(event) => event,
                Err(e) => FetchEvent::Failed {
                    error: FetchError::Aborted(e.to_string()),
                    ticket,
                },
            };
            if events.send(event).await.is_err() {
                tracing::debug!("event receiver closed; dropping fetch result");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScanError, ServiceError};

    fn collections(seq: u64) -> FetchTicket {
        FetchTicket {
            seq,
            target: FetchTarget::Collections,
        }
    }

    fn rows(seq: u64, table: &str) -> FetchTicket {
        FetchTicket {
            seq,
            target: FetchTarget::Rows {
                table: table.to_string(),
            },
        }
    }

    fn boom() -> FetchError {
        FetchError::ListTables(ServiceError::service("boom"))
    }

    fn ready_browser() -> Browser {
        let mut browser = Browser::new();
        assert!(browser.apply(FetchEvent::Started(collections(1))));
        assert!(browser.apply(FetchEvent::CollectionsFetched {
            ticket: collections(1),
            tables: vec!["Orders".into(), "Users".into()],
            origin: Origin::Service,
        }));
        browser
    }

    #[test]
    fn test_transition_table() {
        use FetchState::*;
        let table = || "Orders".to_string();

        assert_eq!(Idle.transition(&FetchInput::Start), Some(FetchingCollections));
        assert_eq!(Idle.transition(&FetchInput::SelectTable(table())), None);
        assert_eq!(Idle.transition(&FetchInput::Succeeded), None);
        assert_eq!(
            FetchingCollections.transition(&FetchInput::Succeeded),
            Some(CollectionsReady)
        );
        assert_eq!(FetchingCollections.transition(&FetchInput::Start), None);
        assert_eq!(
            CollectionsReady.transition(&FetchInput::SelectTable(table())),
            Some(FetchingRows { table: table() })
        );
        assert_eq!(
            FetchingRows { table: table() }.transition(&FetchInput::SelectTable("Users".into())),
            Some(FetchingRows {
                table: "Users".into()
            })
        );
        assert_eq!(
            FetchingRows { table: table() }.transition(&FetchInput::Succeeded),
            Some(RowsReady { table: table() })
        );
        assert_eq!(
            FetchingRows { table: table() }.transition(&FetchInput::Failed(boom())),
            Some(FetchFailed {
                target: FetchTarget::Rows { table: table() },
                error: boom(),
            })
        );

        let failed = FetchingCollections
            .transition(&FetchInput::Failed(boom()))
            .unwrap();
        assert_eq!(failed.transition(&FetchInput::Succeeded), None);
        assert_eq!(
            failed.transition(&FetchInput::Start),
            Some(FetchingCollections)
        );
        assert_eq!(
            failed.transition(&FetchInput::SelectTable(table())),
            Some(FetchingRows { table: table() })
        );
    }

    #[test]
    fn test_rows_fetched_moves_to_rows_view() {
        let mut browser = ready_browser();
        assert_eq!(browser.view(), &ViewState::BrowsingCollections);
        assert_eq!(browser.fetch_state(), &FetchState::CollectionsReady);

        assert!(browser.apply(FetchEvent::Started(rows(2, "Orders"))));
        assert!(browser.fetch_state().is_loading());
        assert_eq!(browser.view(), &ViewState::BrowsingCollections);

        assert!(browser.apply(FetchEvent::RowsFetched {
            ticket: rows(2, "Orders"),
            rows: vec!["{\"id\":\"1\"}".into()],
            origin: Origin::Service,
        }));
        assert_eq!(browser.view(), &ViewState::BrowsingTableRows);
        assert_eq!(browser.table(), Some("Orders"));
        assert_eq!(browser.rows().len(), 1);
    }

    #[test]
    fn test_superseded_rows_are_ignored() {
        let mut browser = ready_browser();
        assert!(browser.apply(FetchEvent::Started(rows(2, "Orders"))));
        assert!(browser.apply(FetchEvent::Started(rows(3, "Users"))));

        assert!(!browser.apply(FetchEvent::RowsFetched {
            ticket: rows(2, "Orders"),
            rows: vec!["stale".into()],
            origin: Origin::Service,
        }));
        assert_eq!(browser.view(), &ViewState::BrowsingCollections);

        assert!(browser.apply(FetchEvent::RowsFetched {
            ticket: rows(3, "Users"),
            rows: vec!["{}".into()],
            origin: Origin::Service,
        }));
        assert_eq!(browser.table(), Some("Users"));
        assert_eq!(browser.rows(), &["{}".to_string()]);

        // Late start from the superseded request changes nothing
        assert!(!browser.apply(FetchEvent::Started(rows(2, "Orders"))));
    }

    #[test]
    fn test_failure_keeps_prior_view() {
        let mut browser = ready_browser();
        browser.apply(FetchEvent::Started(rows(2, "Orders")));
        let error = FetchError::Scan(ScanError::Segment {
            segment: 1,
            source: ServiceError::throttled("slow down"),
        });
        assert!(browser.apply(FetchEvent::Failed {
            ticket: rows(2, "Orders"),
            error: error.clone(),
        }));

        assert_eq!(browser.view(), &ViewState::BrowsingCollections);
        assert_eq!(browser.error(), Some(&error));
        assert_eq!(browser.error().unwrap().cause(), "Throttled: slow down");
        assert_eq!(browser.tables().len(), 2);

        // Retry re-enters the fetching state
        assert!(browser.apply(FetchEvent::Started(rows(3, "Orders"))));
        assert!(browser.fetch_state().is_loading());
    }

    #[test]
    fn test_select_before_collections_is_ignored() {
        let mut browser = Browser::new();
        assert!(!browser.apply(FetchEvent::Started(rows(1, "Orders"))));
        assert_eq!(browser.fetch_state(), &FetchState::Idle);
    }

    #[test]
    fn test_result_for_other_kind_is_ignored() {
        let mut browser = ready_browser();
        browser.apply(FetchEvent::Started(rows(2, "Orders")));
        assert!(!browser.apply(FetchEvent::Failed {
            ticket: collections(1),
            error: boom(),
        }));
        assert!(browser.fetch_state().is_loading());
    }

    #[test]
    fn test_navigation() {
        let mut browser = ready_browser();
        assert!(!browser.act(ViewAction::Inspect(0)));
        assert!(!browser.act(ViewAction::Back));

        browser.apply(FetchEvent::Started(rows(2, "Orders")));
        browser.apply(FetchEvent::RowsFetched {
            ticket: rows(2, "Orders"),
            rows: vec!["{\"id\":\"1\",\"n\":\"5\"}".into(), "not json".into()],
            origin: Origin::Service,
        });

        assert!(!browser.act(ViewAction::Inspect(5)));
        assert!(browser.act(ViewAction::Inspect(0)));
        assert_eq!(browser.view(), &ViewState::InspectingRow { index: 0 });
        assert_eq!(
            browser.inspected_row().unwrap(),
            "{\n  \"id\": \"1\",\n  \"n\": \"5\"\n}"
        );

        assert!(browser.act(ViewAction::ToggleHelp));
        assert!(matches!(browser.view(), ViewState::HelpOverlay { .. }));
        assert!(browser.inspected_row().is_none());
        assert!(browser.act(ViewAction::Back));
        assert_eq!(browser.view(), &ViewState::InspectingRow { index: 0 });

        assert!(browser.act(ViewAction::Back));
        assert!(browser.act(ViewAction::Inspect(1)));
        assert_eq!(browser.inspected_row().unwrap(), "not json");

        assert!(browser.act(ViewAction::Back));
        assert!(browser.act(ViewAction::Back));
        assert_eq!(browser.view(), &ViewState::BrowsingCollections);
    }

    #[test]
    fn test_show_rows_needs_loaded_table() {
        let mut browser = ready_browser();
        assert!(!browser.act(ViewAction::ShowRows));
        assert!(!browser.act(ViewAction::ShowCollections));

        browser.apply(FetchEvent::Started(rows(2, "Orders")));
        browser.apply(FetchEvent::RowsFetched {
            ticket: rows(2, "Orders"),
            rows: vec!["{}".into()],
            origin: Origin::Service,
        });
        assert!(browser.act(ViewAction::ShowCollections));
        assert_eq!(browser.view(), &ViewState::BrowsingCollections);
        assert!(browser.act(ViewAction::ShowRows));
        assert_eq!(browser.view(), &ViewState::BrowsingTableRows);
        assert_eq!(browser.table(), Some("Orders"));
    }

    #[test]
    fn test_filter_visible_tables() {
        let mut browser = ready_browser();
        browser.act(ViewAction::SetFilter("usr".into()));
        assert_eq!(browser.visible_tables(), vec!["Users"]);
        browser.act(ViewAction::SetFilter(String::new()));
        assert_eq!(browser.visible_tables().len(), 2);
    }
}
