//! In-memory table service for testing
//!
//! Tables are held behind `Arc<RwLock>` so a single instance can be shared
//! across scan workers and mutated by tests between fetches. Records are
//! assigned to scan segments by a stable hash of their partition key, which
//! makes segment coverage disjoint and total for any segment count.

use crate::error::{Result, ServiceError};
use crate::key_schema::{resolve_key_schema, KeySchema, KeySchemaElement};
use crate::service::{ScanPage, ScanRequest, TableService, TablesPage};
use crate::value::{Record, TypedValue};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct MemoryTable {
    key_schema: Vec<KeySchemaElement>,
    records: Vec<Record>,
}

#[derive(Debug, Default)]
struct Faults {
    list_tables: Option<ServiceError>,
    describe: HashMap<String, ServiceError>,
    /// (table, segment) -> error returned on every page of that segment
    segments: HashMap<(String, i32), ServiceError>,
    page_delay: Option<Duration>,
}

/// In-memory [`TableService`] for tests
#[derive(Clone)]
pub struct MemoryTableService {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
    faults: Arc<RwLock<Faults>>,
    /// Page calls per (table, segment)
    page_calls: Arc<Mutex<HashMap<(String, i32), usize>>>,
    list_page_size: usize,
}

impl Default for MemoryTableService {
    fn default() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
            page_calls: Arc::new(Mutex::new(HashMap::new())),
            list_page_size: 100,
        }
    }
}

impl Debug for MemoryTableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryTableService")
            .field("table_count", &tables.len())
            .field(
                "record_count",
                &tables.values().map(|t| t.records.len()).sum::<usize>(),
            )
            .finish()
    }
}

impl MemoryTableService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page size used by [`TableService::list_tables`]
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size.max(1);
        self
    }

    /// Create or replace a table
    pub fn put_table(
        &self,
        name: impl Into<String>,
        key_schema: Vec<KeySchemaElement>,
        records: Vec<Record>,
    ) {
        self.tables.write().insert(
            name.into(),
            MemoryTable {
                key_schema,
                records,
            },
        );
    }

    /// Replace the records of an existing table, keeping its schema
    pub fn replace_records(&self, table: &str, records: Vec<Record>) {
        if let Some(t) = self.tables.write().get_mut(table) {
            t.records = records;
        }
    }

    pub fn fail_list_tables(&self, error: Option<ServiceError>) {
        self.faults.write().list_tables = error;
    }

    pub fn fail_describe(&self, table: &str, error: ServiceError) {
        self.faults.write().describe.insert(table.to_string(), error);
    }

    pub fn fail_segment(&self, table: &str, segment: i32, error: ServiceError) {
        self.faults
            .write()
            .segments
            .insert((table.to_string(), segment), error);
    }

    /// Sleep this long before answering each scan page
    pub fn set_page_delay(&self, delay: Option<Duration>) {
        self.faults.write().page_delay = delay;
    }

    /// Clear all injected failures and delays
    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    /// Page calls made so far for one segment of a table
    pub fn page_calls(&self, table: &str, segment: i32) -> usize {
        self.page_calls
            .lock()
            .get(&(table.to_string(), segment))
            .copied()
            .unwrap_or(0)
    }

    /// Page calls made so far across all segments of a table
    pub fn total_page_calls(&self, table: &str) -> usize {
        self.page_calls
            .lock()
            .iter()
            .filter(|((t, _), _)| t == table)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Segment a record belongs to for a given segment count
    pub fn segment_of(record: &Record, partition_key: &str, total_segments: i32) -> i32 {
        let total = total_segments.max(1) as u64;
        let hash = record
            .get(partition_key)
            .map(stable_hash)
            .unwrap_or_default();
        (hash % total) as i32
    }
}

/// FNV-1a over a tagged rendering of the value; stable across runs
fn stable_hash(value: &TypedValue) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut feed = |bytes: &[u8]| {
        for b in bytes {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    };
    feed(value.type_name().as_bytes());
    match value {
        TypedValue::String(s) | TypedValue::Number(s) => feed(s.as_bytes()),
        TypedValue::Binary(b) => feed(b),
        other => feed(format!("{other:?}").as_bytes()),
    }
    hash
}

fn key_matches(record: &Record, token: &Record) -> bool {
    token.iter().all(|(k, v)| record.get(k) == Some(v))
}

fn key_of(record: &Record, schema: &KeySchema) -> Record {
    schema
        .attribute_names()
        .filter_map(|name| record.get(name).map(|v| (name.to_string(), v.clone())))
        .collect()
}

#[async_trait]
impl TableService for MemoryTableService {
    async fn list_tables(&self, exclusive_start: Option<String>) -> Result<TablesPage> {
        if let Some(err) = self.faults.read().list_tables.clone() {
            return Err(err);
        }

        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();

        let start = match &exclusive_start {
            Some(after) => names.partition_point(|n| n.as_str() <= after.as_str()),
            None => 0,
        };
        let page: Vec<String> = names
            .iter()
            .skip(start)
            .take(self.list_page_size)
            .cloned()
            .collect();
        let last_evaluated = if start + page.len() < names.len() {
            page.last().cloned()
        } else {
            None
        };

        Ok(TablesPage {
            names: page,
            last_evaluated,
        })
    }

    async fn describe_key_schema(&self, table: &str) -> Result<Vec<KeySchemaElement>> {
        if let Some(err) = self.faults.read().describe.get(table).cloned() {
            return Err(err);
        }
        self.tables
            .read()
            .get(table)
            .map(|t| t.key_schema.clone())
            .ok_or_else(|| ServiceError::not_found(format!("table '{table}'")))
    }

    async fn scan_segment(&self, request: ScanRequest) -> Result<ScanPage> {
        *self
            .page_calls
            .lock()
            .entry((request.table.clone(), request.segment))
            .or_default() += 1;

        let (delay, fault) = {
            let faults = self.faults.read();
            (
                faults.page_delay,
                faults
                    .segments
                    .get(&(request.table.clone(), request.segment))
                    .cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = fault {
            return Err(err);
        }

        if request.limit < 1 {
            return Err(ServiceError::invalid_request("limit must be at least 1"));
        }
        if request.segment < 0 || request.segment >= request.total_segments {
            return Err(ServiceError::invalid_request(format!(
                "segment {} out of range for {} segments",
                request.segment, request.total_segments
            )));
        }

        let table = self
            .tables
            .read()
            .get(&request.table)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("table '{}'", request.table)))?;
        let schema = resolve_key_schema(&table.key_schema)
            .map_err(|e| ServiceError::invalid_request(e.to_string()))?;

        if let Some(token) = &request.exclusive_start_key {
            let allowed: HashSet<&str> = schema.attribute_names().collect();
            if let Some(extra) = token.keys().find(|k| !allowed.contains(k.as_str())) {
                return Err(ServiceError::invalid_request(format!(
                    "exclusive start key contains non-key attribute '{extra}'"
                )));
            }
        }

        let segment_records: Vec<&Record> = table
            .records
            .iter()
            .filter(|r| {
                Self::segment_of(r, &schema.partition_key, request.total_segments)
                    == request.segment
            })
            .collect();

        let start = match &request.exclusive_start_key {
            Some(token) => segment_records
                .iter()
                .position(|r| key_matches(r, token))
                .map(|i| i + 1)
                .unwrap_or(segment_records.len()),
            None => 0,
        };

        let limit = request.limit as usize;
        let items: Vec<Record> = segment_records
            .iter()
            .skip(start)
            .take(limit)
            .map(|r| (*r).clone())
            .collect();

        let last_evaluated_key = if start + items.len() < segment_records.len() {
            items.last().map(|r| {
                // Tokens carry a non-key attribute; resuming requires sanitizing.
                let mut key = key_of(r, &schema);
                key.insert(
                    "__scan_position".to_string(),
                    TypedValue::Number((start + items.len()).to_string()),
                );
                key
            })
        } else {
            None
        };

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}
