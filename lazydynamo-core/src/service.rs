//! The table service collaborator
//!
//! Everything the core needs from the database: paginated table listing,
//! key schema lookup, and one page of a segmented scan. Transport-level
//! retries belong to implementations, not to callers of this trait.

use crate::error::Result;
use crate::key_schema::KeySchemaElement;
use crate::value::Record;
use async_trait::async_trait;
use std::fmt::Debug;

/// One page of table names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablesPage {
    pub names: Vec<String>,
    /// Name to resume after, `None` when the listing is complete
    pub last_evaluated: Option<String>,
}

/// Parameters of a single segment page read
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table: String,
    pub limit: i32,
    pub segment: i32,
    pub total_segments: i32,
    pub exclusive_start_key: Option<Record>,
}

/// Result of a single segment page read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Record>,
    /// `None` once the segment is exhausted
    pub last_evaluated_key: Option<Record>,
}

/// Read-only access to a key-value table service
#[async_trait]
pub trait TableService: Debug + Send + Sync {
    /// List one page of table names
    async fn list_tables(&self, exclusive_start: Option<String>) -> Result<TablesPage>;

    /// Return the table's key schema elements
    async fn describe_key_schema(&self, table: &str) -> Result<Vec<KeySchemaElement>>;

    /// Read one page of one scan segment
    async fn scan_segment(&self, request: ScanRequest) -> Result<ScanPage>;

    /// List every table name, following pagination to the end
    async fn list_all_tables(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut start = None;
        loop {
            let page = self.list_tables(start).await?;
            names.extend(page.names);
            match page.last_evaluated {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        tracing::debug!(count = names.len(), "listed tables");
        Ok(names)
    }
}
