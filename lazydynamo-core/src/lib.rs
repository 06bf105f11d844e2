//! Data acquisition and caching for the lazydynamo table browser
//!
//! This crate discovers tables, reads them in full with a parallel segmented
//! scan, serializes their records to JSON lines, and keeps the results in a
//! stale-while-revalidate file cache. It defines one collaborator trait:
//!
//! - [`TableService`]: paginated table listing, key schema lookup and
//!   segment page reads against the database
//!
//! # Components
//!
//! - [`value`]: typed attribute values and their normalization
//! - [`key_schema`]: key schema resolution and continuation-token sanitization
//! - [`scan`]: the parallel scan engine
//! - [`cache`]: the file cache
//! - [`fetch`]: background fetches, their events, and the browser state machine
//!
//! # Implementations
//!
//! - [`MemoryTableService`]: in-memory service for testing

mod error;
pub mod cache;
pub mod fetch;
pub mod filter;
pub mod key_schema;
pub mod memory;
pub mod scan;
pub mod service;
pub mod value;

pub use cache::{Cached, CacheEntry, CacheKey, CacheRecord, FileCache, Origin, DEFAULT_CACHE_TTL};
pub use error::{
    CacheError, FetchError, KeySchemaError, Result, ScanError, SerializationError, ServiceError,
};
pub use fetch::{
    Browser, FetchEvent, FetchInput, FetchOrchestrator, FetchState, FetchTarget, FetchTicket,
    ViewAction, ViewState,
};
pub use filter::{filter_tables, fuzzy_match};
pub use key_schema::{resolve_key_schema, sanitize_token, KeySchema, KeySchemaElement, KeyType};
pub use memory::MemoryTableService;
pub use scan::{ScanConfig, ScanEngine, SegmentPolicy, DEFAULT_PAGE_SIZE, DEFAULT_SCAN_TIMEOUT};
pub use service::{ScanPage, ScanRequest, TableService, TablesPage};
pub use value::{normalize, records_to_rows, BinaryEncoding, Document, Record, TypedValue};
