//! Collector - Captures worksheets as immutable snapshots
//!
//! Responsibilities:
//! - Read worksheets from the Google Sheets v4 API (with rate-limit backoff)
//! - Read local workbooks (xlsx/xls/ods) and CSV exports
//! - Wrap each capture in a content-hashed snapshot
//! - Keep snapshots in a caller-owned TTL cache or on disk as JSON
//!
//! Cleaning and aggregation live in the `parser` crate.

pub mod backoff;
pub mod config;
pub mod error;
pub mod sheets;
pub mod snapshot;
pub mod source;
pub mod workbook;

pub use backoff::Backoff;
pub use config::Config;
pub use error::FetchError;
pub use sheets::{Credentials, SheetsClient};
pub use snapshot::{Snapshot, SnapshotCache, SourceRef};
pub use source::{Location, Source};
