//! Parser - Turns raw worksheet snapshots into cleaned indicator tables
//!
//! Responsibilities:
//! - Resolve multi-row spreadsheet headers into unique column names
//! - Coerce text cells into numbers and heterogeneous date cells into dates
//! - Build chronologically ordered tables keyed by month/date
//! - Aggregate KPIs, rank movers and flag alerts
//! - Align several facility tables on a shared indicator for comparison
//! - Look up facility managers and phone numbers
//!
//! Everything here is pure: same snapshot + same options = same output.
//! Fetching is the collector's job.

pub mod aggregate;
pub mod analysis;
pub mod cell;
pub mod compare;
pub mod dashboard;
pub mod dates;
pub mod directory;
pub mod error;
pub mod export;
pub mod header;
pub mod insight;
pub mod numeric;
pub mod table;
pub mod window;

pub use aggregate::{AggregateResult, Aggregation, AlertPolicy, Direction, ReferenceAverage};
pub use cell::{Cell, RawTable};
pub use compare::{ComparisonFrame, SourceSeries};
pub use dashboard::Dashboard;
pub use dates::{DateParserChain, Granularity};
pub use directory::{Facility, FacilityDirectory};
pub use error::{EmptyReason, PipelineError};
pub use insight::Insights;
pub use table::{CleanedTable, Column, HeaderMode, TableOptions};
pub use window::{DateRange, DateWindow};
