//! Pipeline outcomes that are not a value
//!
//! Fetch failures never reach this crate; the collector reports them with its
//! own error type. What remains is either malformed input or a computation
//! that legitimately produced nothing to show.

use serde::Serialize;
use thiserror::Error;

/// Why a computation produced no data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EmptyReason {
    /// Not enough rows, or no row had a parseable date
    NoRows,
    /// A date filter matched zero rows
    EmptyWindow,
    /// The selected sources share no indicator (or not the requested one)
    NoCommonColumn,
    /// The requested indicator does not exist in the table
    MissingColumn(String),
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::NoRows => write!(f, "no usable rows"),
            EmptyReason::EmptyWindow => write!(f, "no rows inside the selected date range"),
            EmptyReason::NoCommonColumn => write!(f, "no common indicator across the selected sheets"),
            EmptyReason::MissingColumn(c) => write!(f, "indicator '{}' not found", c),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("no data: {0}")]
    Empty(EmptyReason),
}

impl PipelineError {
    pub fn is_empty(&self) -> bool {
        matches!(self, PipelineError::Empty(_))
    }
}

impl From<EmptyReason> for PipelineError {
    fn from(reason: EmptyReason) -> Self {
        PipelineError::Empty(reason)
    }
}
