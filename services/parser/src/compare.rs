//! Cross-sheet and same-sheet indicator comparison

use crate::error::{EmptyReason, PipelineError};
use crate::table::CleanedTable;
use crate::window::{DateRange, DateWindow};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSeries {
    /// Sheet (or column, for overlays) the points come from
    pub source: String,
    pub points: Vec<(NaiveDate, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonFrame {
    pub column: String,
    pub range: DateRange,
    pub series: Vec<SourceSeries>,
}

/// Column names present in every table. Empty for no input.
pub fn common_columns(tables: &[CleanedTable]) -> BTreeSet<String> {
    let Some((first, rest)) = tables.split_first() else {
        return BTreeSet::new();
    };
    let mut common: BTreeSet<String> = first.column_names().into_iter().map(String::from).collect();
    for table in rest {
        let names: BTreeSet<&str> = table.column_names().into_iter().collect();
        common.retain(|c| names.contains(c.as_str()));
    }
    common
}

/// Compare one indicator across several sheets over a date window
pub fn compare(
    tables: &[CleanedTable],
    column: &str,
    window: &DateWindow,
    today: NaiveDate,
) -> Result<ComparisonFrame, PipelineError> {
    if tables.is_empty() || !common_columns(tables).contains(column) {
        return Err(EmptyReason::NoCommonColumn.into());
    }

    let all_dates = tables.iter().flat_map(|t| t.dates.iter().copied());
    let (Some(first), Some(last)) = (all_dates.clone().min(), all_dates.max()) else {
        return Err(EmptyReason::NoRows.into());
    };
    let bounds = DateRange { start: first, end: last };
    let range = window
        .resolve(bounds, today)
        .ok_or(PipelineError::Empty(EmptyReason::EmptyWindow))?;

    let series = tables
        .iter()
        .map(|t| SourceSeries {
            source: t.name.clone(),
            points: t.filter(&range).series(column).unwrap_or_default(),
        })
        .collect();

    Ok(ComparisonFrame {
        column: column.to_string(),
        range,
        series,
    })
}

/// Several indicators of one sheet inside `range`, one series per column
pub fn overlay_columns(
    table: &CleanedTable,
    columns: &[String],
    range: &DateRange,
) -> Result<Vec<SourceSeries>, PipelineError> {
    let window = table.filter(range);
    if window.is_empty() {
        return Err(EmptyReason::EmptyWindow.into());
    }
    columns
        .iter()
        .map(|name| {
            window
                .series(name)
                .map(|points| SourceSeries {
                    source: name.clone(),
                    points,
                })
                .ok_or_else(|| PipelineError::Empty(EmptyReason::MissingColumn(name.clone())))
        })
        .collect()
}
