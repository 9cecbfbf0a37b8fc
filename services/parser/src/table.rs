//! Cleaned indicator tables
//!
//! One date column (parsed), one label column (the raw month text) and every
//! other column coerced to numbers. Rows without a date are dropped and the
//! rest are sorted chronologically.

use crate::cell::{Cell, RawTable};
use crate::dates::{DateParserChain, Granularity};
use crate::error::{EmptyReason, PipelineError};
use crate::header::{joined_headers, resolve_headers, single_row_header};
use crate::numeric::coerce_cell;
use crate::window::DateRange;
use chrono::NaiveDate;
use serde::Serialize;

/// How many leading rows name the columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// First row only (monthly indicator sheets)
    Single,
    /// Three header fragments (financial sheets). The third row is both the
    /// last header fallback and the first data candidate; it is dropped again
    /// if its first cell is not a date.
    #[default]
    Merged,
    /// Two header rows joined with a space (facility workbooks); data starts
    /// on the third row
    Joined,
}

impl std::str::FromStr for HeaderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" | "1" => Ok(HeaderMode::Single),
            "merged" | "3" => Ok(HeaderMode::Merged),
            "joined" | "2" => Ok(HeaderMode::Joined),
            other => Err(format!("unknown header mode '{}' (expected single, merged or joined)", other)),
        }
    }
}

impl HeaderMode {
    fn data_start(self) -> usize {
        match self {
            HeaderMode::Single => 1,
            HeaderMode::Merged | HeaderMode::Joined => 2,
        }
    }

    fn min_rows(self) -> usize {
        match self {
            HeaderMode::Single => 2,
            HeaderMode::Merged | HeaderMode::Joined => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub header_mode: HeaderMode,
    /// Index of the column holding the month/date text
    pub date_column: usize,
    pub granularity: Granularity,
    /// Name under which the raw date text is kept
    pub label_column: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            header_mode: HeaderMode::Merged,
            date_column: 0,
            granularity: Granularity::Monthly,
            label_column: "Month".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedTable {
    pub name: String,
    pub label_column: String,
    pub dates: Vec<NaiveDate>,
    pub labels: Vec<String>,
    pub columns: Vec<Column>,
}

/// Resolve the header of a raw table according to `mode`
pub fn header_for(raw: &RawTable, mode: HeaderMode) -> Vec<String> {
    match mode {
        HeaderMode::Single => single_row_header(raw.row(0)),
        HeaderMode::Merged => resolve_headers(raw.row(0), raw.row(1), raw.row(2)),
        HeaderMode::Joined => joined_headers(raw.row(0), raw.row(1)),
    }
}

impl CleanedTable {
    /// Build a cleaned table from a raw worksheet snapshot
    pub fn from_raw(raw: &RawTable, options: &TableOptions) -> Result<Self, PipelineError> {
        let mode = options.header_mode;
        if raw.rows.len() < mode.min_rows() {
            return Err(EmptyReason::NoRows.into());
        }

        let headers = header_for(raw, mode);
        if options.date_column >= headers.len() {
            return Err(PipelineError::Malformed(format!(
                "date column {} out of range for {} columns in '{}'",
                options.date_column,
                headers.len(),
                raw.name
            )));
        }

        let data = &raw.rows[mode.data_start()..];
        let date_cells: Vec<Cell> = data
            .iter()
            .map(|r| r.get(options.date_column).cloned().unwrap_or(Cell::Empty))
            .collect();
        let parsed = DateParserChain::standard(options.granularity).parse_column(&date_cells);

        // (date, original position) so the sort stays stable for equal dates
        let mut kept: Vec<(NaiveDate, usize)> = parsed
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (d, i)))
            .collect();
        kept.sort();

        let dropped = data.len() - kept.len();
        if dropped > 0 {
            tracing::debug!(sheet = %raw.name, dropped, "rows without a parseable date dropped");
        }
        if kept.is_empty() {
            return Err(EmptyReason::NoRows.into());
        }

        let numeric: Vec<(usize, &String)> = headers
            .iter()
            .enumerate()
            .filter(|(j, name)| *j != options.date_column && **name != options.label_column)
            .collect();

        let columns = numeric
            .into_iter()
            .map(|(j, name)| Column {
                name: name.clone(),
                values: kept
                    .iter()
                    .map(|&(_, i)| data[i].get(j).map(coerce_cell).unwrap_or(0.0))
                    .collect(),
            })
            .collect();

        Ok(Self {
            name: raw.name.clone(),
            label_column: options.label_column.clone(),
            dates: kept.iter().map(|&(d, _)| d).collect(),
            labels: kept
                .iter()
                .map(|&(_, i)| date_cells[i].as_text().trim().to_string())
                .collect(),
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric column names in sheet order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// First and last date
    pub fn bounds(&self) -> Option<DateRange> {
        DateRange::new(*self.dates.first()?, *self.dates.last()?)
    }

    /// Chronological (date, value) pairs of one column
    pub fn series(&self, name: &str) -> Option<Vec<(NaiveDate, f64)>> {
        let column = self.column(name)?;
        Some(self.dates.iter().copied().zip(column.values.iter().copied()).collect())
    }

    /// Rows whose date falls inside `range`
    pub fn filter(&self, range: &DateRange) -> CleanedTable {
        self.select(|d| range.contains(d))
    }

    /// Rows up to and including `end`
    pub fn through(&self, end: NaiveDate) -> CleanedTable {
        self.select(|d| d <= end)
    }

    /// Last row's date and value of one column
    pub fn latest(&self, name: &str) -> Option<(NaiveDate, f64)> {
        let column = self.column(name)?;
        Some((*self.dates.last()?, *column.values.last()?))
    }

    /// The last `n` rows (all rows when shorter)
    pub fn tail(&self, n: usize) -> CleanedTable {
        let skip = self.len().saturating_sub(n);
        let keep: Vec<usize> = (skip..self.len()).collect();
        self.take_rows(&keep)
    }

    fn select(&self, keep: impl Fn(NaiveDate) -> bool) -> CleanedTable {
        let rows: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| keep(**d))
            .map(|(i, _)| i)
            .collect();
        self.take_rows(&rows)
    }

    fn take_rows(&self, rows: &[usize]) -> CleanedTable {
        CleanedTable {
            name: self.name.clone(),
            label_column: self.label_column.clone(),
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            labels: rows.iter().map(|&i| self.labels[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: rows.iter().map(|&i| c.values[i]).collect(),
                })
                .collect(),
        }
    }
}
