//! Raw worksheet cells as delivered by a snapshot

use serde::{Deserialize, Serialize};

/// A single worksheet cell.
///
/// Sheets API snapshots only ever carry `Text`; local workbooks also yield
/// `Number` (including date cells, stored as serial day counts). `Date` is the
/// structured year/month/day form some exports produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date { year: i32, month: u32, day: u32 },
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Display text of the cell, untrimmed.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
            Cell::Date { year, month, day } => format!("{:04}-{:02}-{:02}", year, month, day),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// Integers without decimals, everything else in shortest round-trip form
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Ordered rows of cells from one worksheet. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Convenience constructor for all-text tables (the Sheets API shape)
    pub fn from_text_rows<S: AsRef<str>>(name: impl Into<String>, rows: &[Vec<S>]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| Cell::text(c.as_ref())).collect())
            .collect();
        Self::new(name, rows)
    }

    /// Row `idx`, or an empty row when out of range
    pub fn row(&self, idx: usize) -> &[Cell] {
        self.rows.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
