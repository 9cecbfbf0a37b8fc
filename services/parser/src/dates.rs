//! Date normalization for month/date columns
//!
//! A column may mix "15/03/2024", "03/2024", "2024-03", "Mar 2024",
//! spreadsheet serial numbers and structured dates. Each format is handled by
//! a small pure strategy; [`DateParserChain`] applies them in a fixed order,
//! one pass per strategy over the values still unresolved.

use crate::cell::Cell;
use chrono::{Datelike, Duration, NaiveDate};

/// Spreadsheet serial day 0 (1900 date system, with the leap-year bug baked in)
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// Serial of 9999-12-31
const MAX_SERIAL: f64 = 2_958_465.0;

/// Two-digit years below this land in the 2000s, the rest in the 1900s
const TWO_DIGIT_YEAR_PIVOT: i32 = 69;

const MONTH_NAMES: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Precision kept after parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    Daily,
    /// Truncate to the first of the month so same-month entries share a key
    #[default]
    Monthly,
}

impl Granularity {
    pub fn apply(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
        }
    }
}

/// A pure date recognizer
pub type Strategy = fn(&Cell) -> Option<NaiveDate>;

/// Ordered, named list of date strategies
#[derive(Debug, Clone)]
pub struct DateParserChain {
    strategies: Vec<(&'static str, Strategy)>,
    granularity: Granularity,
}

impl DateParserChain {
    /// The production order: structured, day-first text, month/year
    /// patterns, spreadsheet serials.
    pub fn standard(granularity: Granularity) -> Self {
        Self {
            strategies: vec![
                ("structured", structured as Strategy),
                ("day_first_text", day_first_text),
                ("month_year_patterns", month_year_patterns),
                ("spreadsheet_serial", spreadsheet_serial),
            ],
            granularity,
        }
    }

    /// A chain with caller-chosen strategies
    pub fn with_strategies(
        strategies: Vec<(&'static str, Strategy)>,
        granularity: Granularity,
    ) -> Self {
        Self {
            strategies,
            granularity,
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// First strategy that recognizes the cell wins
    pub fn parse(&self, cell: &Cell) -> Option<NaiveDate> {
        self.strategies
            .iter()
            .find_map(|(_, strategy)| strategy(cell))
            .map(|d| self.granularity.apply(d))
    }

    /// Parse a whole column. Output has the same length; unresolved values
    /// are `None`.
    pub fn parse_column(&self, cells: &[Cell]) -> Vec<Option<NaiveDate>> {
        let mut out: Vec<Option<NaiveDate>> = vec![None; cells.len()];
        let mut pending: Vec<usize> = (0..cells.len()).filter(|&i| !cells[i].is_blank()).collect();

        for (name, strategy) in &self.strategies {
            if pending.is_empty() {
                break;
            }
            let before = pending.len();
            pending.retain(|&i| match strategy(&cells[i]) {
                Some(d) => {
                    out[i] = Some(self.granularity.apply(d));
                    false
                }
                None => true,
            });
            tracing::trace!(strategy = name, resolved = before - pending.len(), "date pass");
        }

        if !pending.is_empty() {
            tracing::debug!(unresolved = pending.len(), "values left without a date");
        }

        out
    }
}

impl Default for DateParserChain {
    fn default() -> Self {
        Self::standard(Granularity::default())
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

fn text_of(cell: &Cell) -> Option<&str> {
    match cell {
        Cell::Text(s) => {
            let s = s.trim();
            (!s.is_empty()).then_some(s)
        }
        _ => None,
    }
}

fn expand_year(token: &str) -> Option<i32> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: i32 = token.parse().ok()?;
    match token.len() {
        4 => Some(value),
        1 | 2 if value < TWO_DIGIT_YEAR_PIVOT => Some(2000 + value),
        1 | 2 => Some(1900 + value),
        _ => None,
    }
}

fn small_number(token: &str) -> Option<u32> {
    if token.is_empty() || token.len() > 2 || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn month_from_name(token: &str) -> Option<u32> {
    let lower = token.trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let lower = if lower == "sept" { "sep".to_string() } else { lower };
    MONTH_NAMES
        .iter()
        .position(|full| *full == lower || (lower.len() == 3 && full.starts_with(lower.as_str())))
        .map(|i| i as u32 + 1)
}

fn is_clock(token: &str) -> bool {
    let parts: Vec<&str> = token.split(':').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 2 && p.chars().all(|c| c.is_ascii_digit()))
}

/// Drop a trailing `HH:MM[:SS]` (optionally `AM`/`PM`) from a date-time
fn strip_time(s: &str) -> &str {
    let mut rest = s.trim_end();
    if let Some((head, last)) = rest.rsplit_once(' ') {
        if last.eq_ignore_ascii_case("am") || last.eq_ignore_ascii_case("pm") {
            rest = head.trim_end();
        }
    }
    match rest.rsplit_once(' ') {
        Some((head, last)) if is_clock(last) => head.trim_end(),
        _ => rest,
    }
}

/// Structured year/month/day input
pub fn structured(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date { year, month, day } => NaiveDate::from_ymd_opt(*year, *month, *day),
        _ => None,
    }
}

/// Flexible text dates, day before month when the order is ambiguous.
///
/// Accepts ISO `YYYY-MM-DD`, three numeric fields (`15/03/2024`,
/// `15-03-24`, `2024.03.15`), a bare four-digit year and month names
/// (`15 Mar 2024`, `March 15, 2024`, `Mar 2024`). A day-first reading that is
/// not a real date falls back to month-first (`03/15/2024`). A trailing
/// clock time is ignored.
pub fn day_first_text(cell: &Cell) -> Option<NaiveDate> {
    let s = text_of(cell)?;

    if s.len() >= 10 && s.is_char_boundary(10) {
        let (head, tail) = s.split_at(10);
        if tail.is_empty() || tail.starts_with(' ') || tail.starts_with('T') {
            if let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
                if head.as_bytes()[4] == b'-' {
                    return Some(d);
                }
            }
        }
    }

    let s = strip_time(s);
    let tokens: Vec<&str> = s
        .split(|c: char| matches!(c, '/' | '-' | '.' | ' ' | ','))
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(month_idx) = tokens.iter().position(|t| month_from_name(t).is_some()) {
        let month = month_from_name(tokens[month_idx])?;
        let others: Vec<&str> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != month_idx)
            .map(|(_, t)| *t)
            .collect();
        return match others.as_slice() {
            [year] if year.len() == 4 => NaiveDate::from_ymd_opt(expand_year(year)?, month, 1),
            [a, b] => {
                // the four-digit token is the year; otherwise day comes first
                let (day, year) = if a.len() == 4 { (*b, *a) } else { (*a, *b) };
                NaiveDate::from_ymd_opt(expand_year(year)?, month, small_number(day)?)
            }
            _ => None,
        };
    }

    match tokens.as_slice() {
        // a bare year is January 1st; longer digit runs are left to the serial pass
        [year] if year.len() == 4 => NaiveDate::from_ymd_opt(expand_year(year)?, 1, 1),
        [a, b, c] => {
            if a.len() == 4 {
                let year = expand_year(a)?;
                NaiveDate::from_ymd_opt(year, small_number(b)?, small_number(c)?)
            } else {
                let (first, second) = (small_number(a)?, small_number(b)?);
                let year = expand_year(c)?;
                NaiveDate::from_ymd_opt(year, second, first)
                    .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
            }
        }
        _ => None,
    }
}

/// `m/Y`, `m-Y` and `Y-m`
pub fn month_year_patterns(cell: &Cell) -> Option<NaiveDate> {
    let s = text_of(cell)?;
    let sep = if s.contains('/') { '/' } else { '-' };
    let mut parts = s.split(sep).map(str::trim);
    let (a, b) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let (year, month) = if a.len() == 4 && sep == '-' {
        (a, b)
    } else if b.len() == 4 {
        (b, a)
    } else {
        return None;
    };

    if !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(year, small_number(month)?, 1)
}

/// Serial day count relative to 1899-12-30
pub fn spreadsheet_serial(cell: &Cell) -> Option<NaiveDate> {
    let serial = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}
