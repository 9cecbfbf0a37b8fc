//! Numeric coercion for indicator cells
//!
//! Sheets are typed by humans: "1,234", "12%", "-" and "—" all show up.
//! Nothing here fails; anything that is not a number counts as zero.

use crate::cell::Cell;

/// Cells that mean "nothing recorded"
const ZERO_MARKERS: &[&str] = &["", "-", "—"];

/// Convert display text to a number.
///
/// Thousands separators and percent signs are removed; blanks, dashes and
/// any non-numeric remainder become `0.0`. Never returns NaN or infinity.
pub fn coerce_text(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '%')
        .collect();
    let cleaned = cleaned.trim();

    if ZERO_MARKERS.contains(&cleaned) {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Convert any cell to a number (see [`coerce_text`])
pub fn coerce_cell(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) if n.is_finite() => *n,
        Cell::Number(_) => 0.0,
        Cell::Text(s) => coerce_text(s),
        Cell::Empty | Cell::Date { .. } => 0.0,
    }
}
