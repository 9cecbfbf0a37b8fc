//! Header resolution for worksheets whose column names span several rows
//!
//! Financial sheets carry a group row, a name row and sometimes a unit row.
//! The name row wins, then the group row, then the third row.

use crate::cell::Cell;
use std::collections::{HashMap, HashSet};

/// Name given to a column with no usable header text
pub const PLACEHOLDER: &str = "Unnamed";

fn cell_text(row: &[Cell], j: usize) -> String {
    row.get(j).map(|c| c.as_text().trim().to_string()).unwrap_or_default()
}

/// Merge up to three header fragments into one unique column-name row.
///
/// Output length is the longest fragment. Position `j` takes `row2[j]`, then
/// `row1[j]`, then `row3[j]`, then [`PLACEHOLDER`]; missing cells are blank.
pub fn resolve_headers(row1: &[Cell], row2: &[Cell], row3: &[Cell]) -> Vec<String> {
    let width = row1.len().max(row2.len()).max(row3.len());
    let merged = (0..width)
        .map(|j| {
            [cell_text(row2, j), cell_text(row1, j), cell_text(row3, j)]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        })
        .collect();
    make_unique(merged)
}

/// Two header rows joined with a space per column (`"Revenues" + "Insurance"`
/// → `"Revenues Insurance"`), as in the facility workbooks
pub fn joined_headers(row1: &[Cell], row2: &[Cell]) -> Vec<String> {
    let width = row1.len().max(row2.len());
    let names = (0..width)
        .map(|j| {
            let joined = format!("{} {}", cell_text(row1, j), cell_text(row2, j));
            let joined = joined.trim();
            if joined.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                joined.to_string()
            }
        })
        .collect();
    make_unique(names)
}

/// Header of a sheet whose first row alone names the columns
pub fn single_row_header(row: &[Cell]) -> Vec<String> {
    let names = (0..row.len())
        .map(|j| {
            let s = cell_text(row, j);
            if s.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                s
            }
        })
        .collect();
    make_unique(names)
}

/// Suffix repeated names left to right: the k-th repeat of `name` becomes
/// `name.k`. A suffixed name that is already taken keeps counting up.
pub fn make_unique(names: Vec<String>) -> Vec<String> {
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        if emitted.insert(name.clone()) {
            repeats.entry(name.clone()).or_insert(0);
            out.push(name);
            continue;
        }
        let k = repeats.entry(name.clone()).or_insert(0);
        let candidate = loop {
            *k += 1;
            let candidate = format!("{}.{}", name, k);
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(candidate.clone());
        emitted.insert(candidate.clone());
        out.push(candidate);
    }

    out
}
