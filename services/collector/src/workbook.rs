//! Local workbook access (xlsx/xls/ods via calamine, CSV via csv)

use crate::error::FetchError;
use calamine::{open_workbook_auto, Data, Reader};
use encoding_rs::WINDOWS_1256;
use parser::{Cell, RawTable};
use std::path::{Path, PathBuf};

/// Extensions picked up by [`scan_folders`]
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xls"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn is_csv(path: &Path) -> bool {
    extension(path) == "csv"
}

/// A CSV file holds a single sheet named after the file stem
fn csv_sheet_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Sheet1".to_string())
}

/// Sheet names in workbook order
pub fn list_sheets(path: &Path) -> Result<Vec<String>, FetchError> {
    if !path.exists() {
        return Err(FetchError::NotFound(path.display().to_string()));
    }
    if is_csv(path) {
        return Ok(vec![csv_sheet_name(path)]);
    }
    let workbook = open_workbook_auto(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one sheet, keeping its cell layout (leading blank rows and
/// columns included).
pub fn read_sheet(path: &Path, sheet: &str) -> Result<RawTable, FetchError> {
    if !path.exists() {
        return Err(FetchError::NotFound(path.display().to_string()));
    }
    if is_csv(path) {
        if sheet != csv_sheet_name(path) {
            return Err(FetchError::NotFound(format!("sheet '{}' in {}", sheet, path.display())));
        }
        return read_csv(path);
    }

    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|s| s == sheet) {
        return Err(FetchError::NotFound(format!("sheet '{}' in {}", sheet, path.display())));
    }
    let range = workbook.worksheet_range(sheet)?;

    let (skip_rows, skip_cols) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); skip_rows];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; skip_cols];
        cells.extend(row.iter().map(map_cell));
        rows.push(cells);
    }

    tracing::debug!(path = %path.display(), sheet, rows = rows.len(), "read workbook sheet");
    Ok(RawTable::new(sheet, rows))
}

/// Read a CSV file as a raw table. UTF-8 (with or without BOM) first,
/// Windows-1256 otherwise.
pub fn read_csv(path: &Path) -> Result<RawTable, FetchError> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect());
    }
    Ok(RawTable::new(csv_sheet_name(path), rows))
}

pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, had_errors) = WINDOWS_1256.decode(bytes);
            if had_errors {
                tracing::warn!("text is neither UTF-8 nor clean Windows-1256, some characters replaced");
            }
            text.into_owned()
        }
    }
}

fn text_cell(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

/// Spreadsheet cell to raw cell. Date cells keep their serial number so the
/// date parser sees the same value a spreadsheet would.
pub fn map_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => text_cell(s),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
    }
}

/// Workbook files directly inside `folders`, sorted. Missing folders are
/// skipped; Office lock files (`~$...`) are ignored.
pub fn scan_folders(folders: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for folder in folders {
        let entries = match std::fs::read_dir(folder) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(folder = %folder.display(), error = %e, "skipping folder");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_file() || name.starts_with("~$") {
                continue;
            }
            if WORKBOOK_EXTENSIONS.contains(&extension(&path).as_str()) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
