//! CSV and xlsx export of cleaned tables

use crate::table::CleanedTable;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::collections::HashSet;
use std::io::Write;

const MAX_SHEET_NAME: usize = 31;

/// Write `table` as CSV: label column, ISO date, then every numeric column.
pub fn write_csv<W: Write>(table: &CleanedTable, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![table.label_column.clone(), "Date".to_string()];
    header.extend(table.columns.iter().map(|c| c.name.clone()));
    wtr.write_record(&header)?;

    for i in 0..table.len() {
        let mut record = vec![table.labels[i].clone(), table.dates[i].format("%Y-%m-%d").to_string()];
        record.extend(table.columns.iter().map(|c| c.values[i].to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// [`write_csv`] into a string
pub fn to_csv_string(table: &CleanedTable) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Worksheet title Excel accepts: none of `[]:*?/\`, at most 31 characters,
/// not blank
pub fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .trim_matches('\'')
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// One worksheet per table (label column, date, indicators), header row in
/// bold. Repeated titles get a ` (n)` suffix.
pub fn to_xlsx_bytes(tables: &[&CleanedTable]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let mut used: HashSet<String> = HashSet::new();

    for table in tables {
        let base = sheet_name(&table.name);
        let mut title = base.clone();
        let mut n = 2;
        while !used.insert(title.to_lowercase()) {
            let suffix = format!(" ({})", n);
            let keep = MAX_SHEET_NAME - suffix.chars().count();
            title = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
            n += 1;
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name(&title)?;

        let mut header = vec![table.label_column.as_str(), "Date"];
        header.extend(table.columns.iter().map(|c| c.name.as_str()));
        for (col, name) in header.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *name, &bold)?;
        }
        sheet.set_column_width(1, 12)?;

        for i in 0..table.len() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, &table.labels[i])?;
            sheet.write_string(row, 1, table.dates[i].format("%Y-%m-%d").to_string())?;
            for (j, column) in table.columns.iter().enumerate() {
                sheet.write_number(row, (j + 2) as u16, column.values[i])?;
            }
        }
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use chrono::NaiveDate;

    #[test]
    fn test_csv_layout() {
        let table = CleanedTable {
            name: "Finance".into(),
            label_column: "Month".into(),
            dates: vec![
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            ],
            labels: vec!["01/2024".into(), "02/2024".into()],
            columns: vec![
                Column { name: "Total Revenues".into(), values: vec![1000.0, 1200.5] },
                Column { name: "Rate, %".into(), values: vec![0.1, 12.0] },
            ],
        };
        let out = to_csv_string(&table).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Month,Date,Total Revenues,\"Rate, %\"");
        assert_eq!(lines[1], "01/2024,2024-01-01,1000,0.1");
        assert_eq!(lines[2], "02/2024,2024-02-01,1200.5,12");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_sheet_names() {
        assert_eq!(sheet_name("Q1/Q2 [draft]"), "Q1_Q2 _draft_");
        assert_eq!(sheet_name("'quoted'"), "quoted");
        assert_eq!(sheet_name("   "), "Sheet1");
        assert_eq!(sheet_name(&"x".repeat(40)).chars().count(), 31);
    }

    #[test]
    fn test_xlsx_workbook() {
        let table = CleanedTable {
            name: "Operations".into(),
            label_column: "Month".into(),
            dates: vec![NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()],
            labels: vec!["01/2024".into()],
            columns: vec![Column { name: "Visits".into(), values: vec![40.0] }],
        };
        let bytes = to_xlsx_bytes(&[&table, &table]).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
        assert!(to_xlsx_bytes(&[]).is_ok());
    }
}
