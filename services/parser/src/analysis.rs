//! Correlation and z-score heatmap over indicator columns

use crate::table::{CleanedTable, Column};
use chrono::NaiveDate;
use serde::Serialize;

/// One heatmap row: a date and the z-score of each requested column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZScoreRow {
    pub date: NaiveDate,
    pub label: String,
    pub values: Vec<Option<f64>>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1)
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Pearson correlation of two columns. `None` with fewer than two rows, a
/// missing column or zero variance.
pub fn pearson(table: &CleanedTable, x: &str, y: &str) -> Option<f64> {
    let xs = &table.column(x)?.values;
    let ys = &table.column(y)?.values;
    if xs.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let mut cov = 0.0_f64;
    let mut vx = 0.0_f64;
    let mut vy = 0.0_f64;
    for (a, b) in xs.iter().zip(ys) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Z-score every value of `columns` against its own column. Unknown columns
/// are skipped; zero-variance columns give `None` cells.
pub fn zscore_matrix(table: &CleanedTable, columns: &[String]) -> (Vec<String>, Vec<ZScoreRow>) {
    let present: Vec<&Column> = columns.iter().filter_map(|c| table.column(c)).collect();

    let stats: Vec<Option<(f64, f64)>> = present
        .iter()
        .map(|c| {
            let std = sample_std(&c.values)?;
            (std > 0.0).then(|| (mean(&c.values), std))
        })
        .collect();

    let rows = (0..table.len())
        .map(|i| ZScoreRow {
            date: table.dates[i],
            label: table.labels[i].clone(),
            values: present
                .iter()
                .zip(&stats)
                .map(|(c, s)| s.map(|(m, std)| (c.values[i] - m) / std))
                .collect(),
        })
        .collect();

    (present.iter().map(|c| c.name.clone()).collect(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[(&str, &[f64])]) -> CleanedTable {
        let n = columns[0].1.len();
        let dates: Vec<NaiveDate> = (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, i as u32 + 1, 1).unwrap())
            .collect();
        CleanedTable {
            name: "t".into(),
            label_column: "Month".into(),
            labels: dates.iter().map(|d| d.format("%b").to_string()).collect(),
            dates,
            columns: columns
                .iter()
                .map(|(n, v)| Column {
                    name: n.to_string(),
                    values: v.to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let t = table(&[("a", &[1.0, 2.0, 3.0]), ("b", &[2.0, 4.0, 6.0]), ("c", &[3.0, 2.0, 1.0])]);
        assert!((pearson(&t, "a", "b").unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&t, "a", "c").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate() {
        let t = table(&[("a", &[1.0, 2.0]), ("flat", &[5.0, 5.0])]);
        assert_eq!(pearson(&t, "a", "flat"), None);
        assert_eq!(pearson(&t, "a", "missing"), None);
        let one = table(&[("a", &[1.0]), ("b", &[2.0])]);
        assert_eq!(pearson(&one, "a", "b"), None);
    }

    #[test]
    fn test_zscores_use_sample_std() {
        // mean 2, sample std 1
        let t = table(&[("a", &[1.0, 2.0, 3.0]), ("flat", &[4.0, 4.0, 4.0])]);
        let (names, rows) = zscore_matrix(&t, &["a".into(), "flat".into(), "nope".into()]);
        assert_eq!(names, vec!["a", "flat"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values, vec![Some(-1.0), None]);
        assert_eq!(rows[2].values, vec![Some(1.0), None]);
        assert_eq!(rows[1].label, "Feb");
    }
}
