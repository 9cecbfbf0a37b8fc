//! KPI aggregation over a cleaned table
//!
//! Each indicator is either summed or averaged (decided by the `Config`
//! worksheet), and compared against its reference average to produce the
//! growth percentage and alert flag shown on KPI cards.

use crate::cell::RawTable;
use crate::header::single_row_header;
use crate::table::CleanedTable;
use crate::window::previous_month_end;
use chrono::NaiveDate;
use serde::Serialize;

/// Alert threshold in percent
pub const DEFAULT_ALERT_THRESHOLD: f64 = 20.0;

/// Config worksheet column listing the KPIs that are summed
pub const TOTALS_CONFIG_COLUMN: &str = "Totals_KPIs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// What the latest value is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceAverage {
    /// Mean of the rows before the latest one
    #[default]
    Preceding,
    /// Mean of every row, latest included
    Whole,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    pub threshold: f64,
    pub reference: ReferenceAverage,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ALERT_THRESHOLD,
            reference: ReferenceAverage::Preceding,
        }
    }
}

/// A max or min value with where it happened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extremum {
    pub value: f64,
    pub date: NaiveDate,
    /// Month + year, e.g. "Mar 2024"
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub column: String,
    pub aggregation: Aggregation,
    pub value: f64,
    pub max: Extremum,
    pub min: Extremum,
    pub average: f64,
    pub latest: f64,
    pub growth_pct: f64,
    pub alert: bool,
    pub direction: Direction,
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Percentage deviation of `latest` from `average`; zero when undefined
pub fn growth_pct(latest: f64, average: f64) -> f64 {
    if average == 0.0 {
        return 0.0;
    }
    let growth = (latest - average) / average * 100.0;
    if growth.is_finite() {
        growth
    } else {
        0.0
    }
}

/// Aggregate one column. `None` when the column is missing or the table has
/// no rows.
pub fn aggregate_column(
    table: &CleanedTable,
    column: &str,
    aggregation: Aggregation,
    policy: &AlertPolicy,
) -> Option<AggregateResult> {
    let values = &table.column(column)?.values;
    let (&latest, preceding) = values.split_last()?;

    let value = match aggregation {
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Mean => mean(values),
    };

    // first occurrence wins on ties
    let mut max_idx = 0;
    let mut min_idx = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[max_idx] {
            max_idx = i;
        }
        if *v < values[min_idx] {
            min_idx = i;
        }
    }
    let extremum = |i: usize| Extremum {
        value: values[i],
        date: table.dates[i],
        label: month_label(table.dates[i]),
    };

    let average = match policy.reference {
        ReferenceAverage::Preceding if preceding.is_empty() => latest,
        ReferenceAverage::Preceding => mean(preceding),
        ReferenceAverage::Whole => mean(values),
    };
    let growth = growth_pct(latest, average);

    Some(AggregateResult {
        column: column.to_string(),
        aggregation,
        value,
        max: extremum(max_idx),
        min: extremum(min_idx),
        average,
        latest,
        growth_pct: growth,
        alert: growth.abs() >= policy.threshold,
        direction: if latest > average {
            Direction::Up
        } else {
            Direction::Down
        },
    })
}

/// Rows through the end of the previous calendar month, or the whole table
/// when that leaves nothing.
pub fn kpi_base(table: &CleanedTable, today: NaiveDate) -> CleanedTable {
    let base = table.through(previous_month_end(today));
    if base.is_empty() {
        tracing::debug!(sheet = %table.name, "no complete month yet, using full table for KPIs");
        table.clone()
    } else {
        base
    }
}

/// KPI names listed under `column` in a config worksheet (first row header)
pub fn totals_from_config(raw: &RawTable, column: &str) -> Vec<String> {
    if raw.rows.len() < 2 {
        return Vec::new();
    }
    let header = single_row_header(raw.row(0));
    let Some(idx) = header.iter().position(|h| h == column) else {
        return Vec::new();
    };
    raw.rows[1..]
        .iter()
        .filter_map(|row| row.get(idx))
        .map(|c| c.as_text().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Sum for configured totals, mean for everything else, in table order
pub fn plan_aggregations(table: &CleanedTable, totals: &[String]) -> Vec<(String, Aggregation)> {
    table
        .column_names()
        .into_iter()
        .map(|name| {
            let agg = if totals.iter().any(|t| t == name) {
                Aggregation::Sum
            } else {
                Aggregation::Mean
            };
            (name.to_string(), agg)
        })
        .collect()
}

/// One result per planned column that exists in the table
pub fn kpi_cards(
    table: &CleanedTable,
    plan: &[(String, Aggregation)],
    policy: &AlertPolicy,
) -> Vec<AggregateResult> {
    plan.iter()
        .filter_map(|(name, agg)| aggregate_column(table, name, *agg, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly(columns: &[(&str, &[f64])]) -> CleanedTable {
        let n = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let dates: Vec<NaiveDate> = (0..n).map(|i| ymd(2024, i as u32 + 1, 1)).collect();
        CleanedTable {
            name: "test".into(),
            label_column: "Month".into(),
            labels: dates.iter().map(|d| d.format("%m/%Y").to_string()).collect(),
            dates,
            columns: columns
                .iter()
                .map(|(name, values)| Column {
                    name: name.to_string(),
                    values: values.to_vec(),
                })
                .collect(),
        }
    }

    // -------------------------------------------------------------------------
    // GROWTH & ALERT TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_growth_against_preceding_average() {
        let table = monthly(&[("Visits", &[100.0, 100.0, 100.0, 200.0])]);
        let r = aggregate_column(&table, "Visits", Aggregation::Sum, &AlertPolicy::default()).unwrap();
        assert_eq!(r.average, 100.0);
        assert_eq!(r.latest, 200.0);
        assert_eq!(r.growth_pct, 100.0);
        assert!(r.alert);
        assert_eq!(r.direction, Direction::Up);
        assert_eq!(r.value, 500.0);
    }

    #[test]
    fn test_growth_against_whole_average() {
        let table = monthly(&[("Visits", &[100.0, 100.0, 100.0, 200.0])]);
        let policy = AlertPolicy {
            reference: ReferenceAverage::Whole,
            ..AlertPolicy::default()
        };
        let r = aggregate_column(&table, "Visits", Aggregation::Mean, &policy).unwrap();
        assert_eq!(r.average, 125.0);
        assert_eq!(r.value, 125.0);
        assert_eq!(r.growth_pct, 60.0);
    }

    #[test]
    fn test_zero_average_never_divides() {
        let table = monthly(&[("Referrals", &[0.0, 0.0, 5.0])]);
        let r = aggregate_column(&table, "Referrals", Aggregation::Mean, &AlertPolicy::default()).unwrap();
        assert_eq!(r.growth_pct, 0.0);
        assert!(r.growth_pct.is_finite());
        assert!(!r.alert);
        assert_eq!(r.direction, Direction::Up);
    }

    #[test]
    fn test_small_deviation_is_not_alert() {
        let table = monthly(&[("Beds", &[100.0, 100.0, 85.0])]);
        let r = aggregate_column(&table, "Beds", Aggregation::Mean, &AlertPolicy::default()).unwrap();
        assert_eq!(r.growth_pct, -15.0);
        assert!(!r.alert);
        assert_eq!(r.direction, Direction::Down);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let table = monthly(&[("Beds", &[100.0, 80.0])]);
        let r = aggregate_column(&table, "Beds", Aggregation::Mean, &AlertPolicy::default()).unwrap();
        assert_eq!(r.growth_pct, -20.0);
        assert!(r.alert);
    }

    #[test]
    fn test_single_row_has_zero_growth() {
        let table = monthly(&[("Beds", &[42.0])]);
        let r = aggregate_column(&table, "Beds", Aggregation::Sum, &AlertPolicy::default()).unwrap();
        assert_eq!(r.average, 42.0);
        assert_eq!(r.growth_pct, 0.0);
        assert_eq!(r.direction, Direction::Down);
    }

    // -------------------------------------------------------------------------
    // EXTREMA TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_min_with_dates() {
        let table = monthly(&[("Revenue", &[5.0, 9.0, 1.0, 9.0])]);
        let r = aggregate_column(&table, "Revenue", Aggregation::Sum, &AlertPolicy::default()).unwrap();
        assert_eq!(r.max.value, 9.0);
        assert_eq!(r.max.date, ymd(2024, 2, 1));
        assert_eq!(r.max.label, "Feb 2024");
        assert_eq!(r.min.value, 1.0);
        assert_eq!(r.min.label, "Mar 2024");
    }

    #[test]
    fn test_missing_column_or_empty_table() {
        let table = monthly(&[("A", &[1.0])]);
        assert!(aggregate_column(&table, "B", Aggregation::Sum, &AlertPolicy::default()).is_none());
        let empty = monthly(&[("A", &[])]);
        assert!(aggregate_column(&empty, "A", Aggregation::Sum, &AlertPolicy::default()).is_none());
    }

    // -------------------------------------------------------------------------
    // KPI BASE & PLAN TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_kpi_base_excludes_current_month() {
        let table = monthly(&[("A", &[1.0, 2.0, 3.0, 4.0])]);
        let base = kpi_base(&table, ymd(2024, 4, 18));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_kpi_base_falls_back_to_full_table() {
        let table = monthly(&[("A", &[1.0, 2.0])]);
        let base = kpi_base(&table, ymd(2024, 1, 10));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_totals_from_config() {
        let raw = RawTable::from_text_rows(
            "Config",
            &[
                vec!["Other", "Totals_KPIs"],
                vec!["x", " Total Revenues "],
                vec!["y", ""],
                vec!["z"],
                vec!["w", "Visits"],
            ],
        );
        assert_eq!(totals_from_config(&raw, TOTALS_CONFIG_COLUMN), vec!["Total Revenues", "Visits"]);
        assert!(totals_from_config(&raw, "Missing").is_empty());
    }

    #[test]
    fn test_plan_and_cards() {
        let table = monthly(&[("Visits", &[1.0, 3.0]), ("Wait time", &[10.0, 20.0])]);
        let plan = plan_aggregations(&table, &["Visits".to_string()]);
        assert_eq!(
            plan,
            vec![
                ("Visits".to_string(), Aggregation::Sum),
                ("Wait time".to_string(), Aggregation::Mean)
            ]
        );
        let cards = kpi_cards(&table, &plan, &AlertPolicy::default());
        assert_eq!(cards[0].value, 4.0);
        assert_eq!(cards[1].value, 15.0);
    }
}
