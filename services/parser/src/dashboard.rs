//! One-call dashboard summary of a worksheet

use crate::aggregate::{kpi_base, kpi_cards, plan_aggregations, AggregateResult, AlertPolicy};
use crate::cell::RawTable;
use crate::error::{EmptyReason, PipelineError};
use crate::insight::{summarize, Insights};
use crate::table::{CleanedTable, TableOptions};
use crate::window::{DateRange, DateWindow};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub sheet: String,
    /// Rows inside the selected window
    pub rows: usize,
    pub range: DateRange,
    pub columns: Vec<String>,
    pub kpis: Vec<AggregateResult>,
    /// `None` when fewer than two completed-month rows are left
    pub insights: Option<Insights>,
}

/// Clean `raw`, apply `window`, then compute KPI cards and insights over
/// the completed months inside it.
pub fn build_dashboard(
    raw: &RawTable,
    options: &TableOptions,
    window: &DateWindow,
    totals: &[String],
    policy: &AlertPolicy,
    today: NaiveDate,
) -> Result<Dashboard, PipelineError> {
    let table = CleanedTable::from_raw(raw, options)?;
    dashboard_for(&table, window, totals, policy, today)
}

pub fn dashboard_for(
    table: &CleanedTable,
    window: &DateWindow,
    totals: &[String],
    policy: &AlertPolicy,
    today: NaiveDate,
) -> Result<Dashboard, PipelineError> {
    let bounds = table.bounds().ok_or(PipelineError::Empty(EmptyReason::NoRows))?;
    let range = window
        .resolve(bounds, today)
        .ok_or(PipelineError::Empty(EmptyReason::EmptyWindow))?;
    let windowed = table.filter(&range);
    if windowed.is_empty() {
        return Err(EmptyReason::EmptyWindow.into());
    }

    let base = kpi_base(&windowed, today);
    let plan = plan_aggregations(&base, totals);
    let kpis = kpi_cards(&base, &plan, policy);

    let insights = match summarize(&base, policy) {
        Ok(i) => Some(i),
        Err(e) if e.is_empty() => None,
        Err(e) => return Err(e),
    };

    tracing::debug!(
        sheet = %table.name,
        rows = windowed.len(),
        kpis = kpis.len(),
        "dashboard built"
    );

    Ok(Dashboard {
        sheet: table.name.clone(),
        rows: windowed.len(),
        range,
        columns: windowed.column_names().into_iter().map(String::from).collect(),
        kpis,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregation;
    use crate::table::HeaderMode;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clinic_sheet() -> RawTable {
        RawTable::from_text_rows(
            "North Clinic",
            &[
                vec!["Month", "Visits", "Wait time"],
                vec!["01/2024", "100", "10"],
                vec!["02/2024", "100", "12"],
                vec!["03/2024", "100", "11"],
                vec!["04/2024", "200", "30"],
                vec!["05/2024", "999", "99"],
            ],
        )
    }

    fn single() -> TableOptions {
        TableOptions {
            header_mode: HeaderMode::Single,
            ..TableOptions::default()
        }
    }

    #[test]
    fn test_kpis_stop_at_previous_month() {
        let d = build_dashboard(
            &clinic_sheet(),
            &single(),
            &DateWindow::AllTime,
            &["Visits".to_string()],
            &AlertPolicy::default(),
            ymd(2024, 5, 20),
        )
        .unwrap();
        assert_eq!(d.rows, 5);
        assert_eq!(d.columns, vec!["Visits", "Wait time"]);
        let visits = &d.kpis[0];
        assert_eq!(visits.aggregation, Aggregation::Sum);
        assert_eq!(visits.value, 500.0);
        assert_eq!(visits.growth_pct, 100.0);
        assert!(visits.alert);
        assert_eq!(d.kpis[1].aggregation, Aggregation::Mean);
        assert!(d.insights.is_some());
    }

    #[test]
    fn test_window_applied_before_kpi_base() {
        let window = DateWindow::Explicit { start: ymd(2024, 4, 1), end: ymd(2024, 5, 31) };
        let d = build_dashboard(&clinic_sheet(), &single(), &window, &[], &AlertPolicy::default(), ymd(2024, 5, 20))
            .unwrap();
        assert_eq!(d.rows, 2);
        assert_eq!(d.kpis[0].value, 200.0);
        assert_eq!(d.kpis[0].growth_pct, 0.0);
        assert!(d.insights.is_none());
    }

    #[test]
    fn test_unfinished_month_does_not_raise_insight_alerts() {
        let raw = RawTable::from_text_rows(
            "South Clinic",
            &[
                vec!["Month", "Visits"],
                vec!["01/2024", "100"],
                vec!["02/2024", "100"],
                vec!["03/2024", "100"],
                vec!["04/2024", "100"],
                vec!["05/2024", "10"],
            ],
        );
        let d = build_dashboard(&raw, &single(), &DateWindow::AllTime, &[], &AlertPolicy::default(), ymd(2024, 5, 20))
            .unwrap();
        assert_eq!(d.kpis[0].latest, 100.0);
        assert!(!d.kpis[0].alert);
        let insights = d.insights.unwrap();
        assert!(insights.alerts.is_empty());
    }

    #[test]
    fn test_single_row_window_has_no_insights() {
        let window = DateWindow::Explicit { start: ymd(2024, 5, 1), end: ymd(2024, 5, 31) };
        let d = build_dashboard(&clinic_sheet(), &single(), &window, &[], &AlertPolicy::default(), ymd(2024, 5, 20))
            .unwrap();
        assert_eq!(d.rows, 1);
        assert!(d.insights.is_none());
    }

    #[test]
    fn test_window_outside_data() {
        let err = build_dashboard(
            &clinic_sheet(),
            &single(),
            &DateWindow::Last7Days,
            &[],
            &AlertPolicy::default(),
            ymd(2026, 1, 1),
        )
        .unwrap_err();
        assert_eq!(err, PipelineError::Empty(EmptyReason::EmptyWindow));
    }
}
