//! Insight ranking: movers, alerts and headline changes

use crate::aggregate::{aggregate_column, AggregateResult, Aggregation, AlertPolicy};
use crate::error::{EmptyReason, PipelineError};
use crate::table::CleanedTable;
use serde::Serialize;

/// Rows considered when scoring movers
pub const MOVER_WINDOW: usize = 30;

/// Column-name prefixes that get a headline (compared lower-cased)
pub const DEFAULT_HEADLINE_PREFIXES: &[&str] = &["total revenues", "total expenses"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mover {
    pub column: String,
    /// Mean step change relative to the running average, in percent
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub column: String,
    pub previous: f64,
    pub latest: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub best_mover: Option<Mover>,
    pub worst_mover: Option<Mover>,
    pub alerts: Vec<AggregateResult>,
    pub headlines: Vec<Headline>,
}

/// Mover score of one series; `None` when no step has a non-zero running
/// average.
pub fn mover_score(values: &[f64]) -> Option<f64> {
    let mut running_sum = 0.0_f64;
    let mut steps = Vec::new();
    for (t, pair) in values.windows(2).enumerate() {
        running_sum += pair[0];
        let running_avg = running_sum / (t + 1) as f64;
        if running_avg == 0.0 {
            continue;
        }
        let step = (pair[1] - pair[0]) / running_avg * 100.0;
        if step.is_finite() {
            steps.push(step);
        }
    }
    if steps.is_empty() {
        None
    } else {
        Some(steps.iter().sum::<f64>() / steps.len() as f64)
    }
}

fn rank_movers(table: &CleanedTable) -> (Option<Mover>, Option<Mover>) {
    let window = table.tail(MOVER_WINDOW);
    let scored: Vec<Mover> = window
        .columns
        .iter()
        .filter_map(|c| {
            mover_score(&c.values).map(|score| Mover {
                column: c.name.clone(),
                score,
            })
        })
        .collect();

    // first column wins ties in both directions
    let mut best: Option<&Mover> = None;
    let mut worst: Option<&Mover> = None;
    for m in &scored {
        if best.map_or(true, |b| m.score > b.score) {
            best = Some(m);
        }
        if worst.map_or(true, |w| m.score < w.score) {
            worst = Some(m);
        }
    }
    (best.cloned(), worst.cloned())
}

fn headlines(table: &CleanedTable, prefixes: &[&str]) -> Vec<Headline> {
    table
        .columns
        .iter()
        .filter(|c| {
            let lower = c.name.to_lowercase();
            prefixes.iter().any(|p| lower.starts_with(p))
        })
        .filter_map(|c| {
            let [.., previous, latest] = c.values.as_slice() else {
                return None;
            };
            if *previous == 0.0 {
                return None;
            }
            Some(Headline {
                column: c.name.clone(),
                previous: *previous,
                latest: *latest,
                change_pct: (latest - previous) / previous * 100.0,
            })
        })
        .collect()
}

/// Insights with the default headline prefixes
pub fn summarize(table: &CleanedTable, policy: &AlertPolicy) -> Result<Insights, PipelineError> {
    summarize_with(table, policy, DEFAULT_HEADLINE_PREFIXES)
}

pub fn summarize_with(
    table: &CleanedTable,
    policy: &AlertPolicy,
    headline_prefixes: &[&str],
) -> Result<Insights, PipelineError> {
    if table.len() < 2 {
        return Err(EmptyReason::NoRows.into());
    }

    let (best_mover, worst_mover) = rank_movers(table);

    let mut alerts: Vec<AggregateResult> = table
        .column_names()
        .into_iter()
        .filter_map(|name| aggregate_column(table, name, Aggregation::Mean, policy))
        .filter(|r| r.alert)
        .collect();
    alerts.sort_by(|a, b| b.growth_pct.abs().total_cmp(&a.growth_pct.abs()));

    Ok(Insights {
        best_mover,
        worst_mover,
        alerts,
        headlines: headlines(table, headline_prefixes),
    })
}
