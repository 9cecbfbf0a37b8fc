//! Parser CLI - Turns a captured worksheet into a dashboard summary
//!
//! Reads a snapshot written by the collector (or a bare raw-table JSON),
//! cleans it and prints KPI cards + insights as JSON, or the cleaned table
//! as CSV.
//!
//! Deterministic: same snapshot + same options + same `--today` = same output.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::Parser;
use parser::aggregate::{totals_from_config, TOTALS_CONFIG_COLUMN};
use parser::dashboard::build_dashboard;
use parser::export::write_csv;
use parser::{AlertPolicy, CleanedTable, DateWindow, HeaderMode, RawTable, TableOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parser", about = "Cleans a worksheet snapshot and summarizes its indicators")]
struct Args {
    /// Snapshot or raw-table JSON file
    #[arg(long)]
    input: PathBuf,

    /// Header layout: single, merged or joined
    #[arg(long, default_value = "merged")]
    header: HeaderMode,

    /// Date window: 7d, 30d, month, all or YYYY-MM-DD..YYYY-MM-DD
    #[arg(long, default_value = "all")]
    window: DateWindow,

    /// Zero-based index of the month/date column
    #[arg(long, default_value_t = 0)]
    date_column: usize,

    /// Config worksheet snapshot listing the summed KPIs
    #[arg(long)]
    config_sheet: Option<PathBuf>,

    /// Extra comma-separated KPI names to sum
    #[arg(long, value_delimiter = ',')]
    totals: Vec<String>,

    /// Alert threshold in percent
    #[arg(long, default_value_t = parser::aggregate::DEFAULT_ALERT_THRESHOLD)]
    threshold: f64,

    /// Reference date (defaults to today in UTC+`utc_offset`)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Dashboard clock offset in hours
    #[arg(long, default_value_t = 2)]
    utc_offset: i32,

    /// Write the cleaned table as CSV to this path instead of printing JSON
    #[arg(long)]
    export_csv: Option<PathBuf>,
}

/// Accepts both `{"table": {...}, ...}` snapshots and bare raw tables
fn load_raw_table(path: &Path) -> Result<RawTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let table = match value.get_mut("table") {
        Some(inner) => inner.take(),
        None => value,
    };
    serde_json::from_value(table).with_context(|| format!("{} does not hold a raw table", path.display()))
}

fn local_today(offset_hours: i32) -> Result<NaiveDate> {
    let offset = FixedOffset::east_opt(offset_hours * 3600).context("UTC offset out of range")?;
    Ok(Utc::now().with_timezone(&offset).date_naive())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let today = match args.today {
        Some(d) => d,
        None => local_today(args.utc_offset)?,
    };

    let raw = load_raw_table(&args.input)?;
    tracing::info!(sheet = %raw.name, rows = raw.rows.len(), %today, "loaded worksheet");

    let options = TableOptions {
        header_mode: args.header,
        date_column: args.date_column,
        ..TableOptions::default()
    };

    if let Some(path) = &args.export_csv {
        let table = CleanedTable::from_raw(&raw, &options).context("Failed to clean worksheet")?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&table, file).context("Failed to write CSV")?;
        tracing::info!(path = %path.display(), rows = table.len(), "cleaned table exported");
        return Ok(());
    }

    let mut totals = args.totals.clone();
    if let Some(path) = &args.config_sheet {
        let config = load_raw_table(path)?;
        totals.extend(totals_from_config(&config, TOTALS_CONFIG_COLUMN));
    }

    let policy = AlertPolicy {
        threshold: args.threshold,
        ..AlertPolicy::default()
    };

    let dashboard = build_dashboard(&raw, &options, &args.window, &totals, &policy, today)
        .context("Failed to build dashboard")?;

    tracing::info!(
        rows = dashboard.rows,
        kpis = dashboard.kpis.len(),
        alerts = dashboard.insights.as_ref().map_or(0, |i| i.alerts.len()),
        "dashboard ready"
    );
    println!("{}", serde_json::to_string_pretty(&dashboard)?);

    Ok(())
}
