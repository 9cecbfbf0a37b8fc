//! Collector Service - Captures worksheets into snapshot files
//!
//! Usage:
//!   # List worksheets of the configured spreadsheet and local workbooks:
//!   cargo run --bin collector -- --list
//!
//!   # Capture Sheets worksheets:
//!   cargo run --bin collector -- --worksheet "Financial Data" --worksheet Config
//!
//!   # Capture a sheet of a local workbook:
//!   cargo run --bin collector -- --file Center/north.xlsx --worksheet Sheet1

use anyhow::{Context, Result};
use clap::Parser;
use collector::{Config, Location, Source, SourceRef};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Captures worksheets as content-hashed snapshots")]
struct Args {
    /// Spreadsheet id (defaults to SPREADSHEET_ID)
    #[arg(long)]
    spreadsheet_id: Option<String>,

    /// Local workbook instead of the Sheets API
    #[arg(long)]
    file: Option<PathBuf>,

    /// Worksheet(s) to capture; all of them when omitted
    #[arg(long)]
    worksheet: Vec<String>,

    /// Only list worksheets and local workbooks
    #[arg(long, default_value = "false")]
    list: bool,

    /// Output directory (defaults to SNAPSHOT_DIR)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("Invalid collector configuration")?;
    let source: Source = config.source().context("Failed to build Sheets client")?;

    println!("=== Indicator Dashboards Collector ===");

    let location = match (&args.file, args.spreadsheet_id.as_ref().or(config.spreadsheet_id.as_ref())) {
        (Some(path), _) => Location::File(path.clone()),
        (None, Some(id)) => Location::Spreadsheet(id.clone()),
        (None, None) => anyhow::bail!(
            "Must specify either:\n  \
             --file <path> for a local workbook, or\n  \
             --spreadsheet-id <id> (or SPREADSHEET_ID) for Google Sheets"
        ),
    };
    println!("Location: {:?}", location);

    if args.list {
        let files = source.local_files();
        println!("\nLocal workbooks ({}):", files.len());
        for f in &files {
            println!("  {}", f.display());
        }
        let tables = source.list_tables(&location).await.context("Failed to list worksheets")?;
        println!("\nWorksheets ({}):", tables.len());
        for t in &tables {
            println!("  {}", t);
        }
        return Ok(());
    }

    let worksheets = if args.worksheet.is_empty() {
        source.list_tables(&location).await.context("Failed to list worksheets")?
    } else {
        args.worksheet.clone()
    };
    let out_dir = args.out.clone().unwrap_or_else(|| config.snapshot_dir.clone());
    println!("Output: {}", out_dir.display());
    println!("\nCapturing {} worksheet(s)...", worksheets.len());

    let mut captured = 0;
    let mut failed = 0;
    for name in &worksheets {
        let target: SourceRef = location.table(name.as_str());
        match source.fetch(&target).await {
            Ok(snapshot) => {
                let path = collector::snapshot::save_to_fs(&out_dir, &snapshot)
                    .await
                    .with_context(|| format!("Failed to save snapshot of {}", target))?;
                println!("  ✓ {} -> {} ({})", name, path.display(), snapshot.content_hash);
                captured += 1;
            }
            Err(e) => {
                eprintln!("  ✗ {}: {}", name, e);
                failed += 1;
            }
        }
    }

    println!("\n=== Collection Summary ===");
    println!("Captured: {}", captured);
    println!("Failed: {}", failed);
    if captured > 0 {
        println!("Ready for parsing: cargo run --bin parser -- --input <snapshot.json>");
    }
    if failed > 0 && captured == 0 {
        anyhow::bail!("No worksheet could be captured");
    }

    Ok(())
}
