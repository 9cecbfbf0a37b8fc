//! API Service - HTTP surface for the health-unit indicator dashboards
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /files, /worksheets - What can be opened
//! - GET /raw - Worksheet with its resolved header
//! - GET /dashboard - KPI cards and insights for one worksheet
//! - GET /compare, /common, /overlay - Indicators across sheets or facilities
//! - GET /correlation, /heatmap - Column analysis
//! - GET /export - Cleaned table as CSV or xlsx
//! - GET /facilities - Facility managers and phone numbers
//! - POST /ask - Question about a worksheet, answered by the assistant

mod assistant;
mod config;
mod error;
mod routes;
mod state;

use anyhow::Context;
use assistant::AssistantClient;
use collector::SnapshotCache;
use config::Config;
use parser::AlertPolicy;
use state::{AppState, Settings};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("Invalid API configuration")?;
    let sources = collector::Config::from_env().context("Invalid collector configuration")?;

    println!("=== Indicator Dashboards API ===");

    let source = sources.source().context("Failed to set up worksheet sources")?;
    match &sources.spreadsheet_id {
        Some(id) if sources.credentials().is_some() => println!("Spreadsheet: {}", id),
        Some(id) => println!("Spreadsheet: {} (no credentials, Sheets requests will fail)", id),
        None => println!("Spreadsheet: none (local workbooks only)"),
    }
    println!("Local folders: {:?}", sources.local_folders);
    println!("Snapshot cache TTL: {}s", sources.cache_ttl_secs);
    println!("Facility directory: {}", config.facilities_file);

    let assistant = match &config.assistant_api_key {
        Some(key) => Some(
            AssistantClient::new(&config.assistant_base_url, &config.assistant_model, key.clone())
                .context("Failed to build assistant client")?,
        ),
        None => None,
    };
    println!(
        "Assistant: {}",
        if assistant.is_some() { config.assistant_model.as_str() } else { "disabled" }
    );

    let state = Arc::new(AppState {
        source,
        spreadsheet_id: sources.spreadsheet_id.clone(),
        cache: Mutex::new(SnapshotCache::new(sources.cache_ttl())),
        settings: Settings {
            utc_offset_hours: config.utc_offset_hours,
            policy: AlertPolicy {
                threshold: config.alert_threshold,
                ..AlertPolicy::default()
            },
            header_mode: config.header_mode,
            config_sheet: config.config_sheet.clone(),
            facilities_file: config.facilities_file.clone(),
        },
        assistant,
    });

    let app = routes::router(state);

    println!("API listening on http://{}", config.bind);
    println!("\nEndpoints:");
    println!("  GET  /health");
    println!("  GET  /files");
    println!("  GET  /worksheets?file=");
    println!("  GET  /raw?sheet=&file=&header=");
    println!("  GET  /dashboard?sheet=&file=&window=&header=&as_of=");
    println!("  GET  /compare?sheets=a,b|files=a,b&column=&window=");
    println!("  GET  /common?sheets=a,b|files=a,b");
    println!("  GET  /overlay?sheet=&columns=a,b&window=");
    println!("  GET  /correlation?sheet=&x=&y=&window=");
    println!("  GET  /heatmap?sheet=&columns=a,b&window=");
    println!("  GET  /export?sheet=&window=&format=csv|xlsx");
    println!("  GET  /facilities?name=");
    println!("  POST /ask {{file?, sheet, question}}");

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}
