use crate::assistant::{data_context, AssistantError};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use collector::{FetchError, Location, Snapshot};
use parser::{
    aggregate::{kpi_base, totals_from_config, TOTALS_CONFIG_COLUMN},
    analysis::{pearson, zscore_matrix, ZScoreRow},
    compare::{common_columns, compare, overlay_columns},
    dashboard::dashboard_for,
    export::{to_csv_string, to_xlsx_bytes},
    table::header_for,
    CleanedTable, ComparisonFrame, Dashboard, DateRange, DateWindow, EmptyReason, Facility, FacilityDirectory,
    HeaderMode, PipelineError, SourceSeries, TableOptions,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/files", get(list_files))
        .route("/worksheets", get(list_worksheets))
        .route("/raw", get(get_raw))
        .route("/dashboard", get(get_dashboard))
        .route("/compare", get(get_compare))
        .route("/common", get(get_common))
        .route("/overlay", get(get_overlay))
        .route("/correlation", get(get_correlation))
        .route("/heatmap", get(get_heatmap))
        .route("/export", get(get_export))
        .route("/facilities", get(get_facilities))
        .route("/ask", post(ask))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

/// Which capture a response was computed from
#[derive(Debug, Serialize)]
struct SnapshotInfo {
    snapshot_id: Uuid,
    source: String,
    captured_at: DateTime<Utc>,
    content_hash: String,
}

impl From<&Snapshot> for SnapshotInfo {
    fn from(s: &Snapshot) -> Self {
        Self {
            snapshot_id: s.snapshot_id,
            source: s.source.to_string(),
            captured_at: s.captured_at,
            content_hash: s.content_hash.clone(),
        }
    }
}

#[derive(Serialize)]
struct WorksheetsResponse {
    worksheets: Vec<String>,
}

#[derive(Serialize)]
struct RawResponse {
    snapshot: SnapshotInfo,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct DashboardResponse {
    snapshot: SnapshotInfo,
    #[serde(flatten)]
    dashboard: Dashboard,
}

#[derive(Serialize)]
struct CompareResponse {
    snapshots: Vec<SnapshotInfo>,
    #[serde(flatten)]
    frame: ComparisonFrame,
}

#[derive(Serialize)]
struct CommonResponse {
    columns: Vec<String>,
}

#[derive(Serialize)]
struct OverlayResponse {
    snapshot: SnapshotInfo,
    range: DateRange,
    series: Vec<SourceSeries>,
}

#[derive(Serialize)]
struct CorrelationResponse {
    snapshot: SnapshotInfo,
    x: String,
    y: String,
    rows: usize,
    /// `null` when undefined (constant column, fewer than two rows)
    r: Option<f64>,
}

#[derive(Serialize)]
struct HeatmapResponse {
    snapshot: SnapshotInfo,
    columns: Vec<String>,
    rows: Vec<ZScoreRow>,
}

#[derive(Serialize)]
struct FacilitiesResponse {
    snapshot: SnapshotInfo,
    facilities: Vec<Facility>,
}

#[derive(Serialize)]
struct AskResponse {
    snapshot: SnapshotInfo,
    answer: String,
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Deserialize)]
struct FileQuery {
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SheetQuery {
    sheet: String,
    file: Option<String>,
    header: Option<String>,
    window: Option<String>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    /// Comma-separated worksheets of one spreadsheet/workbook
    sheets: Option<String>,
    /// Comma-separated facility files; each contributes `sheet` or its first worksheet
    files: Option<String>,
    sheet: Option<String>,
    file: Option<String>,
    column: Option<String>,
    header: Option<String>,
    window: Option<String>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ColumnsQuery {
    sheet: String,
    file: Option<String>,
    header: Option<String>,
    window: Option<String>,
    columns: Option<String>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct CorrelationQuery {
    sheet: String,
    file: Option<String>,
    header: Option<String>,
    window: Option<String>,
    as_of: Option<NaiveDate>,
    x: String,
    y: String,
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    sheet: String,
    file: Option<String>,
    header: Option<String>,
    window: Option<String>,
    as_of: Option<NaiveDate>,
    /// `csv` (default) or `xlsx`
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacilitiesQuery {
    /// Exact or partial facility name; all facilities when absent
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    file: Option<String>,
    sheet: String,
    question: String,
}

fn parse_or<T: FromStr<Err = String>>(value: Option<&str>, default: T) -> Result<T, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(ApiError::BadRequest),
        None => Ok(default),
    }
}

fn window_range(table: &CleanedTable, window: &DateWindow, today: NaiveDate) -> Result<DateRange, PipelineError> {
    let bounds = table.bounds().ok_or(PipelineError::Empty(EmptyReason::NoRows))?;
    window
        .resolve(bounds, today)
        .ok_or(PipelineError::Empty(EmptyReason::EmptyWindow))
}

/// Rows inside `window` that belong to completed months, the same base the
/// KPI cards use
fn completed_months(table: &CleanedTable, window: &DateWindow, today: NaiveDate) -> Result<CleanedTable, PipelineError> {
    let windowed = table.filter(&window_range(table, window, today)?);
    if windowed.is_empty() {
        return Err(PipelineError::Empty(EmptyReason::EmptyWindow));
    }
    Ok(kpi_base(&windowed, today))
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Shared steps
// ============================================================================

impl AppState {
    fn table_options(&self, header: Option<&str>) -> Result<TableOptions, ApiError> {
        Ok(TableOptions {
            header_mode: parse_or(header, self.settings.header_mode)?,
            ..TableOptions::default()
        })
    }

    fn as_of(&self, as_of: Option<NaiveDate>) -> NaiveDate {
        as_of.unwrap_or_else(|| self.today())
    }

    async fn cleaned(
        &self,
        file: Option<&str>,
        sheet: &str,
        header: Option<&str>,
    ) -> Result<(Snapshot, CleanedTable), ApiError> {
        let options = self.table_options(header)?;
        let snapshot = self.snapshot(file, sheet).await?;
        let table = CleanedTable::from_raw(&snapshot.table, &options)?;
        Ok((snapshot, table))
    }

    /// Sum-aggregated KPI names from the config worksheet. A source without
    /// one (or one that cannot be read) averages everything.
    async fn totals(&self, file: Option<&str>) -> Vec<String> {
        match self.snapshot(file, &self.settings.config_sheet).await {
            Ok(snapshot) => totals_from_config(&snapshot.table, TOTALS_CONFIG_COLUMN),
            Err(e) => {
                tracing::debug!(error = ?e, sheet = %self.settings.config_sheet, "no totals configuration");
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_files(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let files: Vec<String> = state
        .source
        .local_files()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    Json(files)
}

async fn list_worksheets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FileQuery>,
) -> Result<Json<WorksheetsResponse>, ApiError> {
    let location = state.location(params.file.as_deref())?;
    let worksheets = state.source.list_tables(&location).await?;
    Ok(Json(WorksheetsResponse { worksheets }))
}

async fn get_raw(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SheetQuery>,
) -> Result<Json<RawResponse>, ApiError> {
    let mode: HeaderMode = parse_or(params.header.as_deref(), state.settings.header_mode)?;
    let snapshot = state.snapshot(params.file.as_deref(), &params.sheet).await?;
    let header = header_for(&snapshot.table, mode);
    let rows = snapshot
        .table
        .rows
        .iter()
        .map(|r| r.iter().map(|c| c.as_text()).collect())
        .collect();
    Ok(Json(RawResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        header,
        rows,
    }))
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SheetQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let window: DateWindow = parse_or(params.window.as_deref(), DateWindow::AllTime)?;
    let (snapshot, table) = state
        .cleaned(params.file.as_deref(), &params.sheet, params.header.as_deref())
        .await?;
    let totals = state.totals(params.file.as_deref()).await;
    let dashboard = dashboard_for(
        &table,
        &window,
        &totals,
        &state.settings.policy,
        state.as_of(params.as_of),
    )?;
    Ok(Json(DashboardResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        dashboard,
    }))
}

async fn compared_tables(state: &AppState, params: &CompareQuery) -> Result<Vec<(Snapshot, CleanedTable)>, ApiError> {
    let files = split_list(params.files.as_deref());
    let mut out = Vec::new();

    if files.is_empty() {
        let sheets = split_list(params.sheets.as_deref());
        if sheets.is_empty() {
            return Err(ApiError::BadRequest("pass ?sheets=a,b or ?files=a,b".into()));
        }
        for sheet in &sheets {
            out.push(state.cleaned(params.file.as_deref(), sheet, params.header.as_deref()).await?);
        }
        return Ok(out);
    }

    for file in &files {
        let location = state.location(Some(file))?;
        let sheet = match &params.sheet {
            Some(sheet) => sheet.clone(),
            None => state
                .source
                .list_tables(&location)
                .await?
                .into_iter()
                .next()
                .ok_or(ApiError::Pipeline(EmptyReason::NoRows.into()))?,
        };
        let (snapshot, mut table) = state.cleaned(Some(file), &sheet, params.header.as_deref()).await?;
        // Facility files share sheet names; label each series by its file
        if let Location::File(path) = &location {
            if let Some(stem) = path.file_stem() {
                table.name = stem.to_string_lossy().into_owned();
            }
        }
        out.push((snapshot, table));
    }
    Ok(out)
}

async fn get_compare(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, ApiError> {
    let window: DateWindow = parse_or(params.window.as_deref(), DateWindow::AllTime)?;
    let column = params
        .column
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing ?column=".into()))?;
    let loaded = compared_tables(&state, &params).await?;
    let (snapshots, tables): (Vec<Snapshot>, Vec<CleanedTable>) = loaded.into_iter().unzip();

    let frame = compare(&tables, &column, &window, state.as_of(params.as_of))?;
    Ok(Json(CompareResponse {
        snapshots: snapshots.iter().map(SnapshotInfo::from).collect(),
        frame,
    }))
}

async fn get_common(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompareQuery>,
) -> Result<Json<CommonResponse>, ApiError> {
    let loaded = compared_tables(&state, &params).await?;
    let tables: Vec<CleanedTable> = loaded.into_iter().map(|(_, t)| t).collect();
    Ok(Json(CommonResponse {
        columns: common_columns(&tables).into_iter().collect(),
    }))
}

async fn get_overlay(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ColumnsQuery>,
) -> Result<Json<OverlayResponse>, ApiError> {
    let window: DateWindow = parse_or(params.window.as_deref(), DateWindow::AllTime)?;
    let columns = split_list(params.columns.as_deref());
    if columns.is_empty() {
        return Err(ApiError::BadRequest("missing ?columns=a,b".into()));
    }
    let (snapshot, table) = state
        .cleaned(params.file.as_deref(), &params.sheet, params.header.as_deref())
        .await?;
    let base = completed_months(&table, &window, state.as_of(params.as_of))?;
    let range = base.bounds().ok_or(PipelineError::Empty(EmptyReason::EmptyWindow))?;
    let series = overlay_columns(&base, &columns, &range)?;
    Ok(Json(OverlayResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        range,
        series,
    }))
}

async fn get_correlation(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CorrelationQuery>,
) -> Result<Json<CorrelationResponse>, ApiError> {
    let window: DateWindow = parse_or(params.window.as_deref(), DateWindow::AllTime)?;
    let (snapshot, table) = state
        .cleaned(params.file.as_deref(), &params.sheet, params.header.as_deref())
        .await?;
    let table = completed_months(&table, &window, state.as_of(params.as_of))?;
    for name in [&params.x, &params.y] {
        if table.column(name).is_none() {
            return Err(ApiError::Pipeline(EmptyReason::MissingColumn(name.clone()).into()));
        }
    }
    let r = pearson(&table, &params.x, &params.y);
    Ok(Json(CorrelationResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        rows: table.len(),
        r,
        x: params.x,
        y: params.y,
    }))
}

async fn get_heatmap(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ColumnsQuery>,
) -> Result<Json<HeatmapResponse>, ApiError> {
    let window: DateWindow = parse_or(params.window.as_deref(), DateWindow::AllTime)?;
    let (snapshot, table) = state
        .cleaned(params.file.as_deref(), &params.sheet, params.header.as_deref())
        .await?;
    let windowed = completed_months(&table, &window, state.as_of(params.as_of))?;

    let mut requested = split_list(params.columns.as_deref());
    if requested.is_empty() {
        requested = windowed.column_names().into_iter().map(String::from).collect();
    }
    let (columns, rows) = zscore_matrix(&windowed, &requested);
    if columns.is_empty() {
        return Err(ApiError::Pipeline(EmptyReason::NoCommonColumn.into()));
    }
    Ok(Json(HeatmapResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        columns,
        rows,
    }))
}

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

async fn get_export(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window: DateWindow = parse_or(params.window.as_deref(), DateWindow::AllTime)?;
    let format = params.format.as_deref().map(str::trim).unwrap_or("csv").to_ascii_lowercase();
    let (_, table) = state
        .cleaned(params.file.as_deref(), &params.sheet, params.header.as_deref())
        .await?;
    let base = completed_months(&table, &window, state.as_of(params.as_of))?;
    let export_failed = |e: String| ApiError::Pipeline(PipelineError::Malformed(format!("{} export: {}", format, e)));

    let (content_type, body) = match format.as_str() {
        "csv" => (
            "text/csv; charset=utf-8",
            to_csv_string(&base).map_err(|e| export_failed(e.to_string()))?.into_bytes(),
        ),
        "xlsx" => (XLSX_CONTENT_TYPE, to_xlsx_bytes(&[&base]).map_err(|e| export_failed(e.to_string()))?),
        other => return Err(ApiError::BadRequest(format!("unknown export format '{}' (expected csv or xlsx)", other))),
    };
    let disposition = format!("attachment; filename=\"{}.{}\"", table.name.replace('"', ""), format);
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn get_facilities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FacilitiesQuery>,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let file = state.settings.facilities_file.as_str();
    let location = state.location(Some(file))?;
    let sheets = state.source.list_tables(&location).await?;
    let first = sheets
        .first()
        .ok_or_else(|| PipelineError::Malformed(format!("{}: workbook has no worksheets", file)))?;
    let snapshot = state.snapshot(Some(file), first).await?;
    let directory = FacilityDirectory::from_raw(&snapshot.table)?;

    let facilities = match params.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => vec![directory
            .find(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("facility '{}'", name)))?],
        None => directory.facilities,
    };
    Ok(Json(FacilitiesResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        facilities,
    }))
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Result<Json<AskResponse>, ApiError> {
    let assistant = state.assistant.as_ref().ok_or(AssistantError::NotConfigured)?;
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question is empty".into()));
    }
    let snapshot = state.snapshot(req.file.as_deref(), &req.sheet).await?;
    let label = match &snapshot.source {
        collector::SourceRef::Workbook { path, .. } => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        collector::SourceRef::Sheet { spreadsheet_id, .. } => spreadsheet_id.clone(),
    };
    let answer = assistant.ask(&data_context(&label, &snapshot.table), req.question.trim()).await?;
    Ok(Json(AskResponse {
        snapshot: SnapshotInfo::from(&snapshot),
        answer,
    }))
}
