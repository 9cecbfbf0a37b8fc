use crate::assistant::AssistantClient;
use crate::config::DEFAULT_FACILITIES_FILE;
use crate::error::ApiError;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use collector::{FetchError, Location, Snapshot, SnapshotCache, Source};
use parser::{AlertPolicy, HeaderMode};
use std::path::Path;
use tokio::sync::Mutex;

/// Request-independent settings shared by the handlers
#[derive(Debug, Clone)]
pub struct Settings {
    pub utc_offset_hours: i32,
    pub policy: AlertPolicy,
    pub header_mode: HeaderMode,
    pub config_sheet: String,
    /// Workbook behind `/facilities`, inside one of the local folders
    pub facilities_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            utc_offset_hours: 2,
            policy: AlertPolicy::default(),
            header_mode: HeaderMode::default(),
            config_sheet: "Config".to_string(),
            facilities_file: DEFAULT_FACILITIES_FILE.to_string(),
        }
    }
}

pub struct AppState {
    pub source: Source,
    pub spreadsheet_id: Option<String>,
    pub cache: Mutex<SnapshotCache>,
    pub settings: Settings,
    pub assistant: Option<AssistantClient>,
}

impl AppState {
    /// Today on the dashboard's local clock
    pub fn today(&self) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.settings.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        Utc::now().with_timezone(&offset).date_naive()
    }

    /// `?file=` when given (restricted to the configured folders), the
    /// configured spreadsheet otherwise
    pub fn location(&self, file: Option<&str>) -> Result<Location, ApiError> {
        match file.map(str::trim).filter(|f| !f.is_empty()) {
            Some(file) => Ok(Location::File(self.source.resolve_file(Path::new(file))?)),
            None => self
                .spreadsheet_id
                .clone()
                .map(Location::Spreadsheet)
                .ok_or_else(|| {
                    ApiError::Fetch(FetchError::Config(
                        "no spreadsheet configured; pass ?file= for a local workbook".into(),
                    ))
                }),
        }
    }

    pub async fn snapshot(&self, file: Option<&str>, sheet: &str) -> Result<Snapshot, ApiError> {
        let target = self.location(file)?.table(sheet);
        if let Some(hit) = self.cache.lock().await.get(&target, Utc::now()).cloned() {
            tracing::debug!(source = %target, "snapshot cache hit");
            return Ok(hit);
        }
        // the lock is not held while fetching, so one slow worksheet does not
        // stall requests for the others
        let snapshot = self.source.fetch(&target).await?;
        self.cache.lock().await.insert(snapshot.clone());
        Ok(snapshot)
    }
}
