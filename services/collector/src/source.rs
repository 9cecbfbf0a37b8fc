//! Dispatch between the Sheets API and local workbooks

use crate::error::FetchError;
use crate::sheets::SheetsClient;
use crate::snapshot::{Snapshot, SnapshotCache, SourceRef};
use crate::workbook;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A spreadsheet or a workbook file, before a worksheet is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Spreadsheet(String),
    File(PathBuf),
}

impl Location {
    pub fn table(&self, name: impl Into<String>) -> SourceRef {
        match self {
            Location::Spreadsheet(id) => SourceRef::sheet(id.clone(), name),
            Location::File(path) => SourceRef::workbook(path.clone(), name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Source {
    sheets: Option<SheetsClient>,
    folders: Vec<PathBuf>,
}

impl Source {
    pub fn new(sheets: Option<SheetsClient>, folders: Vec<PathBuf>) -> Self {
        Self { sheets, folders }
    }

    fn sheets(&self) -> Result<&SheetsClient, FetchError> {
        self.sheets
            .as_ref()
            .ok_or_else(|| FetchError::Config("no Sheets credentials configured".into()))
    }

    /// Local workbooks found in the configured folders
    pub fn local_files(&self) -> Vec<PathBuf> {
        workbook::scan_folders(&self.folders)
    }

    /// Resolve a client-supplied file path. Only files inside one of the
    /// configured folders are served.
    pub fn resolve_file(&self, requested: &Path) -> Result<PathBuf, FetchError> {
        let not_found = || FetchError::NotFound(requested.display().to_string());
        let path = requested.canonicalize().map_err(|_| not_found())?;
        let allowed = self
            .folders
            .iter()
            .filter_map(|f| f.canonicalize().ok())
            .any(|folder| path.starts_with(&folder));
        if allowed && path.is_file() {
            Ok(path)
        } else {
            Err(not_found())
        }
    }

    /// Worksheet titles available at `location`
    pub async fn list_tables(&self, location: &Location) -> Result<Vec<String>, FetchError> {
        match location {
            Location::Spreadsheet(id) => self.sheets()?.list_worksheets(id).await,
            Location::File(path) => {
                let path = path.clone();
                blocking(move || workbook::list_sheets(&path)).await
            }
        }
    }

    /// Capture a fresh snapshot of `source`
    pub async fn fetch(&self, source: &SourceRef) -> Result<Snapshot, FetchError> {
        let table = match source {
            SourceRef::Sheet { spreadsheet_id, worksheet } => {
                self.sheets()?.get_values(spreadsheet_id, worksheet).await?
            }
            SourceRef::Workbook { path, sheet } => {
                let (path, sheet) = (path.clone(), sheet.clone());
                blocking(move || workbook::read_sheet(&path, &sheet)).await?
            }
        };
        let snapshot = Snapshot::capture(source.clone(), table)?;
        tracing::info!(
            source = %source,
            snapshot_id = %snapshot.snapshot_id,
            hash = %snapshot.content_hash,
            "snapshot captured"
        );
        Ok(snapshot)
    }

    /// Serve from `cache` while fresh, otherwise fetch and store
    pub async fn fetch_cached(
        &self,
        cache: &mut SnapshotCache,
        source: &SourceRef,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, FetchError> {
        if let Some(hit) = cache.get(source, now) {
            tracing::debug!(source = %source, "snapshot cache hit");
            return Ok(hit.clone());
        }
        let snapshot = self.fetch(source).await?;
        cache.insert(snapshot.clone());
        Ok(snapshot)
    }
}

/// Workbook reads are synchronous; keep them off the async workers
async fn blocking<T, F>(f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Workbook(format!("workbook task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parser::Cell;
    use std::fs;

    fn csv_source() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.csv");
        fs::write(&path, "Month,Visits\n01/2024,10\n").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_fetch_workbook_snapshot() {
        let (_dir, path) = csv_source();
        let source = Source::default();
        let snap = source.fetch(&SourceRef::workbook(&path, "clinic")).await.unwrap();
        assert_eq!(snap.table.rows[1][1], Cell::text("10"));
        assert_eq!(
            source.list_tables(&Location::File(path)).await.unwrap(),
            vec!["clinic"]
        );
    }

    #[test]
    fn test_resolve_file_stays_inside_folders() {
        let (dir, path) = csv_source();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let source = Source::new(None, vec![dir.path().to_path_buf()]);

        assert_eq!(source.resolve_file(&path).unwrap(), path.canonicalize().unwrap());
        let sneaky = dir.path().join("..").join(outside.path().file_name().unwrap());
        assert!(matches!(source.resolve_file(&sneaky), Err(FetchError::NotFound(_))));
        assert!(source.resolve_file(outside.path()).is_err());
        assert!(source.resolve_file(&dir.path().join("nope.csv")).is_err());
    }

    #[tokio::test]
    async fn test_sheet_without_client_is_config_error() {
        let source = Source::default();
        let err = source.fetch(&SourceRef::sheet("id", "Visits")).await.unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[tokio::test]
    async fn test_fetch_cached_reuses_fresh_snapshot() {
        let (_dir, path) = csv_source();
        let source = Source::default();
        let mut cache = SnapshotCache::new(Duration::minutes(5));
        let target = SourceRef::workbook(&path, "clinic");

        let first = source.fetch_cached(&mut cache, &target, Utc::now()).await.unwrap();
        fs::write(&path, "Month,Visits\n01/2024,99\n").unwrap();
        let second = source.fetch_cached(&mut cache, &target, Utc::now()).await.unwrap();
        assert_eq!(first.snapshot_id, second.snapshot_id);

        let later = Utc::now() + Duration::minutes(10);
        let third = source.fetch_cached(&mut cache, &target, later).await.unwrap();
        assert_ne!(first.snapshot_id, third.snapshot_id);
        assert_eq!(third.table.rows[1][1], Cell::text("99"));
    }
}
