//! Immutable worksheet snapshots and the caller-owned cache that holds them

use crate::error::FetchError;
use chrono::{DateTime, Duration, Utc};
use parser::RawTable;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Where a worksheet comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    Sheet { spreadsheet_id: String, worksheet: String },
    Workbook { path: PathBuf, sheet: String },
}

impl SourceRef {
    pub fn sheet(spreadsheet_id: impl Into<String>, worksheet: impl Into<String>) -> Self {
        SourceRef::Sheet {
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
        }
    }

    pub fn workbook(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        SourceRef::Workbook {
            path: path.into(),
            sheet: sheet.into(),
        }
    }

    /// Worksheet / sheet name
    pub fn table_name(&self) -> &str {
        match self {
            SourceRef::Sheet { worksheet, .. } => worksheet,
            SourceRef::Workbook { sheet, .. } => sheet,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Sheet { spreadsheet_id, worksheet } => write!(f, "sheets:{}/{}", spreadsheet_id, worksheet),
            SourceRef::Workbook { path, sheet } => write!(f, "file:{}#{}", path.display(), sheet),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: Uuid,
    pub source: SourceRef,
    pub captured_at: DateTime<Utc>,
    pub content_hash: String,
    pub table: RawTable,
}

/// `sha256:<hex>` over the JSON form of the table
pub fn content_hash(table: &RawTable) -> Result<String, FetchError> {
    let bytes = serde_json::to_vec(table)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

impl Snapshot {
    pub fn capture(source: SourceRef, table: RawTable) -> Result<Self, FetchError> {
        Self::capture_at(source, table, Utc::now())
    }

    pub fn capture_at(source: SourceRef, table: RawTable, at: DateTime<Utc>) -> Result<Self, FetchError> {
        Ok(Self {
            snapshot_id: Uuid::new_v4(),
            content_hash: content_hash(&table)?,
            source,
            captured_at: at,
            table,
        })
    }
}

/// Snapshots keyed by source, each valid for `ttl` after capture. Owned by
/// whoever needs it; there is no global cache.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    ttl: Duration,
    entries: HashMap<SourceRef, Snapshot>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_fresh(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        now - snapshot.captured_at < self.ttl
    }

    /// The cached snapshot for `source` if it has not expired
    pub fn get(&self, source: &SourceRef, now: DateTime<Utc>) -> Option<&Snapshot> {
        self.entries.get(source).filter(|s| self.is_fresh(s, now))
    }

    /// Store a snapshot, returning the one it replaces. Entries already
    /// expired at the new snapshot's capture time are dropped.
    pub fn insert(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        self.prune(snapshot.captured_at);
        self.entries.insert(snapshot.source.clone(), snapshot)
    }

    /// Drop every entry that is stale at `now`
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, s| now - s.captured_at < ttl);
        if self.entries.len() < before {
            tracing::debug!(evicted = before - self.entries.len(), "expired snapshots evicted");
        }
    }

    pub fn invalidate(&mut self, source: &SourceRef) -> Option<Snapshot> {
        self.entries.remove(source)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write `snapshot` as `<dir>/<snapshot_id>.json`
pub async fn save_to_fs(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf, FetchError> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.json", snapshot.snapshot_id));
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&path, bytes).await?;
    Ok(path)
}

pub async fn load_from_fs(path: &Path) -> Result<Snapshot, FetchError> {
    let bytes = fs::read(path).await?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    let expected = content_hash(&snapshot.table)?;
    if expected != snapshot.content_hash {
        return Err(FetchError::Snapshot(format!(
            "content hash mismatch in {}: recorded {}, computed {}",
            path.display(),
            snapshot.content_hash,
            expected
        )));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn table(value: &str) -> RawTable {
        RawTable::from_text_rows("Visits", &[vec!["Month", "Visits"], vec!["01/2024", value]])
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
    }

    // -------------------------------------------------------------------------
    // HASH & IDENTITY TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_hash_depends_on_content_only() {
        let a = Snapshot::capture_at(SourceRef::sheet("id", "Visits"), table("10"), at(0)).unwrap();
        let b = Snapshot::capture_at(SourceRef::sheet("id", "Visits"), table("10"), at(5)).unwrap();
        let c = Snapshot::capture_at(SourceRef::sheet("id", "Visits"), table("11"), at(5)).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_ne!(a.snapshot_id, b.snapshot_id);
        assert!(a.content_hash.starts_with("sha256:"));
        assert_eq!(a.content_hash.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(SourceRef::sheet("abc", "Finance").to_string(), "sheets:abc/Finance");
        assert_eq!(SourceRef::workbook("uploads/a.xlsx", "S1").table_name(), "S1");
    }

    // -------------------------------------------------------------------------
    // CACHE TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_cache_respects_ttl() {
        let source = SourceRef::sheet("id", "Visits");
        let mut cache = SnapshotCache::new(Duration::minutes(15));
        cache.insert(Snapshot::capture_at(source.clone(), table("10"), at(0)).unwrap());

        assert!(cache.get(&source, at(14)).is_some());
        assert!(cache.get(&source, at(15)).is_none());
        assert!(cache.get(&SourceRef::sheet("id", "Other"), at(1)).is_none());
    }

    #[test]
    fn test_cache_insert_replaces_and_invalidate_removes() {
        let source = SourceRef::sheet("id", "Visits");
        let mut cache = SnapshotCache::new(Duration::minutes(15));
        assert!(cache.insert(Snapshot::capture_at(source.clone(), table("1"), at(0)).unwrap()).is_none());
        let old = cache.insert(Snapshot::capture_at(source.clone(), table("2"), at(1)).unwrap());
        assert_eq!(old.unwrap().table, table("1"));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(&source).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_evicts_expired_entries() {
        let mut cache = SnapshotCache::new(Duration::minutes(15));
        cache.insert(Snapshot::capture_at(SourceRef::sheet("id", "Jan"), table("1"), at(0)).unwrap());
        cache.insert(Snapshot::capture_at(SourceRef::sheet("id", "Feb"), table("2"), at(10)).unwrap());
        assert_eq!(cache.len(), 2);

        cache.insert(Snapshot::capture_at(SourceRef::sheet("id", "Mar"), table("3"), at(20)).unwrap());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&SourceRef::sheet("id", "Jan"), at(0)).is_none());

        cache.prune(at(40));
        assert!(cache.is_empty());
    }

    // -------------------------------------------------------------------------
    // PERSISTENCE TESTS
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let snap = Snapshot::capture(SourceRef::workbook("Center/a.xlsx", "Sheet1"), table("7")).unwrap();
        let path = save_to_fs(dir.path(), &snap).await.unwrap();
        assert!(path.ends_with(format!("{}.json", snap.snapshot_id)));
        let loaded = load_from_fs(&path).await.unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn test_tampered_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut snap = Snapshot::capture(SourceRef::sheet("id", "Visits"), table("7")).unwrap();
        snap.content_hash = "sha256:00".into();
        let path = save_to_fs(dir.path(), &snap).await.unwrap();
        assert!(matches!(load_from_fs(&path).await, Err(FetchError::Snapshot(_))));
    }
}
