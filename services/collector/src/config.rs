use crate::error::FetchError;
use crate::sheets::{Credentials, SheetsClient, DEFAULT_BASE_URL};
use crate::source::Source;
use std::path::PathBuf;

/// Collector settings read from the environment (`.env` supported by the
/// binaries).
#[derive(Debug, Clone)]
pub struct Config {
    pub spreadsheet_id: Option<String>,
    pub sheets_base_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub local_folders: Vec<PathBuf>,
    pub snapshot_dir: PathBuf,
    pub cache_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Result<Self, FetchError> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cache_ttl_secs = match non_empty("CACHE_TTL_SECS") {
            Some(v) => v
                .parse::<i64>()
                .map_err(|_| FetchError::Config(format!("CACHE_TTL_SECS must be a number of seconds, got '{}'", v)))?,
            None => 900,
        };

        Ok(Self {
            spreadsheet_id: non_empty("SPREADSHEET_ID"),
            sheets_base_url: non_empty("SHEETS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: non_empty("SHEETS_API_KEY"),
            access_token: non_empty("SHEETS_ACCESS_TOKEN"),
            local_folders: non_empty("LOCAL_FOLDERS")
                .unwrap_or_else(|| "uploads;Center".to_string())
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
            snapshot_dir: PathBuf::from(non_empty("SNAPSHOT_DIR").unwrap_or_else(|| "./data/snapshots".to_string())),
            cache_ttl_secs,
        })
    }

    /// Bearer token wins over an API key
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.access_token, &self.api_key) {
            (Some(token), _) => Some(Credentials::Bearer(token.clone())),
            (None, Some(key)) => Some(Credentials::ApiKey(key.clone())),
            (None, None) => None,
        }
    }

    pub fn sheets_client(&self) -> Result<Option<SheetsClient>, FetchError> {
        self.credentials()
            .map(|c| SheetsClient::new(&self.sheets_base_url, c))
            .transpose()
    }

    pub fn source(&self) -> Result<Source, FetchError> {
        Ok(Source::new(self.sheets_client()?, self.local_folders.clone()))
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, FetchError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_env_with(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.spreadsheet_id, None);
        assert_eq!(c.sheets_base_url, DEFAULT_BASE_URL);
        assert_eq!(c.local_folders, vec![PathBuf::from("uploads"), PathBuf::from("Center")]);
        assert_eq!(c.cache_ttl_secs, 900);
        assert!(c.credentials().is_none());
        assert!(c.sheets_client().unwrap().is_none());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("SPREADSHEET_ID", " abc "),
            ("SHEETS_API_KEY", "key"),
            ("SHEETS_ACCESS_TOKEN", ""),
            ("LOCAL_FOLDERS", "a; b ;"),
            ("CACHE_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(c.spreadsheet_id.as_deref(), Some("abc"));
        assert!(matches!(c.credentials(), Some(Credentials::ApiKey(k)) if k == "key"));
        assert_eq!(c.local_folders, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(c.cache_ttl().num_seconds(), 60);
    }

    #[test]
    fn test_token_preferred_over_key() {
        let c = config(&[("SHEETS_API_KEY", "key"), ("SHEETS_ACCESS_TOKEN", "tok")]).unwrap();
        assert!(matches!(c.credentials(), Some(Credentials::Bearer(t)) if t == "tok"));
    }

    #[test]
    fn test_bad_ttl() {
        assert!(matches!(config(&[("CACHE_TTL_SECS", "soon")]), Err(FetchError::Config(_))));
    }
}
