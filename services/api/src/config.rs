use anyhow::{Context, Result};
use parser::aggregate::DEFAULT_ALERT_THRESHOLD;
use parser::HeaderMode;

pub const DEFAULT_ASSISTANT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ASSISTANT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_FACILITIES_FILE: &str = "uploads/facilities_data.xlsx";

/// API settings. Sheets/workbook access is configured through
/// [`collector::Config`].
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    /// Hours east of UTC used for "today" (the dashboards run on Cairo time)
    pub utc_offset_hours: i32,
    pub alert_threshold: f64,
    pub header_mode: HeaderMode,
    /// Worksheet listing the KPIs that are summed
    pub config_sheet: String,
    /// Facility directory workbook (facility, manager, phone)
    pub facilities_file: String,
    pub assistant_base_url: String,
    pub assistant_model: String,
    pub assistant_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let utc_offset_hours = match non_empty("DASHBOARD_UTC_OFFSET") {
            Some(v) => v.parse::<i32>().with_context(|| format!("DASHBOARD_UTC_OFFSET must be whole hours, got '{}'", v))?,
            None => 2,
        };
        if !(-14..=14).contains(&utc_offset_hours) {
            anyhow::bail!("DASHBOARD_UTC_OFFSET out of range: {}", utc_offset_hours);
        }

        let alert_threshold = match non_empty("ALERT_THRESHOLD") {
            Some(v) => v.parse::<f64>().with_context(|| format!("ALERT_THRESHOLD must be a number, got '{}'", v))?,
            None => DEFAULT_ALERT_THRESHOLD,
        };

        let header_mode = match non_empty("HEADER_MODE") {
            Some(v) => v.parse::<HeaderMode>().map_err(anyhow::Error::msg)?,
            None => HeaderMode::default(),
        };

        Ok(Self {
            bind: non_empty("API_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            utc_offset_hours,
            alert_threshold,
            header_mode,
            config_sheet: non_empty("CONFIG_SHEET").unwrap_or_else(|| "Config".to_string()),
            facilities_file: non_empty("FACILITIES_FILE").unwrap_or_else(|| DEFAULT_FACILITIES_FILE.to_string()),
            assistant_base_url: non_empty("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_ASSISTANT_BASE_URL.to_string()),
            assistant_model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_ASSISTANT_MODEL.to_string()),
            assistant_api_key: non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
        })
    }
}
