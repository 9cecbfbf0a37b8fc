//! Google Sheets v4 REST client

use crate::backoff::Backoff;
use crate::error::FetchError;
use parser::{Cell, RawTable};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// How requests are authorized. Obtaining the token is the caller's job.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey(String),
    Bearer(String),
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    backoff: Backoff,
}

impl SheetsClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|e| FetchError::Config(format!("invalid Sheets base URL '{}': {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("indicator-dashboards/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            credentials,
            backoff: Backoff::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Config(format!("base URL '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::ApiKey(key) => req.query(&[("key", key)]),
            Credentials::Bearer(token) => req.bearer_auth(token),
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &Url, query: &[(&str, &str)]) -> Result<T, FetchError> {
        let req = self.authorize(self.http.get(url.clone()).query(query));
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(b) if b.error.status.is_empty() => b.error.message,
            Ok(b) => format!("{} ({})", b.error.message, b.error.status),
            Err(_) => body,
        };
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(message));
        }
        Err(FetchError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, query: &[(&str, &str)]) -> Result<T, FetchError> {
        self.backoff.run(|| self.get_once(&url, query)).await
    }

    /// Worksheet titles in tab order
    pub async fn list_worksheets(&self, spreadsheet_id: &str) -> Result<Vec<String>, FetchError> {
        let url = self.url(&["v4", "spreadsheets", spreadsheet_id])?;
        let meta: SpreadsheetMeta = self.get(url, &[("fields", "sheets.properties.title")]).await?;
        let titles: Vec<String> = meta.sheets.into_iter().map(|s| s.properties.title).collect();
        tracing::debug!(spreadsheet_id, count = titles.len(), "listed worksheets");
        Ok(titles)
    }

    /// All values of one worksheet as displayed in the sheet
    pub async fn get_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<RawTable, FetchError> {
        let range = format!("'{}'", worksheet.replace('\'', "''"));
        let url = self.url(&["v4", "spreadsheets", spreadsheet_id, "values", &range])?;
        let values: ValueRange = self
            .get(url, &[("valueRenderOption", "FORMATTED_VALUE"), ("majorDimension", "ROWS")])
            .await?;

        let rows: Vec<Vec<Cell>> = values
            .values
            .iter()
            .map(|row| row.iter().map(json_cell).collect())
            .collect();
        tracing::info!(spreadsheet_id, worksheet, rows = rows.len(), "fetched worksheet values");
        Ok(RawTable::new(worksheet, rows))
    }
}

fn json_cell(value: &serde_json::Value) -> Cell {
    match value {
        serde_json::Value::String(s) if s.trim().is_empty() => Cell::Empty,
        serde_json::Value::String(s) => Cell::Text(s.clone()),
        serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        serde_json::Value::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        _ => Cell::Empty,
    }
}
