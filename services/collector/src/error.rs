use thiserror::Error;

/// Anything that prevents a worksheet from being captured
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: usize },
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// HTTP 429 or a quota message from the Sheets API
    pub fn is_rate_limited(&self) -> bool {
        match self {
            FetchError::Status { status, message } => {
                *status == 429 || message.contains("Quota") || message.contains("RESOURCE_EXHAUSTED")
            }
            FetchError::RateLimited { .. } => true,
            _ => false,
        }
    }
}

impl From<calamine::Error> for FetchError {
    fn from(e: calamine::Error) -> Self {
        FetchError::Workbook(e.to_string())
    }
}

impl From<csv::Error> for FetchError {
    fn from(e: csv::Error) -> Self {
        FetchError::Workbook(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Snapshot(e.to_string())
    }
}
