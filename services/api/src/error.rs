use crate::assistant::AssistantError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use collector::FetchError;
use parser::{EmptyReason, PipelineError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EmptyReason>,
}

/// Handler failures, kept apart so the status says which stage failed:
/// fetching (502), cleaning (422) or a legitimately empty result (404).
#[derive(Debug)]
pub enum ApiError {
    Fetch(FetchError),
    Pipeline(PipelineError),
    Assistant(AssistantError),
    BadRequest(String),
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Fetch(e)
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        ApiError::Assistant(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fetch(FetchError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Fetch(FetchError::Config(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Pipeline(PipelineError::Malformed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(PipelineError::Empty(_)) => StatusCode::NOT_FOUND,
            ApiError::Assistant(AssistantError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Assistant(AssistantError::Config(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Assistant(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Fetch(e) => e.to_string(),
            ApiError::Pipeline(e) => e.to_string(),
            ApiError::Assistant(e) => e.to_string(),
            ApiError::BadRequest(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        let reason = match &self {
            ApiError::Pipeline(PipelineError::Empty(r)) => Some(r.clone()),
            _ => None,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.message(),
                reason,
            }),
        )
            .into_response()
    }
}
