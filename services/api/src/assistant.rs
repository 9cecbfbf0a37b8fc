//! "Ask your data": sends a worksheet plus a question to a hosted model

use parser::RawTable;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant not configured")]
    NotConfigured,
    #[error("assistant request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistant returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("assistant returned no answer")]
    EmptyAnswer,
    #[error("invalid assistant configuration: {0}")]
    Config(String),
}

/// The worksheet as plain text: source, sheet name, then one line per row
pub fn data_context(source_label: &str, table: &RawTable) -> String {
    let mut out = format!("File: {}\nSheet: {}\n\n", source_label, table.name);
    for row in &table.rows {
        let line: Vec<String> = row.iter().map(|c| c.as_text().trim().to_string()).collect();
        if line.iter().all(|c| c.is_empty()) {
            continue;
        }
        out.push_str(&line.join(" | "));
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl AssistantClient {
    pub fn new(base_url: &str, model: &str, api_key: impl Into<String>) -> Result<Self, AssistantError> {
        let mut endpoint =
            Url::parse(base_url).map_err(|e| AssistantError::Config(format!("base URL '{}': {}", base_url, e)))?;
        let method = format!("{}:generateContent", model);
        endpoint
            .path_segments_mut()
            .map_err(|_| AssistantError::Config(format!("base URL '{}' cannot hold a path", base_url)))?
            .pop_if_empty()
            .extend(["v1beta", "models", method.as_str()]);
        let http = reqwest::Client::builder().timeout(Duration::from_secs(90)).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub async fn ask(&self, context: &str, question: &str) -> Result<String, AssistantError> {
        let prompt = format!(
            "Analyze the following data and answer the user's question.\n\nData:\n---\n{}\n---\n\nQuestion: \"{}\"",
            context, question
        );
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &prompt }],
            }],
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AssistantError::Upstream {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        let answer: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(AssistantError::EmptyAnswer);
        }
        tracing::debug!(chars = answer.len(), "assistant answered");
        Ok(answer)
    }
}
