//! Retry schedule for rate-limited Sheets calls

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;

/// Fixed delays slept after each rate-limited attempt but the last. Other
/// failures are returned immediately.
#[derive(Debug, Clone)]
pub struct Backoff {
    delays: Vec<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            delays: [500, 1000, 2000, 4000, 8000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

impl Backoff {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub async fn run<F, Fut, T>(&self, mut f: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if self.delays.is_empty() {
            return f().await;
        }
        let last = self.delays.len() - 1;
        for (attempt, delay) in self.delays.iter().enumerate() {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_rate_limited() && attempt == last => {
                    tracing::warn!(attempts = attempt + 1, "rate limited, giving up");
                }
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                    tokio::time::sleep(*delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(FetchError::RateLimited {
            attempts: self.delays.len(),
        })
    }
}
