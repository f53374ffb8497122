use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use pickmirror_config::RemoteApiConfig;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::gate::{GovernorGate, PauseReason, RateGate};

/// Longest `Retry-After` the client will honor.
const MAX_RETRY_AFTER_SECS: u64 = 60;
/// Ceiling for exponential transport backoff.
const MAX_BACKOFF_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("rate limited {retries} times in a row, giving up")]
    RateLimitExceeded { retries: u32 },

    #[error("transport failed after {attempts} attempts: {last_error}")]
    Transport { attempts: u32, last_error: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// One page of raw remote records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub has_more: bool,
}

/// Incremental lower bound, sent only to endpoints that support it.
#[derive(Debug, Clone, Copy)]
pub struct SinceFilter<'a> {
    pub param: &'a str,
    pub since: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RateLimitedClient {
    client: Client,
    config: RemoteApiConfig,
    gate: Arc<dyn RateGate>,
}

impl RateLimitedClient {
    pub fn new(config: RemoteApiConfig) -> Result<Self, ClientError> {
        let gate = Arc::new(GovernorGate::per_minute(config.requests_per_minute));
        Self::with_gate(config, gate)
    }

    /// Build a client around an existing gate, e.g. one shared with another
    /// client using the same credential, or a test gate.
    pub fn with_gate(config: RemoteApiConfig, gate: Arc<dyn RateGate>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            gate,
        })
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Fetch one page at `offset`, waiting on the rate gate before every
    /// attempt and retrying throttling and transient failures.
    pub async fn fetch_page(
        &self,
        endpoint: &str,
        offset: usize,
        page_size: usize,
        since: Option<SinceFilter<'_>>,
    ) -> Result<Page, ClientError> {
        let url = format!(
            "{}/{}",
            self.config.base_url,
            endpoint.trim_start_matches('/')
        );
        let mut query = vec![("offset".to_string(), offset.to_string())];
        if let Some(filter) = since {
            query.push((
                filter.param.to_string(),
                filter.since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }

        let mut throttled: u32 = 0;
        let mut attempts: u32 = 0;

        loop {
            self.gate.acquire().await;
            attempts += 1;

            let response = match self
                .client
                .get(&url)
                .query(&query)
                .bearer_auth(&self.config.api_token)
                .header(ACCEPT, "application/json")
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) if is_transport(&e) => {
                    throttled = 0;
                    self.backoff_or_fail(attempts, e.to_string()).await?;
                    continue;
                }
                Err(e) => return Err(ClientError::Request(e)),
            };

            let status = response.status();

            if status.is_success() {
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(e) => {
                        throttled = 0;
                        self.backoff_or_fail(attempts, format!("reading body: {e}"))
                            .await?;
                        continue;
                    }
                };
                let page = parse_page(&body, page_size)?;
                tracing::debug!(
                    endpoint,
                    offset,
                    items = page.items.len(),
                    has_more = page.has_more,
                    "fetched page"
                );
                return Ok(page);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                throttled += 1;
                // Throttled attempts do not count against the transport budget.
                attempts -= 1;
                // Consecutive throttles only; any other retry resets the count.
                if throttled > self.config.max_rate_limit_retries {
                    return Err(ClientError::RateLimitExceeded {
                        retries: self.config.max_rate_limit_retries,
                    });
                }
                let wait = retry_after(&response)
                    .unwrap_or(Duration::from_secs(self.config.rate_limit_cooldown_secs));
                tracing::warn!(endpoint, throttled, wait_secs = wait.as_secs(), "rate-limited, cooling down");
                self.gate.pause(PauseReason::RateLimited, wait).await;
                continue;
            }

            if status.is_server_error() {
                throttled = 0;
                let body = response.text().await.unwrap_or_default();
                self.backoff_or_fail(attempts, format!("{status}: {body}"))
                    .await?;
                continue;
            }

            // Fail fast on 4xx (except 429 handled above)
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http { status, body });
        }
    }

    async fn backoff_or_fail(&self, attempts: u32, last_error: String) -> Result<(), ClientError> {
        if attempts >= self.config.max_attempts {
            return Err(ClientError::Transport {
                attempts,
                last_error,
            });
        }
        let backoff_secs = std::cmp::min(1u64 << attempts.min(16), MAX_BACKOFF_SECS);
        tracing::warn!(attempts, backoff_secs, error = %last_error, "retrying after backoff");
        self.gate
            .pause(PauseReason::Backoff, Duration::from_secs(backoff_secs))
            .await;
        Ok(())
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

/// Anything that went wrong on the wire rather than in building the request
/// or following redirects.
fn is_transport(err: &reqwest::Error) -> bool {
    !(err.is_builder() || err.is_redirect() || err.is_decode())
}

fn parse_page(body: &[u8], page_size: usize) -> Result<Page, ClientError> {
    let body: Value =
        serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))?;

    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ClientError::Decode(format!(
                    "`data` is not an array: {other}"
                )))
            }
        },
        other => {
            return Err(ClientError::Decode(format!(
                "expected an object or array, got {other}"
            )))
        }
    };

    let has_more = !items.is_empty() && items.len() == page_size;
    Ok(Page { items, has_more })
}
