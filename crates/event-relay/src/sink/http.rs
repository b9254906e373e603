// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collector sink: POSTs encoded batches as JSON with bounded retry and
//! exponential backoff.
//!
//! # Classification
//!
//! - **2xx**: `Delivered`
//! - **Retryable status** (429, 500, 502, 503, 504 by default) and
//!   **connection-level errors**: retried up to `max_attempts`, then `Degraded`
//! - **Other 4xx**: `Fatal`, not retried (malformed payload, missing or
//!   rejected source id)
//! - **Anything else**: `Degraded`, not retried

use crate::error::{ConfigError, DeliveryError};
use crate::http_utils::build_client;
use crate::sink::{DeliveryOutcome, DeliverySink};
use crate::transform::EncodedBatch;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Header identifying the deployment a payload comes from. The collector
/// rejects requests without it.
pub const SOURCE_ID_HEADER: &str = "X-Source-Id";

const MAX_LOGGED_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per `send`, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for every further attempt.
    pub backoff_factor: Duration,
    /// Statuses worth retrying.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_factor: Duration::from_millis(300),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_factor.saturating_mul(1 << exponent)
    }

    pub fn retries_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }
}

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    pub endpoint: String,
    pub source_id: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub https_proxy: Option<String>,
    pub retry_policy: RetryPolicy,
}

enum Attempt {
    Accepted,
    Retry(DeliveryError),
    GiveUp(DeliveryError),
}

#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    retry_policy: RetryPolicy,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, ConfigError> {
        if config.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("sink endpoint"));
        }
        match reqwest::Url::parse(config.endpoint.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    name: "sink endpoint",
                    value: config.endpoint.clone(),
                })
            }
        }
        if config.source_id.trim().is_empty() {
            return Err(ConfigError::Missing("source id"));
        }
        if config.retry_policy.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "retry count",
                value: "0".to_string(),
            });
        }

        let source_id =
            HeaderValue::from_str(config.source_id.trim()).map_err(|_| ConfigError::InvalidValue {
                name: "source id",
                value: config.source_id.clone(),
            })?;
        let mut headers = HeaderMap::new();
        headers.insert(SOURCE_ID_HEADER, source_id);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = build_client(config.https_proxy.as_deref(), config.timeout).map_err(|e| {
            error!("HTTP_SINK | Unable to build HTTP client: {e}");
            ConfigError::InvalidValue {
                name: "https proxy",
                value: config.https_proxy.clone().unwrap_or_default(),
            }
        })?;

        Ok(HttpSink {
            client,
            endpoint: config.endpoint,
            headers,
            retry_policy: config.retry_policy,
        })
    }

    async fn attempt(&self, body: Vec<u8>) -> Attempt {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Attempt::Accepted;
                }
                // Only read the body on failure, for the log line
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<failed to read body>"));
                let message = format!("{status}: {}", truncate(&body));

                if self.retry_policy.retries_status(status) {
                    Attempt::Retry(DeliveryError::Transient(message))
                } else if status.is_client_error() {
                    Attempt::GiveUp(DeliveryError::Permanent(message))
                } else {
                    Attempt::GiveUp(DeliveryError::Transient(message))
                }
            }
            Err(e) if e.is_builder() => Attempt::GiveUp(DeliveryError::Permanent(e.to_string())),
            Err(e) => Attempt::Retry(DeliveryError::Transient(e.to_string())),
        }
    }
}

#[async_trait]
impl DeliverySink for HttpSink {
    async fn send(&self, payload: &[EncodedBatch]) -> DeliveryOutcome {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                error!("HTTP_SINK | Failed to serialize payload. Data dropped: {e}");
                return DeliveryOutcome::Fatal;
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let time = Instant::now();
            let result = self.attempt(body.clone()).await;
            let elapsed = time.elapsed();

            match result {
                Attempt::Accepted => {
                    debug!(
                        "HTTP_SINK | Delivered {} batches in {} ms after {attempts} attempts",
                        payload.len(),
                        elapsed.as_millis()
                    );
                    return DeliveryOutcome::Delivered;
                }
                Attempt::GiveUp(e) if e.is_transient() => {
                    warn!("HTTP_SINK | Delivery failed without retry: {e}");
                    return DeliveryOutcome::Degraded;
                }
                Attempt::GiveUp(e) => {
                    error!("HTTP_SINK | Collector refused payload, giving up: {e}");
                    return DeliveryOutcome::Fatal;
                }
                Attempt::Retry(e) => {
                    if attempts >= self.retry_policy.max_attempts {
                        warn!(
                            "HTTP_SINK | Failed to deliver after {attempts} attempts ({} ms last attempt): {e}",
                            elapsed.as_millis()
                        );
                        return DeliveryOutcome::Degraded;
                    }
                    let backoff = self.retry_policy.backoff(attempts);
                    debug!(
                        "HTTP_SINK | Attempt {attempts} failed: {e}, retrying in {} ms",
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() > MAX_LOGGED_BODY_CHARS {
        let head: String = body.chars().take(MAX_LOGGED_BODY_CHARS).collect();
        format!("{head}... (truncated {} bytes)", body.len())
    } else {
        body.to_string()
    }
}
