use crate::constants::network::TIMEOUT_CONNECTION_MS;
use crate::errors::{DispatchError, ToolError};
use crate::services::logger::Logger;
use crate::services::request_builder::PreparedRequest;
use crate::services::settings::Settings;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ETAG};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn etag(&self) -> Option<String> {
        self.headers
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub message: String,
    pub timed_out: bool,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// One HTTP exchange. Timeouts are enforced by the caller by dropping the future.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportFailure>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ToolError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(TIMEOUT_CONNECTION_MS))
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportFailure> {
        let mut req = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }
        let response = req.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::timeout("HTTP request timed out");
    }
    TransportFailure::new(err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff_base: Duration,
    pub attempt_timeout: Duration,
    pub overall_deadline: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.retry_count,
            backoff_base: Duration::from_millis(settings.retry_backoff_ms),
            attempt_timeout: Duration::from_millis(settings.request_timeout_ms),
            overall_deadline: Duration::from_millis(settings.call_deadline_ms),
        }
    }

    pub fn with_attempt_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        if let Some(ms) = timeout_ms.filter(|ms| *ms > 0) {
            self.attempt_timeout = Duration::from_millis(ms);
        }
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Wait before attempt `attempt` (1-indexed).
    pub fn backoff_before(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff_base.saturating_mul(attempt as u32)
    }
}

fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status)
}

pub struct RetryingExecutor {
    transport: Arc<dyn HttpTransport>,
    logger: Logger,
}

impl RetryingExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, logger: Logger) -> Self {
        Self {
            transport,
            logger: logger.child("executor"),
        }
    }

    /// Runs the request until a non-5xx response, the attempt budget, or the
    /// overall deadline. `label` is the scrubbed URL used in logs and errors.
    pub async fn execute(
        &self,
        request: &PreparedRequest,
        policy: &RetryPolicy,
        label: &str,
    ) -> Result<RawResponse, DispatchError> {
        let deadline = Instant::now() + policy.overall_deadline;
        let mut attempts = 0;
        let mut last_response: Option<RawResponse> = None;
        let mut last_failure: Option<TransportFailure> = None;

        for attempt in 1..=policy.max_attempts() {
            let delay = policy.backoff_before(attempt);
            if !delay.is_zero() {
                if Instant::now() + delay >= deadline {
                    break;
                }
                tokio::time::sleep(delay).await;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let budget = policy.attempt_timeout.min(remaining);
            attempts = attempt;

            match tokio::time::timeout(budget, self.transport.send(request)).await {
                Ok(Ok(response)) => {
                    if !is_retryable_status(response.status) {
                        return Ok(response);
                    }
                    self.logger.debug(
                        "HTTP retry",
                        Some(&json!({"url": label, "attempt": attempt, "status": response.status})),
                    );
                    last_response = Some(response);
                }
                Ok(Err(failure)) => {
                    self.logger.debug(
                        "HTTP retry",
                        Some(&json!({"url": label, "attempt": attempt, "error": failure.message})),
                    );
                    last_failure = Some(failure);
                }
                Err(_) => {
                    let failure = TransportFailure::timeout(format!(
                        "attempt timed out after {} ms",
                        budget.as_millis()
                    ));
                    self.logger.debug(
                        "HTTP retry",
                        Some(&json!({"url": label, "attempt": attempt, "error": failure.message})),
                    );
                    last_failure = Some(failure);
                }
            }
        }

        if let Some(response) = last_response {
            return Ok(response);
        }
        let failure =
            last_failure.unwrap_or_else(|| TransportFailure::timeout("call deadline exceeded"));
        self.logger.warn(
            "Upstream unreachable",
            Some(&json!({"url": label, "attempts": attempts, "error": failure.message})),
        );
        Err(DispatchError::Transport {
            url: label.to_string(),
            attempts,
            timed_out: failure.timed_out,
            message: failure.message,
        })
    }
}
