use crate::errors::DispatchError;
use crate::services::auth::AuthResolver;
use crate::services::cache::{cache_key, Lookup, ResponseCache};
use crate::services::executor::{RetryPolicy, RetryingExecutor};
use crate::services::logger::Logger;
use crate::services::operation_index::OperationIndex;
use crate::services::payload::Payload;
use crate::services::request_builder;
use reqwest::header::{HeaderValue, IF_NONE_MATCH};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// Arguments of one dispatched call, as received from `call_operation`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub operation_id: String,
    #[serde(default)]
    pub path_params: Map<String, Value>,
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default, deserialize_with = "timeout_millis")]
    pub timeout_ms: Option<u64>,
}

/// Accepts any JSON number. Zero means "use the default"; fractions truncate
/// and anything positive is at least one millisecond.
fn timeout_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| ms.max(1.0) as u64))
}

impl CallRequest {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            ..Self::default()
        }
    }

    pub fn path_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.path_params.insert(name.to_string(), value.into());
        self
    }

    pub fn query_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Bypass,
    Miss,
    Hit,
    Revalidated,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Bypass => "bypass",
            CacheStatus::Miss => "miss",
            CacheStatus::Hit => "hit",
            CacheStatus::Revalidated => "revalidated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallOutcome {
    pub payload: Payload,
    pub success: bool,
    pub status: u16,
    pub cache: CacheStatus,
}

/// Public entry point: resolve, authorize, build, consult the cache, fetch
/// with retries, update the cache.
pub struct Dispatcher {
    index: Arc<OperationIndex>,
    auth: AuthResolver,
    cache: Option<Arc<ResponseCache>>,
    executor: RetryingExecutor,
    policy: RetryPolicy,
    logger: Logger,
}

impl Dispatcher {
    pub fn new(
        index: Arc<OperationIndex>,
        auth: AuthResolver,
        cache: Option<Arc<ResponseCache>>,
        executor: RetryingExecutor,
        policy: RetryPolicy,
        logger: Logger,
    ) -> Self {
        Self {
            index,
            auth,
            cache,
            executor,
            policy,
            logger: logger.child("dispatch"),
        }
    }

    pub fn index(&self) -> &OperationIndex {
        &self.index
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_deref()
    }

    pub async fn call(&self, request: &CallRequest) -> Result<CallOutcome, DispatchError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let descriptor = match self.index.resolve(&request.operation_id) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.logger.debug(
                    "Unknown operation",
                    Some(&json!({"request_id": request_id, "operation_id": request.operation_id})),
                );
                return Err(err);
            }
        };
        let decision = self.auth.decide(descriptor);
        let mut prepared = request_builder::build(
            descriptor,
            &request.path_params,
            &request.query,
            &request.headers,
            request.body.as_ref(),
            &decision,
        )?;
        let key = cache_key(&prepared.url, &self.auth.query_param_name(descriptor));

        self.logger.debug(
            "Dispatching operation",
            Some(&json!({
                "request_id": request_id,
                "operation_id": descriptor.operation_id,
                "method": prepared.method.as_str(),
                "url": key,
                "auth": decision.location().map(|l| l.as_str()),
            })),
        );

        let cache = self.cache.as_deref().filter(|_| prepared.is_get());

        if let Some(cache) = cache {
            match cache.lookup(&key, Instant::now()) {
                Lookup::Fresh(entry) => {
                    return Ok(self.finish(
                        &request_id,
                        started,
                        CallOutcome {
                            payload: entry.payload,
                            success: true,
                            status: 200,
                            cache: CacheStatus::Hit,
                        },
                    ));
                }
                Lookup::Stale(entry) => {
                    if let Some(value) = entry
                        .etag
                        .as_deref()
                        .and_then(|etag| HeaderValue::from_str(etag).ok())
                    {
                        prepared.headers.insert(IF_NONE_MATCH, value);
                    }
                }
                Lookup::Miss => {}
            }
        }

        let policy = self.policy.clone().with_attempt_timeout(request.timeout_ms);
        let response = self.executor.execute(&prepared, &policy, &key).await?;

        let Some(cache) = cache else {
            let outcome = CallOutcome {
                success: response.is_success(),
                status: response.status,
                payload: Payload::from_body(&response.body),
                cache: CacheStatus::Bypass,
            };
            return Ok(self.finish(&request_id, started, outcome));
        };

        let now = Instant::now();
        let outcome = if response.status == 304 {
            match cache.revalidate(&key, now) {
                Some(entry) => CallOutcome {
                    payload: entry.payload,
                    success: true,
                    status: response.status,
                    cache: CacheStatus::Revalidated,
                },
                None => CallOutcome {
                    payload: Payload::from_body(&response.body),
                    success: false,
                    status: response.status,
                    cache: CacheStatus::Miss,
                },
            }
        } else {
            let payload = Payload::from_body(&response.body);
            if response.is_success() {
                cache.store(&key, payload.clone(), response.etag(), now);
            }
            CallOutcome {
                success: response.is_success(),
                status: response.status,
                payload,
                cache: CacheStatus::Miss,
            }
        };
        Ok(self.finish(&request_id, started, outcome))
    }

    fn finish(&self, request_id: &str, started: Instant, outcome: CallOutcome) -> CallOutcome {
        self.logger.debug(
            "Operation completed",
            Some(&json!({
                "request_id": request_id,
                "status": outcome.status,
                "success": outcome.success,
                "cache": outcome.cache.as_str(),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );
        outcome
    }
}
