use crate::errors::ToolError;
use thiserror::Error;

/// Failures that end a dispatched call without an upstream response.
///
/// Upstream HTTP errors are not represented here: any status the remote
/// service returns is a normal outcome with `success == false`.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("operationId not found: {operation_id}")]
    OperationNotFound {
        operation_id: String,
        suggestions: Vec<String>,
    },

    #[error("request to {url} failed after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: usize,
        timed_out: bool,
        message: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Transport { .. })
    }
}

impl From<DispatchError> for ToolError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::OperationNotFound { suggestions, .. } => {
                let mut out = ToolError::not_found(message)
                    .with_code("OPERATION_NOT_FOUND")
                    .with_hint("Use list_operations to discover available operationIds.");
                if !suggestions.is_empty() {
                    out = out.with_details(serde_json::json!({ "did_you_mean": suggestions }));
                }
                out
            }
            DispatchError::Transport {
                url,
                attempts,
                timed_out,
                ..
            } => {
                let base = if timed_out {
                    ToolError::timeout(message)
                } else {
                    ToolError::retryable(message)
                };
                base.with_code("UPSTREAM_UNREACHABLE")
                    .with_details(serde_json::json!({ "url": url, "attempts": attempts }))
            }
            DispatchError::InvalidRequest(_) => ToolError::invalid_params(message),
        }
    }
}
