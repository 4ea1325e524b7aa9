use crate::services::dispatcher::CallOutcome;
use crate::services::payload::Payload;
use serde_json::{json, Value};

/// MCP tool result for one payload block.
pub fn build_payload_envelope(payload: &Payload, is_error: bool) -> Value {
    json!({
        "content": [ { "type": payload.kind.as_str(), "text": payload.text } ],
        "isError": is_error,
    })
}

/// Upstream failures stay in-band: the body is preserved and `isError` set.
pub fn build_outcome_envelope(outcome: &CallOutcome) -> Value {
    build_payload_envelope(&outcome.payload, !outcome.success)
}

pub fn build_json_envelope(value: &Value) -> Value {
    build_payload_envelope(&Payload::json(value), false)
}
