use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Json,
    Text,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Json => "json",
            PayloadKind::Text => "text",
        }
    }
}

/// Normalized response body. JSON bodies are re-serialized compactly so that
/// equal documents compare byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub kind: PayloadKind,
    pub text: String,
}

impl Payload {
    pub fn from_body(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self {
                kind: PayloadKind::Json,
                text: value.to_string(),
            },
            Err(_) => Self::text(raw),
        }
    }

    pub fn text(raw: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Text,
            text: raw.into(),
        }
    }

    pub fn json(value: &Value) -> Self {
        Self {
            kind: PayloadKind::Json,
            text: value.to_string(),
        }
    }

    pub fn as_json(&self) -> Option<Value> {
        match self.kind {
            PayloadKind::Json => serde_json::from_str(&self.text).ok(),
            PayloadKind::Text => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_bodies_are_compacted() {
        let payload = Payload::from_body("{ \"a\" : [1, 2] }\n");
        assert_eq!(payload.kind, PayloadKind::Json);
        assert_eq!(payload.text, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn object_key_order_survives() {
        let payload = Payload::from_body(r#"{"name": "AE", "_links": {"self": 1, "a": 2}, "id": 7}"#);
        assert_eq!(payload.text, r#"{"name":"AE","_links":{"self":1,"a":2},"id":7}"#);
    }

    #[test]
    fn malformed_json_degrades_to_text() {
        let payload = Payload::from_body("{\"a\": ");
        assert_eq!(payload.kind, PayloadKind::Text);
        assert_eq!(payload.text, "{\"a\": ");
        assert!(payload.as_json().is_none());
        assert_eq!(Payload::from_body("").kind, PayloadKind::Text);
    }
}
