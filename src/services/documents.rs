use crate::constants::auth as auth_constants;
use crate::services::auth::SecurityScheme;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use serde_json::Value;
use std::path::Path;
use url::Url;

/// An `apiKey` security scheme declared under `components.securitySchemes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedScheme {
    pub key: String,
    pub scheme: SecurityScheme,
}

/// One loaded interface document (OpenAPI, YAML or JSON).
#[derive(Debug, Clone)]
pub struct InterfaceDocument {
    pub source: String,
    pub base_url: String,
    pub servers: Value,
    pub schemes: Vec<NamedScheme>,
    /// Top-level `security` requirement; `None` when the document omits it.
    pub default_security: Option<Vec<String>>,
    pub paths: serde_json::Map<String, Value>,
}

impl InterfaceDocument {
    pub fn parse(source: &str, text: &str, fallback_base_url: &str) -> Result<Self, String> {
        let raw: Value = serde_yaml::from_str(text)
            .map_err(|err| format!("{}: not a valid YAML/JSON document: {}", source, err))?;
        Self::from_value(source, raw, fallback_base_url)
    }

    pub fn from_value(source: &str, raw: Value, fallback_base_url: &str) -> Result<Self, String> {
        if !raw.is_object() {
            return Err(format!("{}: document root must be an object", source));
        }
        let servers = raw.get("servers").cloned().unwrap_or(Value::Array(Vec::new()));
        let base_url = resolve_server_url(&servers, fallback_base_url);
        let schemes = collect_security_schemes(&raw);
        let default_security = raw.get("security").and_then(requirement_names);
        let paths = raw
            .get("paths")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            source: source.to_string(),
            base_url,
            servers,
            schemes,
            default_security,
            paths,
        })
    }

    /// Picks the credential placement for an operation. Header wins over
    /// query when both are allowed.
    pub fn scheme_for(&self, operation: &Value) -> SecurityScheme {
        let requirement = operation
            .get("security")
            .and_then(requirement_names)
            .or_else(|| self.default_security.clone());
        let allowed = |named: &&NamedScheme| match &requirement {
            Some(names) => names.iter().any(|name| name == &named.key),
            None => true,
        };
        let applicable: Vec<&NamedScheme> = self.schemes.iter().filter(allowed).collect();
        applicable
            .iter()
            .find(|named| matches!(named.scheme, SecurityScheme::Header { .. }))
            .or_else(|| {
                applicable
                    .iter()
                    .find(|named| matches!(named.scheme, SecurityScheme::Query { .. }))
            })
            .map(|named| named.scheme.clone())
            .unwrap_or(SecurityScheme::None)
    }
}

/// Loads the configured documents in order. Missing files shrink the
/// catalog; they never fail startup.
pub fn load_documents(settings: &Settings, logger: &Logger) -> Vec<InterfaceDocument> {
    let logger = logger.child("documents");
    let mut out = Vec::new();
    for name in &settings.document_files {
        let path = settings.openapi_dir.join(name);
        match load_document(&path, name, &settings.default_base_url) {
            Ok(Some(doc)) => {
                logger.info(
                    "Loaded interface document",
                    Some(&serde_json::json!({
                        "file": name,
                        "base_url": doc.base_url,
                        "paths": doc.paths.len(),
                    })),
                );
                out.push(doc);
            }
            Ok(None) => {
                logger.debug(
                    "Interface document not found, skipping",
                    Some(&serde_json::json!({"path": path.display().to_string()})),
                );
            }
            Err(err) => {
                logger.warn(
                    "Interface document could not be parsed, skipping",
                    Some(&serde_json::json!({"error": err})),
                );
            }
        }
    }
    out
}

fn load_document(
    path: &Path,
    name: &str,
    fallback_base_url: &str,
) -> Result<Option<InterfaceDocument>, String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("{}: {}", name, err)),
    };
    InterfaceDocument::parse(name, &text, fallback_base_url).map(Some)
}

fn resolve_server_url(servers: &Value, fallback: &str) -> String {
    let Some(first) = servers.as_array().and_then(|list| list.first()) else {
        return fallback.to_string();
    };
    let Some(template) = first.get("url").and_then(Value::as_str) else {
        return fallback.to_string();
    };
    let mut url = template.trim().to_string();
    if url.is_empty() {
        return fallback.to_string();
    }
    if let Some(vars) = first.get("variables").and_then(Value::as_object) {
        for (name, var) in vars {
            if let Some(default) = var.get("default").and_then(Value::as_str) {
                url = url.replace(&format!("{{{}}}", name), default);
            }
        }
    }
    if Url::parse(&url).is_ok() {
        return url;
    }
    Url::parse(fallback)
        .and_then(|base| base.join(&url))
        .map(|joined| joined.to_string())
        .unwrap_or_else(|_| fallback.to_string())
}

fn collect_security_schemes(raw: &Value) -> Vec<NamedScheme> {
    let Some(schemes) = raw
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, def) in schemes {
        let is_api_key = def
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.eq_ignore_ascii_case("apikey"))
            .unwrap_or(false);
        let location = def
            .get("in")
            .and_then(Value::as_str)
            .map(|s| s.to_lowercase())
            .or_else(|| match key.as_str() {
                auth_constants::HEADER_SCHEME_KEY => Some("header".to_string()),
                auth_constants::QUERY_SCHEME_KEY => Some("query".to_string()),
                _ => None,
            });
        let conventional = key == auth_constants::HEADER_SCHEME_KEY
            || key == auth_constants::QUERY_SCHEME_KEY;
        if !is_api_key && !conventional {
            continue;
        }
        let name = def
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(auth_constants::DEFAULT_PARAM_NAME)
            .to_string();
        let scheme = match location.as_deref() {
            Some("header") => SecurityScheme::Header { name },
            Some("query") => SecurityScheme::Query { name },
            _ => continue,
        };
        out.push(NamedScheme {
            key: key.clone(),
            scheme,
        });
    }
    out
}

/// `security: [{a: []}, {b: []}]` → `["a", "b"]`.
fn requirement_names(value: &Value) -> Option<Vec<String>> {
    let list = value.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_object)
            .flat_map(|req| req.keys().cloned())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
openapi: 3.0.0
servers:
  - url: https://library.example.test/api
components:
  securitySchemes:
    apiKeyHeader:
      type: apiKey
      in: header
      name: api-key
    apiKeyQuery:
      type: apiKey
      in: query
      name: subscription-key
paths:
  /widgets/{id}:
    get:
      operationId: get_widget
"#;

    #[test]
    fn parses_servers_and_schemes() {
        let doc = InterfaceDocument::parse("doc.yaml", DOC, "https://fallback.test").unwrap();
        assert_eq!(doc.base_url, "https://library.example.test/api");
        assert_eq!(doc.schemes.len(), 2);
        assert_eq!(doc.paths.len(), 1);
        assert!(doc.default_security.is_none());
    }

    #[test]
    fn header_scheme_wins_when_both_declared() {
        let doc = InterfaceDocument::parse("doc.yaml", DOC, "https://fallback.test").unwrap();
        let scheme = doc.scheme_for(&serde_json::json!({}));
        assert_eq!(
            scheme,
            SecurityScheme::Header {
                name: "api-key".to_string()
            }
        );
    }

    #[test]
    fn operation_requirement_restricts_schemes() {
        let doc = InterfaceDocument::parse("doc.yaml", DOC, "https://fallback.test").unwrap();
        let op = serde_json::json!({"security": [{"apiKeyQuery": []}]});
        assert_eq!(
            doc.scheme_for(&op),
            SecurityScheme::Query {
                name: "subscription-key".to_string()
            }
        );
        let anonymous = serde_json::json!({"security": []});
        assert_eq!(doc.scheme_for(&anonymous), SecurityScheme::None);
    }

    #[test]
    fn missing_servers_use_fallback_and_relative_servers_join() {
        let bare = InterfaceDocument::parse("a.json", r#"{"paths": {}}"#, "https://fallback.test")
            .unwrap();
        assert_eq!(bare.base_url, "https://fallback.test");

        let relative = InterfaceDocument::parse(
            "b.yaml",
            "servers:\n  - url: /mdr\npaths: {}\n",
            "https://fallback.test/",
        )
        .unwrap();
        assert_eq!(relative.base_url, "https://fallback.test/mdr");
    }

    #[test]
    fn server_variables_are_substituted() {
        let text = r#"
servers:
  - url: https://{region}.example.test/v1
    variables:
      region:
        default: eu
paths: {}
"#;
        let doc = InterfaceDocument::parse("c.yaml", text, "https://fallback.test").unwrap();
        assert_eq!(doc.base_url, "https://eu.example.test/v1");
    }

    #[test]
    fn conventional_keys_without_in_field() {
        let text = r#"
components:
  securitySchemes:
    apiKeyQuery: {}
paths: {}
"#;
        let doc = InterfaceDocument::parse("d.yaml", text, "https://fallback.test").unwrap();
        assert_eq!(
            doc.schemes,
            vec![NamedScheme {
                key: "apiKeyQuery".to_string(),
                scheme: SecurityScheme::Query {
                    name: "api-key".to_string()
                },
            }]
        );
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(InterfaceDocument::parse("e.yaml", "- 1\n- 2\n", "https://f.test").is_err());
        assert!(InterfaceDocument::parse("f.yaml", "paths: [", "https://f.test").is_err());
    }
}
