use crate::constants::documents::HTTP_METHODS;
use crate::errors::DispatchError;
use crate::services::auth::SecurityScheme;
use crate::services::documents::InterfaceDocument;
use crate::utils::suggest::suggest;
use indexmap::IndexMap;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub operation_id: String,
    pub method: Method,
    pub path_template: String,
    pub security: SecurityScheme,
    pub base_url: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub document: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: String,
    pub method: String,
    pub path: String,
    pub base_url: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub servers: Value,
}

/// Read-only operationId lookup built once from every loaded document.
#[derive(Debug, Default)]
pub struct OperationIndex {
    operations: IndexMap<String, OperationDescriptor>,
    servers: Vec<Value>,
}

impl OperationIndex {
    pub fn build(documents: &[InterfaceDocument]) -> Self {
        let mut operations = IndexMap::new();
        let mut servers = Vec::with_capacity(documents.len());
        for (doc_idx, doc) in documents.iter().enumerate() {
            servers.push(doc.servers.clone());
            for (route, item) in &doc.paths {
                let Some(methods) = item.as_object() else {
                    continue;
                };
                for (method_key, op) in methods {
                    let method_lower = method_key.to_lowercase();
                    if !HTTP_METHODS.contains(&method_lower.as_str()) || !op.is_object() {
                        continue;
                    }
                    let Ok(method) = Method::from_bytes(method_lower.to_uppercase().as_bytes())
                    else {
                        continue;
                    };
                    let operation_id = op
                        .get("operationId")
                        .and_then(Value::as_str)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}:{}", method_lower, route));
                    if operations.contains_key(&operation_id) {
                        continue;
                    }
                    let descriptor = OperationDescriptor {
                        operation_id: operation_id.clone(),
                        method,
                        path_template: route.clone(),
                        security: doc.scheme_for(op),
                        base_url: doc.base_url.clone(),
                        summary: op.get("summary").and_then(Value::as_str).map(str::to_string),
                        tags: op
                            .get("tags")
                            .and_then(Value::as_array)
                            .map(|tags| {
                                tags.iter()
                                    .filter_map(Value::as_str)
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default(),
                        document: doc_idx,
                    };
                    operations.insert(operation_id, descriptor);
                }
            }
        }
        Self {
            operations,
            servers,
        }
    }

    pub fn resolve(&self, operation_id: &str) -> Result<&OperationDescriptor, DispatchError> {
        self.operations
            .get(operation_id)
            .ok_or_else(|| DispatchError::OperationNotFound {
                operation_id: operation_id.to_string(),
                suggestions: suggest(
                    operation_id,
                    self.operations.keys().map(String::as_str),
                    3,
                ),
            })
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations in load order, optionally narrowed by a case-insensitive
    /// substring of the operationId or path.
    pub fn list(&self, filter: Option<&str>) -> Vec<OperationSummary> {
        let needle = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());
        self.operations
            .values()
            .filter(|op| match &needle {
                Some(needle) => {
                    op.operation_id.to_lowercase().contains(needle.as_str())
                        || op.path_template.to_lowercase().contains(needle.as_str())
                }
                None => true,
            })
            .map(|op| OperationSummary {
                operation_id: op.operation_id.clone(),
                method: op.method.as_str().to_string(),
                path: op.path_template.clone(),
                base_url: op.base_url.clone(),
                summary: op.summary.clone(),
                tags: op.tags.clone(),
                servers: self
                    .servers
                    .get(op.document)
                    .cloned()
                    .unwrap_or(Value::Array(Vec::new())),
            })
            .collect()
    }
}
