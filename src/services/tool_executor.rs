use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;

use serde_json::Value;

/// A named tool. Handlers return the finished MCP tool result
/// (`{content, isError}`).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("tools"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn has_handler(&self, tool: &str) -> bool {
        self.handlers.contains_key(tool)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool) else {
            let suggestions = suggest(tool, self.handlers.keys().map(String::as_str), 5);
            let hint = if suggestions.is_empty() {
                "Call tools/list to see available tools".to_string()
            } else {
                format!("Did you mean: {}", suggestions.join(", "))
            };
            return Err(
                ToolError::invalid_params(format!("Unknown tool: {}", tool)).with_hint(hint)
            );
        };

        let started = std::time::Instant::now();
        let result = handler.handle(args).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.debug(
                tool,
                Some(&serde_json::json!({"duration_ms": duration_ms})),
            ),
            Err(err) => self.logger.debug(
                tool,
                Some(&serde_json::json!({
                    "duration_ms": duration_ms,
                    "error": err.code,
                })),
            ),
        }
        result
    }
}
