use crate::errors::ToolError;
use crate::mcp::envelope::{build_json_envelope, build_outcome_envelope};
use crate::services::dispatcher::{CallRequest, Dispatcher};
use crate::services::logger::Logger;
use serde_json::Value;
use std::sync::Arc;

/// Backs the two generic tools: `list_operations` and `call_operation`.
#[derive(Clone)]
pub struct OperationsManager {
    logger: Logger,
    dispatcher: Arc<Dispatcher>,
}

impl OperationsManager {
    pub fn new(logger: Logger, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            logger: logger.child("operations"),
            dispatcher,
        }
    }

    pub fn list(&self, args: &Value) -> Result<Value, ToolError> {
        let filter = args.get("filter").and_then(|v| v.as_str());
        let operations = self.dispatcher.index().list(filter);
        let value = serde_json::to_value(&operations).map_err(|err| {
            ToolError::internal(format!("Failed to serialize operations: {}", err))
        })?;
        Ok(build_json_envelope(&value))
    }

    pub async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let request: CallRequest = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("call_operation: {}", err)))?;
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: CallRequest) -> Result<Value, ToolError> {
        let outcome = self.dispatcher.call(&request).await?;
        Ok(build_outcome_envelope(&outcome))
    }
}

pub struct ListOperationsHandler(pub Arc<OperationsManager>);

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for ListOperationsHandler {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.0.list(&args)
    }
}

pub struct CallOperationHandler(pub Arc<OperationsManager>);

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for CallOperationHandler {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.0
            .logger
            .debug("call_operation", args.get("operationId"));
        self.0.call(args).await
    }
}
