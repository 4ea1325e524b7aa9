use crate::app::App;
use crate::constants::server::{NAME as SERVER_NAME, PROTOCOL_VERSION, VERSION as SERVER_VERSION};
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::catalog::{tool_catalog, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::services::logger::Logger;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

fn map_tool_error(tool: &str, error: &ToolError) -> McpError {
    let mut lines = vec![
        "ToolError".to_string(),
        format!("tool: {}", tool),
        format!("kind: {:?}", error.kind).to_lowercase(),
        format!("code: {}", error.code),
        format!("retryable: {}", error.retryable),
        format!("message: {}", error.message),
    ];
    if let Some(hint) = &error.hint {
        lines.push(format!("hint: {}", hint));
    }
    if let Some(details) = &error.details {
        lines.push(format!("details: {}", details));
    }
    let message = lines.join("\n");

    match error.kind {
        ToolErrorKind::InvalidParams => McpError::new(ErrorCode::InvalidParams, message),
        ToolErrorKind::Timeout => McpError::new(ErrorCode::RequestTimeout, message),
        ToolErrorKind::Retryable => McpError::new(ErrorCode::UpstreamUnreachable, message),
        ToolErrorKind::NotFound => McpError::new(ErrorCode::InvalidRequest, message),
        ToolErrorKind::Internal => McpError::new(ErrorCode::InternalError, message),
    }
}

pub struct McpServer {
    app: Arc<App>,
    logger: Logger,
}

impl McpServer {
    pub fn new(app: Arc<App>) -> Self {
        let logger = app.logger.child("mcp");
        Self { app, logger }
    }

    async fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    async fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": tool_catalog() })
    }

    async fn handle_tools_call(&self, name: &str, raw_args: Value) -> Result<Value, McpError> {
        let args = if raw_args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            raw_args
        };
        validate_tool_args(name, &args)?;
        self.app
            .tool_executor
            .execute(name, args)
            .await
            .map_err(|err| map_tool_error(name, &err))
    }

    /// Routes one parsed request. `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        match request.method.as_str() {
            "notifications/initialized" => request
                .id
                .map(|id| JsonRpcResponse::success(id, serde_json::json!({}))),
            _ if request.method.starts_with("notifications/") && request.is_notification() => None,
            "initialize" => {
                let id = request.id?;
                Some(JsonRpcResponse::success(id, self.handle_initialize().await))
            }
            "tools/list" => {
                let id = request.id?;
                Some(JsonRpcResponse::success(id, self.handle_tools_list().await))
            }
            "tools/call" => {
                let id = request.id?;
                let params = request.params.as_object().cloned().unwrap_or_default();
                let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() {
                    return Some(JsonRpcResponse::failure(
                        id,
                        ErrorCode::InvalidParams.as_i32(),
                        "Missing tool name".to_string(),
                    ));
                }
                self.logger.debug("tools/call", Some(&serde_json::json!({"name": name})));
                let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                Some(match self.handle_tools_call(name, args).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::failure(id, err.code.as_i32(), err.message),
                })
            }
            _ => request.id.map(|id| {
                JsonRpcResponse::failure(
                    id,
                    ErrorCode::MethodNotFound.as_i32(),
                    "Method not found".to_string(),
                )
            }),
        }
    }

    /// Parses and handles one line of the stream.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parsed: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::ParseError.as_i32(),
                    "Parse error".to_string(),
                ))
            }
        };
        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(req) => req,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::InvalidRequest.as_i32(),
                    "Invalid request".to_string(),
                ))
            }
        };
        self.handle_request(request).await
    }

    /// Reads newline-delimited JSON-RPC from `input` and writes responses to
    /// `output`. Every request runs in its own task so a slow upstream call
    /// never blocks the next line; responses may therefore arrive out of order.
    pub async fn serve<R, W>(self: Arc<Self>, input: R, output: W) -> Result<(), ToolError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(output);
            while let Some(response) = rx.recv().await {
                let payload = serde_json::to_string(&response).unwrap_or_default();
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let mut reader = BufReader::new(input).lines();
        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_line(&line).await {
                    let _ = tx.send(response);
                }
            });
        }
        drop(tx);

        writer_task
            .await
            .map_err(|err| ToolError::internal(format!("writer task failed: {}", err)))??;
        Ok(())
    }

    pub async fn run_stdio(self: Arc<Self>) -> Result<(), ToolError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let app = App::initialize()?;
    let server = Arc::new(McpServer::new(Arc::new(app)));
    server.logger.info("Starting stdio transport", None);
    server.run_stdio().await
}
