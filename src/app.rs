use crate::errors::ToolError;
use crate::managers::operations::{CallOperationHandler, ListOperationsHandler, OperationsManager};
use crate::managers::shortcuts::shortcut_handlers;
use crate::mcp::catalog::{invalid_schemas, tool_catalog};
use crate::services::auth::AuthResolver;
use crate::services::cache::ResponseCache;
use crate::services::dispatcher::Dispatcher;
use crate::services::documents::load_documents;
use crate::services::executor::{HttpTransport, ReqwestTransport, RetryPolicy, RetryingExecutor};
use crate::services::logger::{LogLevel, Logger};
use crate::services::operation_index::OperationIndex;
use crate::services::settings::Settings;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    pub logger: Logger,
    pub settings: Settings,
    pub dispatcher: Arc<Dispatcher>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    /// Every catalog tool needs a handler and every handler a catalog entry.
    fn validate_tool_wiring(handlers: &HashMap<String, Arc<dyn ToolHandler>>) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        let mut uncataloged: Vec<String> = handlers
            .keys()
            .filter(|name| !tool_catalog().iter().any(|tool| &tool.name == *name))
            .cloned()
            .collect();
        let invalid = invalid_schemas();
        if missing.is_empty() && uncataloged.is_empty() && invalid.is_empty() {
            return Ok(());
        }
        missing.sort();
        uncataloged.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint(
                "Every tool in tool_catalog.json must have a handler and a compilable input schema."
                    .to_string(),
            )
            .with_details(serde_json::json!({
                "missing_tools": missing,
                "uncataloged_handlers": uncataloged,
                "invalid_schemas": invalid,
            })))
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let settings = Settings::from_env();
        let mut logger = Logger::new(crate::constants::server::NAME);
        if settings.debug {
            logger.set_level(LogLevel::Debug);
        }
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Self::build(settings, logger, transport)
    }

    /// Wires the whole server from explicit parts; tests swap the transport.
    pub fn build(
        settings: Settings,
        logger: Logger,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ToolError> {
        let documents = load_documents(&settings, &logger);
        let index = Arc::new(OperationIndex::build(&documents));
        if index.is_empty() {
            logger.warn(
                "No operations loaded",
                Some(&serde_json::json!({
                    "dir": settings.openapi_dir.display().to_string(),
                    "files": settings.document_files,
                })),
            );
        }

        let auth = AuthResolver::from_settings(&settings);
        if !auth.has_secret() {
            logger.warn("CDISC_API_KEY is not set; calls will be unauthenticated", None);
        }

        let cache = settings.cache_enabled.then(|| {
            Arc::new(ResponseCache::new(
                logger.clone(),
                Duration::from_millis(settings.cache_ttl_ms),
                settings.cache_max_entries,
            ))
        });

        let dispatcher = Arc::new(Dispatcher::new(
            index.clone(),
            auth,
            cache,
            RetryingExecutor::new(transport, logger.clone()),
            RetryPolicy::from_settings(&settings),
            logger.clone(),
        ));

        let operations = Arc::new(OperationsManager::new(logger.clone(), dispatcher.clone()));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(
            "list_operations".to_string(),
            Arc::new(ListOperationsHandler(operations.clone())),
        );
        handlers.insert(
            "call_operation".to_string(),
            Arc::new(CallOperationHandler(operations.clone())),
        );
        handlers.extend(shortcut_handlers(&operations));

        Self::validate_tool_wiring(&handlers)?;

        logger.info(
            "Server initialized",
            Some(&serde_json::json!({
                "documents": documents.len(),
                "operations": index.len(),
                "cache": settings.cache_enabled,
                "auth_override": settings.auth_location.map(|l| l.as_str()),
            })),
        );

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));

        Ok(Self {
            logger,
            settings,
            dispatcher,
            tool_executor,
        })
    }
}
