use crate::errors::ToolError;
use crate::managers::operations::OperationsManager;
use crate::services::dispatcher::CallRequest;
use crate::services::tool_executor::ToolHandler;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// How one tool argument lands in the dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bind {
    /// `arg` becomes path parameter `param`.
    Path { arg: &'static str, param: &'static str },
    /// `arg` becomes query parameter `param`.
    Query { arg: &'static str, param: &'static str },
    /// Every entry of the object `arg` becomes its own query parameter.
    FlattenQuery { arg: &'static str },
}

/// A named tool that routes to a fixed operationId.
#[derive(Debug, Clone, Copy)]
pub struct Shortcut {
    pub name: &'static str,
    pub operation_id: &'static str,
    pub binds: &'static [Bind],
}

const fn path(arg: &'static str, param: &'static str) -> Bind {
    Bind::Path { arg, param }
}

const fn query(arg: &'static str) -> Bind {
    Bind::Query { arg, param: arg }
}

pub const SHORTCUTS: &[Shortcut] = &[
    Shortcut {
        name: "search.suggest",
        operation_id: "api-search-suggest",
        binds: &[query("q"), query("top"), query("select")],
    },
    Shortcut {
        name: "search.query",
        operation_id: "api-search-search",
        binds: &[
            query("q"),
            query("start"),
            query("pageSize"),
            query("facets"),
            Bind::FlattenQuery { arg: "filters" },
        ],
    },
    Shortcut {
        name: "bc.list",
        operation_id: "get_latest_biomedical_concepts_mdr_bc_biomedicalconcepts_get",
        binds: &[query("category")],
    },
    Shortcut {
        name: "bc.get",
        operation_id: "get_latest_biomedicalconcept_mdr_bc_biomedicalconcepts__biomedicalconcept__g",
        binds: &[path("conceptId", "biomedicalconcept")],
    },
    Shortcut {
        name: "bc.categories",
        operation_id: "get_latest_biomedicalconcept_categories_mdr_bc_categories_get",
        binds: &[],
    },
    Shortcut {
        name: "bc.packages.list",
        operation_id: "get_biomedicalconcept_packages_mdr_bc_packages_get",
        binds: &[],
    },
    Shortcut {
        name: "bc.packages.listConcepts",
        operation_id: "get_biomedicalconcepts_mdr_bc_packages__package__biomedicalconcepts_get",
        binds: &[path("package", "package")],
    },
    Shortcut {
        name: "bc.packages.getConcept",
        operation_id: "get_package_biomedicalconcept_mdr_bc_packages__package__biomedicalconcepts__",
        binds: &[
            path("package", "package"),
            path("conceptId", "biomedicalconcept"),
        ],
    },
    Shortcut {
        name: "sdtm.list",
        operation_id: "get_latest_sdtm_specializations_mdr_specializations_sdtm_datasetspecializati",
        binds: &[query("domain")],
    },
    Shortcut {
        name: "sdtm.get",
        operation_id: "get_latest_sdtm_specialization_mdr_specializations_sdtm_datasetspecializatio",
        binds: &[path("datasetSpecializationId", "dataset_specialization_id")],
    },
    Shortcut {
        name: "sdtm.domains",
        operation_id: "get_sdtm_dataset_specialization_domain_list_mdr_specializations_sdtm_domains",
        binds: &[],
    },
    Shortcut {
        name: "sdtm.byBiomedicalConcept",
        operation_id: "get_latest_bc_datasetspecializations_mdr_specializations_datasetspecializati",
        binds: &[Bind::Query {
            arg: "conceptId",
            param: "biomedicalconcept",
        }],
    },
    Shortcut {
        name: "sdtm.packages.list",
        operation_id: "get_sdtm_specialization_packages_mdr_specializations_sdtm_packages_get",
        binds: &[],
    },
    Shortcut {
        name: "sdtm.packages.listSpecializations",
        operation_id: "get_sdtm_specializations_mdr_specializations_sdtm_packages__package__dataset",
        binds: &[path("package", "package")],
    },
    Shortcut {
        name: "sdtm.packages.getSpecialization",
        operation_id: "get_sdtm_specialization_mdr_specializations_sdtm_packages__package__datasets",
        binds: &[
            path("package", "package"),
            path("datasetSpecialization", "datasetspecialization"),
        ],
    },
];

impl Shortcut {
    /// Maps tool arguments onto a call. Absent or null arguments are skipped.
    pub fn to_request(&self, args: &Value) -> CallRequest {
        let empty = Map::new();
        let args = args.as_object().unwrap_or(&empty);
        let mut request = CallRequest::new(self.operation_id);
        for bind in self.binds {
            match *bind {
                Bind::Path { arg, param } => {
                    if let Some(value) = args.get(arg).filter(|v| !v.is_null()) {
                        request.path_params.insert(param.to_string(), value.clone());
                    }
                }
                Bind::Query { arg, param } => {
                    if let Some(value) = args.get(arg).filter(|v| !v.is_null()) {
                        request.query.insert(param.to_string(), value.clone());
                    }
                }
                Bind::FlattenQuery { arg } => {
                    if let Some(entries) = args.get(arg).and_then(Value::as_object) {
                        for (key, value) in entries {
                            request.query.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
        request
    }
}

pub fn find_shortcut(name: &str) -> Option<&'static Shortcut> {
    SHORTCUTS.iter().find(|shortcut| shortcut.name == name)
}

pub struct ShortcutHandler {
    shortcut: &'static Shortcut,
    operations: Arc<OperationsManager>,
}

impl ShortcutHandler {
    pub fn new(shortcut: &'static Shortcut, operations: Arc<OperationsManager>) -> Self {
        Self {
            shortcut,
            operations,
        }
    }
}

#[async_trait::async_trait]
impl ToolHandler for ShortcutHandler {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.operations
            .dispatch(self.shortcut.to_request(&args))
            .await
    }
}

/// One handler per shortcut, keyed by tool name.
pub fn shortcut_handlers(
    operations: &Arc<OperationsManager>,
) -> HashMap<String, Arc<dyn ToolHandler>> {
    SHORTCUTS
        .iter()
        .map(|shortcut| {
            let handler: Arc<dyn ToolHandler> =
                Arc::new(ShortcutHandler::new(shortcut, operations.clone()));
            (shortcut.name.to_string(), handler)
        })
        .collect()
}
