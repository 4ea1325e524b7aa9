#![allow(dead_code)]

use cdisc_library_mcp::app::App;
use cdisc_library_mcp::services::executor::{HttpTransport, ReqwestTransport};
use cdisc_library_mcp::services::logger::{LogLevel, Logger};
use cdisc_library_mcp::services::settings::Settings;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const API_KEY: &str = "test-key";

/// Widget service document; `base_url` becomes `servers[0].url`.
pub fn widget_document(base_url: &str) -> String {
    format!(
        r#"openapi: 3.0.0
info:
  title: Widgets
  version: "1"
servers:
  - url: {base_url}
components:
  securitySchemes:
    apiKeyHeader:
      type: apiKey
      in: header
      name: api-key
    apiKeyQuery:
      type: apiKey
      in: query
      name: api-key
security:
  - apiKeyHeader: []
  - apiKeyQuery: []
paths:
  /widgets/{{id}}:
    parameters:
      - name: id
        in: path
        required: true
    get:
      operationId: get_widget
      summary: Fetch one widget
      tags: [widgets]
  /widgets:
    get:
      operationId: list_widgets
    post:
      operationId: create_widget
  /flaky:
    get:
      operationId: get_flaky
"#
    )
}

pub fn write_documents(files: &[(&str, String)]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for (name, text) in files {
        std::fs::write(dir.path().join(name), text).expect("write document");
    }
    dir
}

/// Settings with short retry timings, pointed at `dir`.
pub fn settings_for(dir: &Path, files: &[&str]) -> Settings {
    Settings {
        openapi_dir: dir.to_path_buf(),
        document_files: files.iter().map(|f| f.to_string()).collect(),
        api_key: Some(API_KEY.to_string()),
        retry_count: 2,
        retry_backoff_ms: 5,
        request_timeout_ms: 2_000,
        call_deadline_ms: 10_000,
        ..Settings::default()
    }
}

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

pub fn build_app(settings: Settings) -> App {
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new().expect("client"));
    App::build(settings, quiet_logger(), transport).expect("app")
}

/// App serving the widget document against `base_url`. The returned
/// directory must outlive the test.
pub fn widget_app(base_url: &str, tweak: impl FnOnce(&mut Settings)) -> (TempDir, App) {
    let dir = write_documents(&[("widgets.yaml", widget_document(base_url))]);
    let mut settings = settings_for(dir.path(), &["widgets.yaml"]);
    tweak(&mut settings);
    let app = build_app(settings);
    (dir, app)
}
