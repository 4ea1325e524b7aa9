use crate::constants::{
    auth as auth_constants, cache as cache_constants, documents as document_constants,
    network as network_constants, retry as retry_constants,
};
use crate::services::auth::AuthLocation;
use crate::utils::feature_flags::{is_falsy, is_truthy, non_empty};
use std::path::PathBuf;

/// Process-wide configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openapi_dir: PathBuf,
    pub document_files: Vec<String>,
    pub default_base_url: String,
    pub api_key: Option<String>,
    pub auth_location: Option<AuthLocation>,
    pub auth_header: Option<String>,
    pub auth_query: Option<String>,
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,
    pub retry_count: usize,
    pub retry_backoff_ms: u64,
    pub request_timeout_ms: u64,
    pub call_deadline_ms: u64,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openapi_dir: PathBuf::from(document_constants::DEFAULT_DIR),
            document_files: document_constants::DEFAULT_FILES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            default_base_url: network_constants::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            auth_location: None,
            auth_header: None,
            auth_query: None,
            cache_enabled: true,
            cache_ttl_ms: cache_constants::DEFAULT_TTL_MS,
            cache_max_entries: cache_constants::DEFAULT_MAX_ENTRIES,
            retry_count: retry_constants::DEFAULT_RETRIES,
            retry_backoff_ms: retry_constants::BASE_DELAY_MS,
            request_timeout_ms: network_constants::TIMEOUT_API_REQUEST_MS,
            call_deadline_ms: network_constants::TIMEOUT_CALL_DEADLINE_MS,
            debug: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        let defaults = Self::default();

        let document_files = get("CDISC_OPENAPI_FILES")
            .map(|raw| {
                raw.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|files| !files.is_empty())
            .unwrap_or(defaults.document_files);

        let auth_location = get("CDISC_AUTH_LOCATION").and_then(|raw| AuthLocation::parse(&raw));

        Self {
            openapi_dir: get("CDISC_OPENAPI_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.openapi_dir),
            document_files,
            default_base_url: get("CDISC_API_BASE_URL").unwrap_or(defaults.default_base_url),
            api_key: get("CDISC_API_KEY"),
            auth_location,
            auth_header: get("CDISC_AUTH_HEADER"),
            auth_query: get("CDISC_AUTH_QUERY"),
            cache_enabled: get("CDISC_CACHE_ENABLED")
                .map(|raw| !is_falsy(raw))
                .unwrap_or(true),
            cache_ttl_ms: read_number(get("CDISC_CACHE_TTL_MS"), defaults.cache_ttl_ms),
            cache_max_entries: read_number(
                get("CDISC_CACHE_MAX_ENTRIES"),
                defaults.cache_max_entries as u64,
            )
            .max(1) as usize,
            retry_count: read_number(get("CDISC_RETRY_COUNT"), defaults.retry_count as u64)
                as usize,
            retry_backoff_ms: read_number(get("CDISC_RETRY_BACKOFF_MS"), defaults.retry_backoff_ms),
            request_timeout_ms: read_number(
                get("CDISC_REQUEST_TIMEOUT_MS"),
                defaults.request_timeout_ms,
            )
            .max(1),
            call_deadline_ms: read_number(get("CDISC_CALL_DEADLINE_MS"), defaults.call_deadline_ms)
                .max(1),
            debug: get("CDISC_CACHE_DEBUG").map(is_truthy).unwrap_or(false),
        }
    }

    /// Header name used when the operator forces header placement.
    pub fn override_header_name(&self) -> &str {
        self.auth_header
            .as_deref()
            .unwrap_or(auth_constants::DEFAULT_PARAM_NAME)
    }

    /// Query parameter name used when the operator forces query placement.
    pub fn override_query_name(&self) -> &str {
        self.auth_query
            .as_deref()
            .unwrap_or(auth_constants::DEFAULT_PARAM_NAME)
    }
}

/// Negative or fractional values clamp toward zero; garbage falls back to the default.
fn read_number(raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    if let Ok(parsed) = raw.parse::<u64>() {
        return parsed;
    }
    match raw.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed.max(0.0).floor() as u64,
        _ => default,
    }
}
