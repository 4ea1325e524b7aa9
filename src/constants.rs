pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const TIMEOUT_CALL_DEADLINE_MS: u64 = 120_000;
    pub const TIMEOUT_CONNECTION_MS: u64 = 5_000;
    pub const DEFAULT_BASE_URL: &str = "https://api.library.cdisc.org";
    pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
}

pub mod auth {
    pub const DEFAULT_PARAM_NAME: &str = "api-key";
    pub const HEADER_SCHEME_KEY: &str = "apiKeyHeader";
    pub const QUERY_SCHEME_KEY: &str = "apiKeyQuery";
}

pub mod retry {
    pub const DEFAULT_RETRIES: usize = 2;
    pub const BASE_DELAY_MS: u64 = 300;
}

pub mod cache {
    pub const DEFAULT_TTL_MS: u64 = 60_000;
    pub const DEFAULT_MAX_ENTRIES: usize = 500;
}

pub mod documents {
    pub const DEFAULT_DIR: &str = "openapi";
    pub const DEFAULT_FILES: &[&str] = &[
        "cdisc-cosmos-bc-proxy-v2.yaml",
        "cdisc-cosmos-base-specializations-proxy-v2.yaml",
        "cdisc-library-api.yaml",
    ];
    pub const HTTP_METHODS: &[&str] = &[
        "get", "put", "post", "delete", "options", "head", "patch", "trace",
    ];
}

pub mod server {
    pub const NAME: &str = "cdisc-library-mcp";
    pub const VERSION: &str = "0.1.0";
    pub const PROTOCOL_VERSION: &str = "2024-11-05";
}
