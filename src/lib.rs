pub mod app;
pub mod constants;
pub mod errors;

pub mod managers {
    pub mod operations;
    pub mod shortcuts;
}

pub mod mcp {
    pub mod catalog;
    pub mod envelope;
    pub mod protocol;
    pub mod server;
}

pub mod services {
    pub mod auth;
    pub mod cache;
    pub mod dispatcher;
    pub mod documents;
    pub mod executor;
    pub mod logger;
    pub mod operation_index;
    pub mod payload;
    pub mod request_builder;
    pub mod settings;
    pub mod tool_executor;
}

pub mod utils {
    pub mod feature_flags;
    pub mod suggest;
}
