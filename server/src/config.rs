use std::env;

use store::store::options::StoreOptions;

/// Process configuration, loaded once at startup and handed to the
/// components that need it. Never read as ambient global state.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreOptions,
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            store: StoreOptions::from_env(),
            cors_origins: parse_cors_origins(
                &env::var("PERSONDB_CORS_ORIGINS").unwrap_or_default(),
            ),
            log_level: env::var("PERSONDB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

/// Comma-separated origin list; an empty value means any origin.
fn parse_cors_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        return vec!["*".to_string()];
    }

    origins
}
