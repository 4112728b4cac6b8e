use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::ExposeSecret;
use securegov_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let sources = SourceResolver::detect();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut entry = |key: &str, value: &str, env_keys: &[&str]| {
        lines.push(format!("- {key} = {value} (source: {})", sources.resolve(key, env_keys)));
    };

    entry("database.url", &config.database.url, &["SECUREGOV_DATABASE_URL"]);
    entry(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["SECUREGOV_DATABASE_MAX_CONNECTIONS"],
    );
    entry(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["SECUREGOV_DATABASE_TIMEOUT_SECS"],
    );
    entry(
        "auth.token_secret",
        redact_secret(config.auth.token_secret.expose_secret()),
        &["SECUREGOV_AUTH_TOKEN_SECRET"],
    );
    entry(
        "auth.session_ttl_secs",
        &config.auth.session_ttl_secs.to_string(),
        &["SECUREGOV_AUTH_SESSION_TTL_SECS"],
    );
    entry("server.bind_address", &config.server.bind_address, &["SECUREGOV_SERVER_BIND_ADDRESS"]);
    entry("server.port", &config.server.port.to_string(), &["SECUREGOV_SERVER_PORT"]);
    entry(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        &["SECUREGOV_SERVER_HEALTH_CHECK_PORT"],
    );
    entry(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        &["SECUREGOV_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );
    entry(
        "logging.level",
        &config.logging.level,
        &["SECUREGOV_LOGGING_LEVEL", "SECUREGOV_LOG_LEVEL"],
    );
    entry(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["SECUREGOV_LOGGING_FORMAT", "SECUREGOV_LOG_FORMAT"],
    );

    lines.join("\n")
}

/// Attributes each effective value to env, config file, or default.
/// Precedence mirrors `AppConfig::load`; `logging.*` accepts two env
/// spellings, checked in the same order the loader checks them.
struct SourceResolver {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl SourceResolver {
    fn detect() -> Self {
        let path = [PathBuf::from("securegov.toml"), PathBuf::from("config/securegov.toml")]
            .into_iter()
            .find(|path| path.exists());
        let doc = path
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| raw.parse::<Value>().ok());
        Self { doc, path }
    }

    fn resolve(&self, key_path: &str, env_keys: &[&str]) -> String {
        for env_key in env_keys {
            if env::var_os(env_key).is_some() {
                return format!("env ({env_key})");
            }
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file})");
            }
        }

        "default".to_string()
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: &str) -> &'static str {
    if secret.trim().is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
