use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token_secret: SecretString,
    pub session_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub auth_token_secret: Option<String>,
    pub session_ttl_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("config interpolation references unset variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("config interpolation expression is missing its closing `}}`")]
    UnterminatedInterpolation,
    #[error("environment override `{key}` carries an unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://securegov.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            auth: AuthConfig { token_secret: String::new().into(), session_ttl_secs: 28_800 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unknown log format `{other}`, expected compact, pretty, or json"
            ))),
        }
    }
}

impl AppConfig {
    /// Load order: defaults, then the TOML file (if any), then `SECUREGOV_*`
    /// environment variables, then explicit overrides. Later layers win.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => read_patch(&path)?.apply(&mut config),
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from("securegov.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SECUREGOV_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SECUREGOV_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("SECUREGOV_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SECUREGOV_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("SECUREGOV_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SECUREGOV_AUTH_TOKEN_SECRET") {
            self.auth.token_secret = secret_value(value);
        }
        if let Some(value) = read_env("SECUREGOV_AUTH_SESSION_TTL_SECS") {
            self.auth.session_ttl_secs = parse_env("SECUREGOV_AUTH_SESSION_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("SECUREGOV_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SECUREGOV_SERVER_PORT") {
            self.server.port = parse_env("SECUREGOV_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SECUREGOV_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_env("SECUREGOV_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("SECUREGOV_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("SECUREGOV_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SECUREGOV_LOGGING_LEVEL").or_else(|| read_env("SECUREGOV_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SECUREGOV_LOGGING_FORMAT").or_else(|| read_env("SECUREGOV_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        merge(&mut self.database.url, overrides.database_url);
        merge(&mut self.logging.level, overrides.log_level);
        if let Some(secret) = overrides.auth_token_secret {
            self.auth.token_secret = secret_value(secret);
        }
        merge(&mut self.auth.session_ttl_secs, overrides.session_ttl_secs);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_auth(&self.auth)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("securegov.toml"), PathBuf::from("config/securegov.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${VAR}` in the raw file content with the value of `VAR`.
/// An unset variable is an error, not an empty substitution, so a typo in a
/// secret name cannot silently produce a blank credential.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression = &rest[start + 2..];
        let Some(end) = expression.find('}') else {
            return Err(ConfigError::UnterminatedInterpolation);
        };

        let var = &expression[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &expression[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must point at sqlite: `sqlite://...`, `sqlite::...`, or `:memory:`. Set SECUREGOV_DATABASE_URL to correct it"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be at least 1 (SECUREGOV_DATABASE_MAX_CONNECTIONS)"
                .to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be between 1 and 300 (SECUREGOV_DATABASE_TIMEOUT_SECS)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    let token_secret = auth.token_secret.expose_secret();
    if token_secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "auth.token_secret is required. Set SECUREGOV_AUTH_TOKEN_SECRET or the [auth] section of securegov.toml".to_string()
        ));
    }
    if token_secret.len() < 16 {
        return Err(ConfigError::Validation(
            "auth.token_secret must be at least 16 characters (SECUREGOV_AUTH_TOKEN_SECRET)"
                .to_string(),
        ));
    }

    if auth.session_ttl_secs == 0 || auth.session_ttl_secs > 604_800 {
        return Err(ConfigError::Validation(
            "auth.session_ttl_secs must be between 1 and 604800 (SECUREGOV_AUTH_SESSION_TTL_SECS)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be nonzero (SECUREGOV_SERVER_PORT)".to_string(),
        ));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be nonzero (SECUREGOV_SERVER_HEALTH_CHECK_PORT)"
                .to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be at least 1 (SECUREGOV_SERVER_GRACEFUL_SHUTDOWN_SECS)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "logging.level `{other}` is not a tracing level (SECUREGOV_LOGGING_LEVEL)"
        ))),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    auth: Option<AuthPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    token_secret: Option<String>,
    session_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn apply(self, config: &mut AppConfig) {
        if let Some(database) = self.database {
            merge(&mut config.database.url, database.url);
            merge(&mut config.database.max_connections, database.max_connections);
            merge(&mut config.database.timeout_secs, database.timeout_secs);
        }
        if let Some(auth) = self.auth {
            if let Some(secret) = auth.token_secret {
                config.auth.token_secret = secret_value(secret);
            }
            merge(&mut config.auth.session_ttl_secs, auth.session_ttl_secs);
        }
        if let Some(server) = self.server {
            merge(&mut config.server.bind_address, server.bind_address);
            merge(&mut config.server.port, server.port);
            merge(&mut config.server.health_check_port, server.health_check_port);
            merge(&mut config.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(logging) = self.logging {
            merge(&mut config.logging.level, logging.level);
            merge(&mut config.logging.format, logging.format);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    const MANAGED_KEYS: &[&str] = &[
        "SECUREGOV_DATABASE_URL",
        "SECUREGOV_DATABASE_MAX_CONNECTIONS",
        "SECUREGOV_DATABASE_TIMEOUT_SECS",
        "SECUREGOV_AUTH_TOKEN_SECRET",
        "SECUREGOV_AUTH_SESSION_TTL_SECS",
        "SECUREGOV_SERVER_BIND_ADDRESS",
        "SECUREGOV_SERVER_PORT",
        "SECUREGOV_SERVER_HEALTH_CHECK_PORT",
        "SECUREGOV_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SECUREGOV_LOGGING_LEVEL",
        "SECUREGOV_LOGGING_FORMAT",
        "SECUREGOV_LOG_LEVEL",
        "SECUREGOV_LOG_FORMAT",
        "TEST_AUTH_TOKEN_SECRET",
    ];

    /// Clears every managed key, applies `vars`, and restores the prior
    /// values on drop. The lock serializes tests that touch process env.
    struct EnvGuard {
        previous: Vec<(&'static str, Option<String>)>,
        _lock: MutexGuard<'static, ()>,
    }

    fn scoped_env(vars: &[(&str, &str)]) -> EnvGuard {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous: Vec<(&'static str, Option<String>)> =
            MANAGED_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();

        for key in MANAGED_KEYS {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }

        EnvGuard { previous, _lock: lock }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.previous.drain(..) {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("securegov.toml");
        fs::write(&path, contents).expect("write config file");
        (dir, path)
    }

    fn load_with_path(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn config_file_values_can_reference_env_vars() {
        let _env = scoped_env(&[("TEST_AUTH_TOKEN_SECRET", "portal-secret-from-env")]);
        let (_dir, path) = write_config("[auth]\ntoken_secret = \"${TEST_AUTH_TOKEN_SECRET}\"\n");

        let config = load_with_path(path).expect("load config");

        assert_eq!(config.auth.token_secret.expose_secret(), "portal-secret-from-env");
    }

    #[test]
    fn unterminated_interpolation_is_rejected() {
        let _env = scoped_env(&[]);
        let (_dir, path) = write_config("[auth]\ntoken_secret = \"${SECRET_WITHOUT_CLOSE\"\n");

        let error = load_with_path(path).expect_err("unclosed expression");

        assert!(matches!(error, ConfigError::UnterminatedInterpolation));
    }

    #[test]
    fn a_required_config_file_must_exist() {
        let _env = scoped_env(&[]);
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("absent.toml");

        let error = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("absent file");

        assert!(
            matches!(error, ConfigError::MissingConfigFile(ref reported) if reported == &path),
            "missing-file error should carry the requested path"
        );
    }

    #[test]
    fn legacy_log_env_spellings_are_honored() {
        let _env = scoped_env(&[
            ("SECUREGOV_AUTH_TOKEN_SECRET", "portal-secret-0123456789"),
            ("SECUREGOV_LOG_LEVEL", "warn"),
            ("SECUREGOV_LOG_FORMAT", "pretty"),
        ]);

        let config = AppConfig::load(LoadOptions::default()).expect("load config");

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn later_config_layers_override_earlier_ones() {
        let _env = scoped_env(&[
            ("SECUREGOV_DATABASE_URL", "sqlite://from-env.db"),
            ("SECUREGOV_AUTH_TOKEN_SECRET", "portal-secret-from-env"),
        ]);
        let (_dir, path) = write_config(
            "[database]\nurl = \"sqlite://from-file.db\"\n\n\
             [auth]\ntoken_secret = \"portal-secret-from-file\"\n\n\
             [logging]\nlevel = \"warn\"\n",
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_url: Some("sqlite://from-override.db".to_string()),
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load config");

        // overrides > env > file > defaults
        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.auth.token_secret.expose_secret(), "portal-secret-from-env");
    }

    #[test]
    fn validation_error_names_the_key_and_env_var() {
        let _env = scoped_env(&[("SECUREGOV_AUTH_TOKEN_SECRET", "short")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("short secret");

        let ConfigError::Validation(message) = error else {
            panic!("expected a validation error, got {error}");
        };
        assert!(message.contains("auth.token_secret"));
        assert!(message.contains("SECUREGOV_AUTH_TOKEN_SECRET"));
    }

    #[test]
    fn non_numeric_env_override_is_rejected() {
        let _env = scoped_env(&[
            ("SECUREGOV_AUTH_TOKEN_SECRET", "portal-secret-0123456789"),
            ("SECUREGOV_SERVER_PORT", "not-a-port"),
        ]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("bad port");

        assert!(matches!(
            error,
            ConfigError::InvalidEnvOverride { ref key, ref value }
                if key == "SECUREGOV_SERVER_PORT" && value == "not-a-port"
        ));
    }

    #[test]
    fn debug_output_redacts_the_token_secret() {
        let _env = scoped_env(&[("SECUREGOV_AUTH_TOKEN_SECRET", "portal-secret-value")]);

        let config = AppConfig::load(LoadOptions::default()).expect("load config");
        let debug = format!("{config:?}");

        assert!(!debug.contains("portal-secret-value"));
        assert_eq!(config.logging.format, LogFormat::Compact);
    }
}
