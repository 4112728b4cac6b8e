//! Shared subcommand plumbing.
//!
//! Every subcommand resolves to a [`CommandResult`]: a process exit code plus
//! a single-line JSON outcome for scripts to parse. Exit codes are stable per
//! failure class (2 config, 3 runtime init, 4 connectivity, 5 migration or
//! seed load, 6 seed verification or failed smoke checks); 0 is success.

pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod smoke;
pub mod start;

use securegov_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: &'a str,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let payload =
            CommandOutcome { command, status: "ok", error_class: None, message: &message };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let message = message.into();
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: &message,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        serde_json::json!({
            "command": payload.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}

/// Load and validate the effective config, mapping failure onto the
/// command's `config_validation` outcome.
fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

/// Single-threaded runtime for blocking command bodies.
fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_outcome_omits_the_error_class() {
        let result = CommandResult::success("migrate", "applied pending migrations");

        assert_eq!(result.exit_code, 0);
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("outcome should be valid JSON");
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("error_class").is_none());
    }

    #[test]
    fn failure_outcome_carries_the_class_and_exit_code() {
        let result = CommandResult::failure("seed", "db_connectivity", "no such host", 4);

        assert_eq!(result.exit_code, 4);
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("outcome should be valid JSON");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "db_connectivity");
        assert_eq!(payload["message"], "no such host");
    }
}
