use std::time::Instant;

use crate::commands::CommandResult;
use secrecy::ExposeSecret;
use securegov_core::config::{AppConfig, LoadOptions};
use securegov_db::{connect_from_config, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

impl SmokeCheck {
    fn pass(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self { name, status: SmokeStatus::Pass, elapsed_ms, message: message.into() }
    }

    fn fail(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self { name, status: SmokeStatus::Fail, elapsed_ms, message: message.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: SmokeStatus::Skipped,
            elapsed_ms: 0,
            message: "skipped after an earlier failure".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();
    run_sequence(&mut checks);
    finalize_report(checks, elapsed_ms(started))
}

/// Runs the readiness checks in dependency order. A failed prerequisite
/// marks everything downstream as skipped rather than attempting it.
fn run_sequence(checks: &mut Vec<SmokeCheck>) {
    let config_started = Instant::now();
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(SmokeCheck::pass(
                "config_validation",
                elapsed_ms(config_started),
                "configuration loaded and validated",
            ));
            config
        }
        Err(error) => {
            checks.push(SmokeCheck::fail(
                "config_validation",
                elapsed_ms(config_started),
                error.to_string(),
            ));
            skip_remaining(checks, &["auth_secret_sanity", "db_connectivity", "migration_visibility"]);
            return;
        }
    };

    let secret_started = Instant::now();
    checks.push(if config.auth.token_secret.expose_secret().trim().len() >= 16 {
        SmokeCheck::pass(
            "auth_secret_sanity",
            elapsed_ms(secret_started),
            "auth token secret present with a workable length",
        )
    } else {
        SmokeCheck::fail(
            "auth_secret_sanity",
            elapsed_ms(secret_started),
            "auth.token_secret is missing or shorter than 16 characters",
        )
    });

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck::fail(
                "db_connectivity",
                0,
                format!("failed to initialize async runtime: {error}"),
            ));
            skip_remaining(checks, &["migration_visibility"]);
            return;
        }
    };

    let db_started = Instant::now();
    let pool = match runtime.block_on(connect_from_config(&config.database)) {
        Ok(pool) => {
            checks.push(SmokeCheck::pass(
                "db_connectivity",
                elapsed_ms(db_started),
                format!("connected using `{}`", config.database.url),
            ));
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck::fail(
                "db_connectivity",
                elapsed_ms(db_started),
                format!("failed to connect: {error}"),
            ));
            skip_remaining(checks, &["migration_visibility"]);
            return;
        }
    };

    let migration_started = Instant::now();
    let migration_result = runtime.block_on(migrations::run_pending(&pool));
    let migration_elapsed = elapsed_ms(migration_started);
    runtime.block_on(pool.close());

    checks.push(match migration_result {
        Ok(()) => SmokeCheck::pass(
            "migration_visibility",
            migration_elapsed,
            "migrations are visible and executable",
        ),
        Err(error) => SmokeCheck::fail(
            "migration_visibility",
            migration_elapsed,
            format!("migration execution failed: {error}"),
        ),
    });
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn skip_remaining(checks: &mut Vec<SmokeCheck>, names: &[&'static str]) {
    for name in names {
        checks.push(SmokeCheck::skipped(name));
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        serde_json::json!({
            "command": "smoke",
            "status": "fail",
            "summary": "serialization failed",
            "error": error.to_string(),
        })
        .to_string()
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
