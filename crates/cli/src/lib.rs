pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "securegov",
    version,
    about = "SecureGov operator CLI",
    long_about = "Operate SecureGov portal readiness, migrations, demo seeding, config inspection, and smoke validation.",
    after_help = "Examples:\n  securegov doctor --json\n  securegov config\n  securegov smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify every row landed")]
    Seed,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, auth secret readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Command {
    fn execute(self) -> CommandResult {
        match self {
            Command::Start => commands::start::run(),
            Command::Migrate => commands::migrate::run(),
            Command::Seed => commands::seed::run(),
            Command::Smoke => commands::smoke::run(),
            Command::Config => CommandResult { exit_code: 0, output: commands::config::run() },
            Command::Doctor { json } => {
                CommandResult { exit_code: 0, output: commands::doctor::run(json) }
            }
        }
    }
}

pub fn run() -> ExitCode {
    let result = Cli::parse().command.execute();
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
