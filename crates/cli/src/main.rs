use std::process::ExitCode;

fn main() -> ExitCode {
    securegov_cli::run()
}
