use crate::commands::{build_runtime, load_config, CommandResult};
use securegov_db::{connect_from_config, migrations, DemoDataset, RequestSeedInfo};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedOutput, (&'static str, String, u8)> =
            if verification.all_present {
                Ok(SeedOutput {
                    requests: seed_result.requests_seeded,
                    accounts: seed_result.accounts_seeded,
                })
            } else {
                Err(("seed_verification", verification_message(&verification.checks), 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(output) => CommandResult::success("seed", output.summary()),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

struct SeedOutput {
    requests: Vec<RequestSeedInfo>,
    accounts: usize,
}

impl SeedOutput {
    fn summary(&self) -> String {
        let request_lines: Vec<String> = self
            .requests
            .iter()
            .map(|request| {
                format!("  - {}: {} ({})", request.request_id, request.status, request.description)
            })
            .collect();
        format!(
            "demo dataset loaded: {} approval requests and {} accounts:\n{}",
            self.requests.len(),
            self.accounts,
            request_lines.join("\n")
        )
    }
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();

    if failed.is_empty() {
        "some demo rows failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{verification_message, SeedOutput};
    use securegov_db::RequestSeedInfo;

    #[test]
    fn verification_message_names_the_failed_checks() {
        let checks =
            [("AP-7829", true), ("rejection-reason", false), ("budget-transactions", false)];

        assert_eq!(
            verification_message(&checks),
            "seed verification failed for checks: rejection-reason, budget-transactions"
        );
    }

    #[test]
    fn verification_message_falls_back_when_no_check_is_flagged() {
        let checks = [("AP-7829", true), ("fraud-alerts", true)];

        assert_eq!(verification_message(&checks), "some demo rows failed to load");
    }

    #[test]
    fn summary_lists_each_request_on_its_own_line() {
        let output = SeedOutput {
            requests: vec![RequestSeedInfo {
                request_id: "AP-7829",
                status: "pending",
                description: "Procurement of medical supplies, auditor signed",
            }],
            accounts: 4,
        };

        let summary = output.summary();
        assert!(summary.starts_with("demo dataset loaded: 1 approval requests and 4 accounts:"));
        assert!(summary
            .contains("  - AP-7829: pending (Procurement of medical supplies, auditor signed)"));
    }
}
