use approvo_db::DemoSeedDataset;

use crate::commands::{open_migrated, prepare, CommandResult, Failure, EXIT_SEED};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated(&config).await?;

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;
        pool.close().await;

        if !verification.all_present {
            let message = verification_message(&verification.failed_checks());
            return Err(("seed_verification", message, EXIT_SEED));
        }
        Ok::<_, Failure>(seeded.tables_seeded)
    });

    match result {
        Ok(tables) => {
            CommandResult::success("seed", format!("demo dataset loaded: {}", tables.join(", ")))
        }
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
