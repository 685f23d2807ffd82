pub mod commands;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "approvo",
    about = "Approvo operator CLI",
    long_about = "Operate the Approvo approval workflow: migrations, demo data, config inspection, readiness checks and approval step previews.",
    after_help = "Examples:\n  approvo doctor --json\n  approvo seed\n  approvo preview --amount 15000 --area 2 --type 2"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (areas, types, roles, users, rules)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, schema version and rule catalog")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show the approval steps a proposal with these attributes would receive")]
    Preview {
        #[arg(long, help = "Estimated amount, e.g. 15000.50")]
        amount: Decimal,
        #[arg(long, help = "Area id")]
        area: i32,
        #[arg(long = "type", help = "Project type id")]
        project_type: i32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Preview { amount, area, project_type } => {
            commands::preview::run(amount, area, project_type)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
