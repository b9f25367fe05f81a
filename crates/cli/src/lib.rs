pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fieldquote_core::config::{AppConfig, LoadOptions, LoggingConfig};

use crate::commands::triage::TriageOptions;

#[derive(Debug, Parser)]
#[command(
    name = "fieldquote",
    about = "Fieldquote operator CLI",
    long_about = "Inspect configuration and replay quote requests through triage, signal \
                  fusion, and the quality gate.",
    after_help = "Examples:\n  fieldquote triage --photos 4 --description \"full house move, piano, storage unit\"\n  fieldquote evaluate --input scenario.json --offline\n  fieldquote config\n  fieldquote smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Classify a quote request and print the resulting photo strategy")]
    Triage {
        #[arg(long, default_value_t = 0, help = "Number of photos attached to the request")]
        photos: u32,
        #[arg(long, default_value = "", help = "Customer's project description")]
        description: String,
        #[arg(long, default_value = "preview@example.com", help = "Customer email")]
        customer_email: String,
        #[arg(long, default_value = "tenant-preview", help = "Tenant the request belongs to")]
        tenant_id: String,
        #[arg(long, default_value_t = 1, help = "How many services the tenant offers")]
        services: u32,
        #[arg(long, help = "The tenant offers other services worth cross-checking")]
        other_services: bool,
        #[arg(long, default_value_t = 0, help = "Distinct work steps detected in the description")]
        work_steps: u32,
        #[arg(long, default_value_t = 0, help = "Known previous quotes from this customer")]
        previous_quotes: u32,
    },
    #[command(about = "Replay a recorded scenario through signal fusion and the quality gate")]
    Evaluate {
        #[arg(long, help = "Path to a JSON scenario file")]
        input: PathBuf,
        #[arg(long, help = "Phrase questions from templates instead of calling the model")]
        offline: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Triage {
            photos,
            description,
            customer_email,
            tenant_id,
            services,
            other_services,
            work_steps,
            previous_quotes,
        } => commands::triage::run(&TriageOptions {
            photos,
            description,
            customer_email,
            tenant_id,
            services,
            other_services,
            work_steps,
            previous_quotes,
        }),
        Command::Evaluate { input, offline } => commands::evaluate::run(&input, offline),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Smoke => commands::smoke::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

// The global subscriber lives here, not in the library crates. A broken
// config must not mute diagnostics, so logging falls back to defaults and
// the command itself reports the config error.
fn init_logging() {
    use fieldquote_core::config::LogFormat::*;
    use tracing::Level;

    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig::default());

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
