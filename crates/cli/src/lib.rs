pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tablebook_core::config::{ConfigOverrides, LoadOptions};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "tablebook",
    about = "Table booking assistant operator CLI",
    long_about = "Maintain the booking assistant's data: legacy migration, holiday cache, session purge, reset, config inspection and readiness checks.",
    after_help = "Examples:\n  tablebook migrate\n  tablebook holidays --year 2025 --country IN\n  tablebook purge-sessions --max-age-hours 48\n  tablebook doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file path (default: tablebook.toml or config/tablebook.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override storage.data_dir")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Override logging.level for this run")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Upgrade a legacy bookings file (weekday-only rows) to the dated schema")]
    Migrate {
        #[arg(long, help = "Bookings file to migrate (default: storage.bookings_file)")]
        file: Option<PathBuf>,
    },
    #[command(about = "Refresh the holiday cache from the holiday lookup service")]
    Holidays {
        #[arg(long = "year", help = "Year to refresh; repeatable (default: current and next year)")]
        years: Vec<i32>,
        #[arg(long, help = "ISO country code (default: calendar.country_code)")]
        country: Option<String>,
    },
    #[command(about = "Delete sessions idle longer than the given age, plus unreadable session files")]
    PurgeSessions {
        #[arg(long, help = "Idle age in hours (default: sessions.max_age_hours)")]
        max_age_hours: Option<u64>,
    },
    #[command(about = "Clear every booking")]
    Reset,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, storage, LLM and holiday lookup readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                data_dir: self.data_dir.clone(),
                log_level: self.log_level.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

/// Diagnostics go to stderr so stdout stays one JSON document.
fn init_logging(level: Option<&str>) {
    let level = level.and_then(|raw| raw.parse::<Level>().ok()).unwrap_or(Level::WARN);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    let options = cli.load_options();

    let result = match cli.command {
        Command::Migrate { file } => commands::migrate::run(&options, file),
        Command::Holidays { years, country } => commands::holidays::run(&options, &years, country),
        Command::PurgeSessions { max_age_hours } => commands::purge_sessions::run(&options, max_age_hours),
        Command::Reset => commands::reset::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
