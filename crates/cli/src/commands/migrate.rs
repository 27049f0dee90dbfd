use std::path::PathBuf;

use tablebook_core::clock::{Clock, SystemClock};
use tablebook_core::config::LoadOptions;
use tablebook_db::{migrate_bookings_file, MigrationReport};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(options: &LoadOptions, file: Option<PathBuf>) -> CommandResult {
    let config = match load_config("migrate", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let path = file.unwrap_or_else(|| config.storage.bookings_path());
    match runtime.block_on(migrate_bookings_file(&path, SystemClock.now())) {
        Ok(report) => CommandResult::success("migrate", describe(&report)),
        Err(error) => CommandResult::failure("migrate", "migration", error.to_string(), 5),
    }
}

fn describe(report: &MigrationReport) -> String {
    let path = report.path.display();
    if !report.file_found {
        return format!("no bookings file at {path}; nothing to migrate");
    }
    if !report.changed() {
        return format!("{path} is already current ({} rows)", report.rows);
    }

    let mut message = format!(
        "migrated {} rows in {path}: {} dates filled, {} days filled, {} ids assigned",
        report.rows, report.dates_filled, report.days_filled, report.ids_assigned
    );
    if !report.columns_added.is_empty() {
        message.push_str(&format!("; columns added: {}", report.columns_added.join(", ")));
    }
    if let Some(backup) = &report.backup {
        message.push_str(&format!("; backup at {}", backup.display()));
    }
    if !report.unresolved_rows.is_empty() {
        let rows: Vec<String> = report.unresolved_rows.iter().map(ToString::to_string).collect();
        message.push_str(&format!("; rows without a usable date: {}", rows.join(", ")));
    }
    message
}
