use std::sync::Arc;

use tablebook_core::clock::SystemClock;
use tablebook_core::config::LoadOptions;
use tablebook_db::{JsonSessionRepository, SessionStore};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(options: &LoadOptions, max_age_hours: Option<u64>) -> CommandResult {
    let config = match load_config("purge-sessions", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let hours = max_age_hours.unwrap_or(config.sessions.max_age_hours);
    if hours == 0 {
        return CommandResult::failure(
            "purge-sessions",
            "invalid_argument",
            "--max-age-hours must be greater than 0",
            2,
        );
    }
    let Ok(hours_i64) = i64::try_from(hours) else {
        return CommandResult::failure("purge-sessions", "invalid_argument", "--max-age-hours is too large", 2);
    };

    let runtime = match runtime("purge-sessions") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let store = SessionStore::new(
        Arc::new(JsonSessionRepository::new(config.storage.sessions_path())),
        Arc::new(SystemClock),
    );
    match runtime.block_on(store.purge_older_than(chrono::Duration::hours(hours_i64))) {
        Ok(report) => CommandResult::success(
            "purge-sessions",
            format!(
                "examined {} sessions; removed {} idle longer than {hours} hours and {} unreadable",
                report.examined, report.expired, report.corrupt
            ),
        ),
        Err(error) => CommandResult::failure("purge-sessions", "session_storage", error.to_string(), 5),
    }
}
