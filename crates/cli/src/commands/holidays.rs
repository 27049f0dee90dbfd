use std::sync::Arc;

use chrono::Datelike;
use tablebook_agent::CalendarificClient;
use tablebook_core::calendar::{CalendarResolver, HolidayLookup};
use tablebook_core::clock::{Clock, SystemClock};
use tablebook_core::config::LoadOptions;

use crate::commands::{load_config, runtime, CommandResult};

const SAMPLE_SIZE: usize = 5;

/// Refresh the holiday cache for `years` (current and next year when empty).
pub fn run(options: &LoadOptions, years: &[i32], country: Option<String>) -> CommandResult {
    let mut options = options.clone();
    if country.is_some() {
        options.overrides.calendar_country_code = country;
    }
    let config = match load_config("holidays", &options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let client = match CalendarificClient::from_config(&config.calendar) {
        Ok(Some(client)) => client,
        Ok(None) => {
            return CommandResult::failure(
                "holidays",
                "holiday_lookup",
                "calendar.api_key is not configured; set TABLEBOOK_CALENDAR_API_KEY",
                4,
            );
        }
        Err(error) => return CommandResult::failure("holidays", "holiday_lookup", error.to_string(), 4),
    };
    let country_code = client.country_code().to_string();

    let years = if years.is_empty() {
        let current = SystemClock.today().year();
        vec![current, current + 1]
    } else {
        years.to_vec()
    };

    let runtime = match runtime("holidays") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let lookup: Arc<dyn HolidayLookup> = Arc::new(client);
        let resolver =
            CalendarResolver::with_cache_file(config.storage.holiday_cache_path(), Some(lookup), None).await;

        let mut refreshed = Vec::with_capacity(years.len());
        for year in &years {
            let count = resolver.refresh_year(*year).await.map_err(|error| format!("{year}: {error}"))?;
            refreshed.push(format!("{year} ({count} holidays)"));
        }

        let sample = match resolver.cached_year(years[0]).await {
            Some(entries) => entries
                .iter()
                .take(SAMPLE_SIZE)
                .map(|(name, date)| format!("{name} {date}"))
                .collect::<Vec<_>>()
                .join(", "),
            None => String::new(),
        };
        Ok::<(Vec<String>, String), String>((refreshed, sample))
    });

    match result {
        Ok((refreshed, sample)) => CommandResult::success(
            "holidays",
            format!("refreshed {} for {country_code}; sample: {sample}", refreshed.join(", ")),
        ),
        Err(message) => CommandResult::failure("holidays", "holiday_lookup", message, 5),
    }
}
