use std::sync::Arc;

use tablebook_core::clock::SystemClock;
use tablebook_core::config::LoadOptions;
use tablebook_db::{CsvBookingTable, SlotStore};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("reset", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("reset") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let store = SlotStore::new(Arc::new(CsvBookingTable::new(config.storage.bookings_path())), Arc::new(SystemClock));
    match runtime.block_on(store.reset()) {
        Ok(()) => CommandResult::success("reset", "All bookings have been reset"),
        Err(error) => CommandResult::failure("reset", "booking_storage", error.to_string(), 5),
    }
}
