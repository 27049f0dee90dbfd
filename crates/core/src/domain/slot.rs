use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::domain::time::ClockTime;

/// First bookable hour of the day.
pub const OPENING_HOUR: u8 = 9;
/// Last hour shown in the availability grid.
pub const LAST_SLOT_HOUR: u8 = 23;

/// Default look-ahead for availability listings.
pub const DEFAULT_AVAILABILITY_DAYS: u64 = 7;
/// Widest availability listing, in days, counting both ends.
pub const MAX_AVAILABILITY_DAYS: i64 = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: ClockTime,
}

/// Half-open hour range `[first_hour, end_hour)` accepted by one code path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperatingWindow {
    pub first_hour: u8,
    pub end_hour: u8,
}

impl OperatingWindow {
    /// New bookings: 09:00 up to and including the 23:00 slot.
    pub const BOOKING: Self = Self { first_hour: 9, end_hour: 24 };
    /// Cancellations: hour must be strictly below 23.
    pub const CANCELLATION: Self = Self { first_hour: 9, end_hour: 23 };

    pub fn contains(&self, time: ClockTime) -> bool {
        time.hour() >= self.first_hour && time.hour() < self.end_hour
    }
}

/// Hourly grid 09:00..=23:00.
pub fn operating_grid() -> impl Iterator<Item = ClockTime> {
    (OPENING_HOUR..=LAST_SLOT_HOUR).filter_map(|hour| ClockTime::on_the_hour(hour).ok())
}

/// Every grid slot for each date in `start..=end`, ordered by date then time.
pub fn grid_for_range(start: NaiveDate, end: NaiveDate) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut date = start;
    while date <= end {
        slots.extend(operating_grid().map(|time| Slot { date, time }));
        match date.checked_add_days(Days::new(1)) {
            Some(next) => date = next,
            None => break,
        }
    }
    slots
}
