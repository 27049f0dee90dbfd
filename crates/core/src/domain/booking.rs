use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::time::ClockTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reserved slot. Bookings are created and removed, never edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_name: String,
    pub date: NaiveDate,
    pub time: ClockTime,
    pub created_at: NaiveDateTime,
}

impl Booking {
    pub fn occupies(&self, date: NaiveDate, time: ClockTime) -> bool {
        self.date == date && self.time == time
    }

    pub fn belongs_to(&self, user_name: &str) -> bool {
        self.user_name == user_name
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Booking, BookingId};

    #[test]
    fn occupancy_is_keyed_by_date_and_time_only() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).expect("date");
        let booking = Booking {
            id: BookingId(1),
            user_name: "asha".to_string(),
            date,
            time: "19:00".parse().expect("time"),
            created_at: date.and_hms_opt(10, 0, 0).expect("datetime"),
        };

        assert!(booking.occupies(date, "19:00".parse().expect("time")));
        assert!(!booking.occupies(date, "20:00".parse().expect("time")));
        assert!(booking.belongs_to("asha"));
        assert!(!booking.belongs_to("ravi"));
    }
}
