use std::sync::Arc;

use chrono::{Days, NaiveDate};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use tablebook_core::clock::Clock;
use tablebook_core::domain::booking::{Booking, BookingId};
use tablebook_core::domain::slot::{grid_for_range, Slot, DEFAULT_AVAILABILITY_DAYS, MAX_AVAILABILITY_DAYS};
use tablebook_core::domain::time::ClockTime;
use tablebook_core::errors::{ApplicationError, DomainError};

use crate::repositories::{BookingTable, RepositoryError};

#[derive(Debug, Error)]
pub enum SlotStoreError {
    #[error("Slot already booked")]
    Conflict { date: NaiveDate, time: ClockTime },
    #[error("No bookings found for {user_name}")]
    NoBookings { user_name: String },
    #[error("No booking found for {user_name} matching your criteria")]
    NoMatch { user_name: String },
    #[error("Date range too long. Please request at most {MAX_AVAILABILITY_DAYS} days.")]
    RangeTooLong { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<SlotStoreError> for ApplicationError {
    fn from(value: SlotStoreError) -> Self {
        match value {
            SlotStoreError::Conflict { date, time } => DomainError::SlotTaken { date, time }.into(),
            SlotStoreError::NoBookings { user_name } | SlotStoreError::NoMatch { user_name } => {
                DomainError::BookingNotFound { user_name }.into()
            }
            error @ SlotStoreError::RangeTooLong { .. } => {
                DomainError::InvalidField { field: "end_date", reason: error.to_string() }.into()
            }
            SlotStoreError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}

/// Which booking to cancel. See [`SlotStore::cancel`] for precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CancelRequest {
    pub user_name: String,
    pub date: Option<NaiveDate>,
    pub time: Option<ClockTime>,
    pub booking_id: Option<BookingId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Availability {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Booking CRUD over a [`BookingTable`].
///
/// Read-modify-write cycles are serialised within this process only; two
/// processes sharing one file can still lose updates.
pub struct SlotStore {
    table: Arc<dyn BookingTable>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl SlotStore {
    pub fn new(table: Arc<dyn BookingTable>, clock: Arc<dyn Clock>) -> Self {
        Self { table, clock, write_lock: Mutex::new(()) }
    }

    /// Book `(date, time)` for `user_name`. Any existing booking of the slot,
    /// by anyone, is a conflict.
    pub async fn book(
        &self,
        user_name: &str,
        date: NaiveDate,
        time: ClockTime,
    ) -> Result<Booking, SlotStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut bookings = self.table.load().await?;

        if bookings.iter().any(|booking| booking.occupies(date, time)) {
            warn!(event_name = "bookings.book.conflict", user_name, %date, %time, "slot already booked");
            return Err(SlotStoreError::Conflict { date, time });
        }

        let booking = Booking {
            id: next_booking_id(&bookings),
            user_name: user_name.to_string(),
            date,
            time,
            created_at: self.clock.now(),
        };
        bookings.push(booking.clone());
        self.table.replace(bookings).await?;

        info!(
            event_name = "bookings.book.created",
            user_name,
            booking_id = booking.id.0,
            %date,
            %time,
            "booking created"
        );
        Ok(booking)
    }

    /// Cancel exactly one booking. Precedence: booking id (must belong to the
    /// user), then the user's most recent booking when neither date nor time
    /// is given, then an exact `(user, date, time)` match.
    pub async fn cancel(&self, request: &CancelRequest) -> Result<Booking, SlotStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut bookings = self.table.load().await?;
        let user_name = request.user_name.as_str();

        let position = if let Some(booking_id) = request.booking_id {
            bookings
                .iter()
                .position(|booking| booking.id == booking_id && booking.belongs_to(user_name))
        } else if request.date.is_none() && request.time.is_none() {
            let latest = most_recent_of(&bookings, user_name)
                .ok_or_else(|| SlotStoreError::NoBookings { user_name: user_name.to_string() })?;
            let latest_id = latest.id;
            bookings.iter().position(|booking| booking.id == latest_id && booking.belongs_to(user_name))
        } else {
            bookings.iter().position(|booking| {
                booking.belongs_to(user_name)
                    && Some(booking.date) == request.date
                    && Some(booking.time) == request.time
            })
        };

        let Some(position) = position else {
            warn!(event_name = "bookings.cancel.not_found", user_name, "no matching booking");
            return Err(SlotStoreError::NoMatch { user_name: user_name.to_string() });
        };

        let cancelled = bookings.remove(position);
        self.table.replace(bookings).await?;

        info!(
            event_name = "bookings.cancel.removed",
            user_name,
            booking_id = cancelled.id.0,
            date = %cancelled.date,
            time = %cancelled.time,
            "booking cancelled"
        );
        Ok(cancelled)
    }

    /// Free grid slots over `start..=end`, defaulting to today and a week ahead.
    /// Ranges wider than [`MAX_AVAILABILITY_DAYS`] are refused before the grid
    /// is built.
    pub async fn list_available(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Availability, SlotStoreError> {
        let today = self.clock.today();
        let start_date = start.unwrap_or(today);
        let end_date = end.unwrap_or_else(|| {
            today.checked_add_days(Days::new(DEFAULT_AVAILABILITY_DAYS)).unwrap_or(today)
        });
        if (end_date - start_date).num_days() + 1 > MAX_AVAILABILITY_DAYS {
            warn!(
                event_name = "bookings.availability.range_rejected",
                start_date = %start_date,
                end_date = %end_date,
                "availability range too long"
            );
            return Err(SlotStoreError::RangeTooLong { start: start_date, end: end_date });
        }

        let bookings = self.table.load().await?;
        let slots = grid_for_range(start_date, end_date)
            .into_iter()
            .filter(|slot| !bookings.iter().any(|booking| booking.occupies(slot.date, slot.time)))
            .collect();

        Ok(Availability { start_date, end_date, slots })
    }

    pub async fn list_by_user(&self, user_name: &str) -> Result<Vec<Booking>, SlotStoreError> {
        let bookings = self.table.load().await?;
        Ok(bookings.into_iter().filter(|booking| booking.belongs_to(user_name)).collect())
    }

    pub async fn most_recent(&self, user_name: &str) -> Result<Option<Booking>, SlotStoreError> {
        let bookings = self.table.load().await?;
        Ok(most_recent_of(&bookings, user_name).cloned())
    }

    pub async fn reset(&self) -> Result<(), SlotStoreError> {
        let _guard = self.write_lock.lock().await;
        self.table.replace(Vec::new()).await?;
        info!(event_name = "bookings.reset", "all bookings cleared");
        Ok(())
    }
}

/// Highest id plus one, never below count + 1.
///
/// This departs from plain `count + 1`, which reuses the id of a booking still
/// on file once an earlier one is cancelled. The two agree on a table that only
/// ever grew. Separate processes writing the same file can still collide.
fn next_booking_id(bookings: &[Booking]) -> BookingId {
    let highest = bookings.iter().map(|booking| booking.id.0).max().unwrap_or(0);
    BookingId(highest.max(bookings.len() as u64) + 1)
}

/// Latest `created_at` wins; ties go to the higher id.
fn most_recent_of<'a>(bookings: &'a [Booking], user_name: &str) -> Option<&'a Booking> {
    bookings
        .iter()
        .filter(|booking| booking.belongs_to(user_name))
        .max_by_key(|booking| (booking.created_at, booking.id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime};

    use tablebook_core::clock::FixedClock;
    use tablebook_core::domain::booking::{Booking, BookingId};
    use tablebook_core::domain::time::ClockTime;
    use tablebook_core::errors::{ApplicationError, DomainError};

    use super::{CancelRequest, SlotStore, SlotStoreError};
    use crate::repositories::{BookingTable, InMemoryBookingTable};

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    fn time(raw: &str) -> ClockTime {
        raw.parse().expect("time")
    }

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("datetime")
    }

    fn store_at(now: &str) -> (SlotStore, Arc<InMemoryBookingTable>) {
        let table = Arc::new(InMemoryBookingTable::default());
        let store = SlotStore::new(table.clone(), Arc::new(FixedClock(at(now))));
        (store, table)
    }

    #[tokio::test]
    async fn booked_slot_disappears_from_availability() {
        let (store, _) = store_at("2024-03-01 10:00");
        store.book("asha", date("2024-03-02"), time("19:00")).await.expect("book");

        let availability =
            store.list_available(Some(date("2024-03-02")), Some(date("2024-03-02"))).await.expect("list");

        assert_eq!(availability.slots.len(), 14);
        assert!(!availability.slots.iter().any(|slot| slot.time == time("19:00")));
    }

    #[tokio::test]
    async fn second_booking_of_a_slot_conflicts_and_leaves_table_unchanged() {
        let (store, table) = store_at("2024-03-01 10:00");
        let first = store.book("asha", date("2024-03-02"), time("19:00")).await.expect("book");
        assert_eq!(first.id, BookingId(1));

        let error = store.book("ravi", date("2024-03-02"), time("19:00")).await.expect_err("conflict");
        assert!(matches!(error, SlotStoreError::Conflict { .. }));
        assert_eq!(error.to_string(), "Slot already booked");
        assert_eq!(table.load().await.expect("load"), vec![first]);
    }

    #[tokio::test]
    async fn cancel_removes_one_record_and_second_cancel_is_not_found() {
        let (store, table) = store_at("2024-03-01 10:00");
        store.book("asha", date("2024-03-02"), time("19:00")).await.expect("book");
        store.book("asha", date("2024-03-02"), time("20:00")).await.expect("book");

        let request = CancelRequest {
            user_name: "asha".to_string(),
            date: Some(date("2024-03-02")),
            time: Some(time("19:00")),
            booking_id: None,
        };
        let cancelled = store.cancel(&request).await.expect("cancel");
        assert_eq!(cancelled.time, time("19:00"));
        assert_eq!(table.load().await.expect("load").len(), 1);

        let error = store.cancel(&request).await.expect_err("second cancel");
        assert_eq!(error.to_string(), "No booking found for asha matching your criteria");
    }

    #[tokio::test]
    async fn cancel_by_id_requires_the_owner() {
        let table = Arc::new(InMemoryBookingTable::with_bookings(vec![
            Booking {
                id: BookingId(7),
                user_name: "asha".to_string(),
                date: date("2024-03-02"),
                time: time("19:00"),
                created_at: at("2024-03-01 09:00"),
            },
        ]));
        let store = SlotStore::new(table, Arc::new(FixedClock(at("2024-03-01 10:00"))));

        let wrong_user = CancelRequest {
            user_name: "ravi".to_string(),
            booking_id: Some(BookingId(7)),
            ..CancelRequest::default()
        };
        assert!(matches!(store.cancel(&wrong_user).await, Err(SlotStoreError::NoMatch { .. })));

        let owner = CancelRequest { user_name: "asha".to_string(), ..wrong_user };
        assert_eq!(store.cancel(&owner).await.expect("cancel").id, BookingId(7));
    }

    #[tokio::test]
    async fn cancel_without_date_or_time_takes_the_latest_booking() {
        let table = Arc::new(InMemoryBookingTable::with_bookings(vec![
            Booking {
                id: BookingId(1),
                user_name: "asha".to_string(),
                date: date("2024-03-05"),
                time: time("12:00"),
                created_at: at("2024-03-01 09:00"),
            },
            Booking {
                id: BookingId(2),
                user_name: "asha".to_string(),
                date: date("2024-03-03"),
                time: time("18:00"),
                created_at: at("2024-03-01 09:30"),
            },
        ]));
        let store = SlotStore::new(table, Arc::new(FixedClock(at("2024-03-01 10:00"))));

        let latest = store.most_recent("asha").await.expect("most recent");
        assert_eq!(latest.map(|booking| booking.id), Some(BookingId(2)));

        let cancelled = store
            .cancel(&CancelRequest { user_name: "asha".to_string(), ..CancelRequest::default() })
            .await
            .expect("cancel");
        assert_eq!(cancelled.id, BookingId(2));

        let nobody = store
            .cancel(&CancelRequest { user_name: "ravi".to_string(), ..CancelRequest::default() })
            .await
            .expect_err("no bookings");
        assert_eq!(nobody.to_string(), "No bookings found for ravi");
    }

    #[tokio::test]
    async fn ids_stay_unique_after_a_cancellation() {
        let (store, _) = store_at("2024-03-01 10:00");
        store.book("asha", date("2024-03-02"), time("19:00")).await.expect("book");
        let second = store.book("ravi", date("2024-03-02"), time("20:00")).await.expect("book");
        store
            .cancel(&CancelRequest { user_name: "asha".to_string(), ..CancelRequest::default() })
            .await
            .expect("cancel");

        let third = store.book("mira", date("2024-03-02"), time("21:00")).await.expect("book");
        assert_ne!(third.id, second.id);
    }

    #[tokio::test]
    async fn default_availability_window_is_today_plus_seven_days() {
        let (store, _) = store_at("2024-03-01 10:00");
        let availability = store.list_available(None, None).await.expect("list");

        assert_eq!(availability.start_date, date("2024-03-01"));
        assert_eq!(availability.end_date, date("2024-03-08"));
        assert_eq!(availability.slots.len(), 8 * 15);
    }

    #[tokio::test]
    async fn availability_refuses_ranges_wider_than_a_month() {
        let (store, _) = store_at("2024-03-01 10:00");

        let month = store.list_available(Some(date("2024-03-01")), Some(date("2024-03-31"))).await.expect("list");
        assert_eq!(month.slots.len(), 31 * 15);

        let error = store
            .list_available(Some(date("2000-01-01")), Some(date("2499-12-31")))
            .await
            .expect_err("range too long");
        assert!(matches!(error, SlotStoreError::RangeTooLong { .. }));
        let mapped: ApplicationError = error.into();
        assert!(matches!(mapped, ApplicationError::Domain(DomainError::InvalidField { field: "end_date", .. })));
    }

    #[tokio::test]
    async fn list_by_user_and_reset() {
        let (store, _) = store_at("2024-03-01 10:00");
        store.book("asha", date("2024-03-02"), time("19:00")).await.expect("book");
        store.book("ravi", date("2024-03-02"), time("20:00")).await.expect("book");

        assert_eq!(store.list_by_user("asha").await.expect("list").len(), 1);
        store.reset().await.expect("reset");
        assert!(store.list_by_user("asha").await.expect("list").is_empty());
    }

    #[test]
    fn store_errors_map_onto_the_domain_taxonomy() {
        let conflict: ApplicationError =
            SlotStoreError::Conflict { date: date("2024-03-02"), time: time("19:00") }.into();
        assert!(matches!(conflict, ApplicationError::Domain(DomainError::SlotTaken { .. })));

        let missing: ApplicationError = SlotStoreError::NoMatch { user_name: "asha".into() }.into();
        assert!(matches!(missing, ApplicationError::Domain(DomainError::BookingNotFound { .. })));
    }
}
