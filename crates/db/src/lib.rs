pub mod migrations;
pub mod repositories;
pub mod sessions;
pub mod slot_store;

pub use migrations::{migrate_bookings_file, MigrationReport};
pub use repositories::{
    BookingTable, CsvBookingTable, InMemoryBookingTable, InMemorySessionRepository,
    JsonSessionRepository, RepositoryError, SessionRepository,
};
pub use sessions::{PurgeReport, SessionStore, SessionStoreError, SessionUpdate};
pub use slot_store::{Availability, CancelRequest, SlotStore, SlotStoreError};
