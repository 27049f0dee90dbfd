pub mod calendar;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod timeparse;

pub use calendar::{CalendarError, CalendarResolver, DateInference, HolidayLookup};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::booking::{Booking, BookingId};
pub use domain::dialogue::{Intent, TurnStatus};
pub use domain::session::{
    Clarification, ClarificationKind, LastBooking, MessageRole, Session, SessionId,
    SessionMessage, SessionStatus, SlotFillPatch, SlotFillState,
};
pub use domain::slot::{OperatingWindow, Slot};
pub use domain::time::ClockTime;
pub use errors::{ApplicationError, DomainError, InterfaceError};
