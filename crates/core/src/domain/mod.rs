pub mod booking;
pub mod dialogue;
pub mod session;
pub mod slot;
pub mod time;
