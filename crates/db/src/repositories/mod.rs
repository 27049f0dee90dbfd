use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use tablebook_core::domain::booking::Booking;
use tablebook_core::domain::session::{Session, SessionId};

pub mod bookings_csv;
pub mod memory;
pub mod sessions_json;

pub use bookings_csv::CsvBookingTable;
pub use memory::{InMemoryBookingTable, InMemorySessionRepository};
pub use sessions_json::JsonSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error on `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("background task failed: {0}")]
    Task(String),
}

impl RepositoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Record exists but its content cannot be read back.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(self, Self::Json(_) | Self::Decode(_))
    }
}

impl From<tokio::task::JoinError> for RepositoryError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Task(error.to_string())
    }
}

/// The whole booking table. Every mutation replaces it in one step, so a
/// reader never sees a half-written row.
#[async_trait]
pub trait BookingTable: Send + Sync {
    async fn load(&self) -> Result<Vec<Booking>, RepositoryError>;
    async fn replace(&self, bookings: Vec<Booking>) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: Session) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError>;
    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError>;
}
