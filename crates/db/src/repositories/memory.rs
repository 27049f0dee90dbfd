use std::collections::HashMap;

use tokio::sync::RwLock;

use tablebook_core::domain::booking::Booking;
use tablebook_core::domain::session::{Session, SessionId};

use super::{BookingTable, RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemoryBookingTable {
    bookings: RwLock<Vec<Booking>>,
}

impl InMemoryBookingTable {
    pub fn with_bookings(bookings: Vec<Booking>) -> Self {
        Self { bookings: RwLock::new(bookings) }
    }
}

#[async_trait::async_trait]
impl BookingTable for InMemoryBookingTable {
    async fn load(&self) -> Result<Vec<Booking>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings.clone())
    }

    async fn replace(&self, bookings: Vec<Booking>) -> Result<(), RepositoryError> {
        let mut stored = self.bookings.write().await;
        *stored = bookings;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.0.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&id.0).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().map(SessionId).collect())
    }
}
