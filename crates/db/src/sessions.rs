use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

use tablebook_core::clock::Clock;
use tablebook_core::domain::session::{
    LastBooking, MessageRole, Session, SessionId, SessionStatus, SlotFillPatch,
};
use tablebook_core::errors::ApplicationError;

use crate::repositories::{RepositoryError, SessionRepository};

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session `{0}` not found")]
    NotFound(SessionId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<SessionStoreError> for ApplicationError {
    fn from(value: SessionStoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

/// Changes applied to a session in one write.
#[derive(Clone, Debug, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub context: SlotFillPatch,
}

impl SessionUpdate {
    pub fn context(patch: SlotFillPatch) -> Self {
        Self { status: None, context: patch }
    }

    pub fn completed(mut self) -> Self {
        self.status = Some(SessionStatus::Completed);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub examined: usize,
    pub expired: usize,
    pub corrupt: usize,
}

/// Conversation state keyed by session id. Every mutation bumps
/// `last_updated`.
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn create(&self, user_name: &str) -> Result<Session, SessionStoreError> {
        let session = Session::new(SessionId::generate(), user_name, self.clock.now());
        self.repository.save(session.clone()).await?;
        info!(
            event_name = "sessions.created",
            session_id = %session.session_id,
            user_name,
            "session created"
        );
        Ok(session)
    }

    /// Unknown ids and unreadable records both read as absent.
    pub async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError> {
        match self.repository.find_by_id(id).await {
            Ok(session) => Ok(session),
            Err(error) if error.is_corrupt_record() => {
                warn!(
                    event_name = "sessions.corrupt",
                    session_id = %id,
                    error = %error,
                    "unreadable session treated as absent"
                );
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Shallow merge: context fields not named in the update are kept.
    pub async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<Session, SessionStoreError> {
        let mut session = self.require(id).await?;
        if let Some(status) = update.status {
            session.status = status;
        }
        session.context.merge(update.context);
        session.last_updated = self.clock.now();
        self.repository.save(session.clone()).await?;
        Ok(session)
    }

    pub async fn append_message(
        &self,
        id: &SessionId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), SessionStoreError> {
        let mut session = self.require(id).await?;
        session.push_message(role, content, self.clock.now());
        self.repository.save(session).await?;
        Ok(())
    }

    pub async fn record_last_booking(
        &self,
        id: &SessionId,
        last_booking: LastBooking,
    ) -> Result<(), SessionStoreError> {
        self.update(id, SessionUpdate::context(SlotFillPatch::default().last_booking(last_booking)))
            .await
            .map(|_| ())
    }

    /// Delete sessions idle for longer than `max_age`. Unreadable session
    /// records are deleted as well.
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<PurgeReport, SessionStoreError> {
        let cutoff = self.clock.now() - max_age;
        let mut report = PurgeReport::default();

        for id in self.repository.list_ids().await? {
            report.examined += 1;
            match self.repository.find_by_id(&id).await {
                Ok(Some(session)) if session.is_idle_since(cutoff) => {
                    if self.repository.delete(&id).await? {
                        report.expired += 1;
                    }
                }
                Ok(_) => {}
                Err(error) if error.is_corrupt_record() => {
                    warn!(event_name = "sessions.purge.corrupt", session_id = %id, error = %error, "removing unreadable session");
                    if self.repository.delete(&id).await? {
                        report.corrupt += 1;
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }

        info!(
            event_name = "sessions.purged",
            examined = report.examined,
            expired = report.expired,
            corrupt = report.corrupt,
            "session purge finished"
        );
        Ok(report)
    }

    async fn require(&self, id: &SessionId) -> Result<Session, SessionStoreError> {
        self.get(id).await?.ok_or_else(|| SessionStoreError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    use tablebook_core::clock::FixedClock;
    use tablebook_core::domain::booking::BookingId;
    use tablebook_core::domain::session::{
        LastBooking, MessageRole, Session, SessionId, SessionStatus, SlotFillPatch,
    };

    use super::{SessionStore, SessionStoreError, SessionUpdate};
    use crate::repositories::{InMemorySessionRepository, JsonSessionRepository, SessionRepository};

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("datetime")
    }

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    fn store(now: &str) -> SessionStore {
        SessionStore::new(Arc::new(InMemorySessionRepository::default()), Arc::new(FixedClock(at(now))))
    }

    #[tokio::test]
    async fn updates_merge_context_fields() {
        let store = store("2024-03-01 10:00");
        let session = store.create("asha").await.expect("create");

        store
            .update(&session.session_id, SessionUpdate::context(SlotFillPatch::default().date(Some(date("2024-01-01")))))
            .await
            .expect("first update");
        let updated = store
            .update(
                &session.session_id,
                SessionUpdate::context(SlotFillPatch::default().time(Some("18:00".parse().expect("time")))),
            )
            .await
            .expect("second update");

        assert_eq!(updated.context.date, Some(date("2024-01-01")));
        assert_eq!(updated.context.time, Some("18:00".parse().expect("time")));
        assert_eq!(updated.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let store = store("2024-03-01 10:00");
        let id = SessionId("nope".to_string());

        assert!(store.get(&id).await.expect("get").is_none());
        assert!(matches!(
            store.append_message(&id, MessageRole::User, "hi").await,
            Err(SessionStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update(&id, SessionUpdate::default()).await,
            Err(SessionStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn messages_and_last_booking_are_recorded() {
        let store = store("2024-03-01 10:00");
        let session = store.create("asha").await.expect("create");
        let last = LastBooking {
            date: date("2024-03-02"),
            time: "19:00".parse().expect("time"),
            booking_id: BookingId(3),
        };

        store.append_message(&session.session_id, MessageRole::User, "book tomorrow 7pm").await.expect("append");
        store.record_last_booking(&session.session_id, last).await.expect("record");
        store
            .update(&session.session_id, SessionUpdate::default().completed())
            .await
            .expect("complete");

        let stored = store.get(&session.session_id).await.expect("get").expect("session");
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.context.last_booking, Some(last));
        assert_eq!(stored.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn purge_removes_idle_and_corrupt_sessions() {
        let dir = TempDir::new().expect("tempdir");
        let repository = Arc::new(JsonSessionRepository::new(dir.path()));
        repository.save(Session::new(SessionId("old".into()), "asha", at("2024-02-27 09:00"))).await.expect("save");
        repository.save(Session::new(SessionId("fresh".into()), "ravi", at("2024-03-01 08:00"))).await.expect("save");
        std::fs::write(dir.path().join("broken.json"), "{").expect("write");

        let store = SessionStore::new(repository.clone(), Arc::new(FixedClock(at("2024-03-01 10:00"))));
        let report = store.purge_older_than(Duration::hours(24)).await.expect("purge");

        assert_eq!(report.examined, 3);
        assert_eq!(report.expired, 1);
        assert_eq!(report.corrupt, 1);
        assert_eq!(repository.list_ids().await.expect("list"), vec![SessionId("fresh".into())]);
    }
}
