use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::BookingId;
use crate::domain::dialogue::Intent;
use crate::domain::time::ClockTime;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Session ids become file names, so only uuid-like tokens are accepted.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self.0.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBooking {
    pub date: NaiveDate,
    pub time: ClockTime,
    pub booking_id: BookingId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClarificationKind {
    None,
    AmbiguousTime,
    HourlyTimeSuggestion,
}

/// An open question put to the user; its payload is the ambiguity data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clarification {
    AmbiguousTime { options: Vec<ClockTime> },
    HourlyTimeSuggestion { original: ClockTime, suggested: ClockTime },
}

impl Clarification {
    pub fn kind(&self) -> ClarificationKind {
        match self {
            Self::AmbiguousTime { .. } => ClarificationKind::AmbiguousTime,
            Self::HourlyTimeSuggestion { .. } => ClarificationKind::HourlyTimeSuggestion,
        }
    }
}

/// Partially filled request carried between turns.
///
/// A pending clarification always carries its kind and payload together, so
/// "pending without data" cannot be represented.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFillState {
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<ClockTime>,
    #[serde(default)]
    pub clarification: Option<Clarification>,
    #[serde(default)]
    pub last_booking: Option<LastBooking>,
}

impl SlotFillState {
    pub fn pending_clarification(&self) -> bool {
        self.clarification.is_some()
    }

    pub fn clarification_kind(&self) -> ClarificationKind {
        self.clarification.as_ref().map_or(ClarificationKind::None, Clarification::kind)
    }

    /// Field-level merge: only fields named in the patch change.
    pub fn merge(&mut self, patch: SlotFillPatch) {
        if let Some(intent) = patch.intent {
            self.intent = intent;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(clarification) = patch.clarification {
            self.clarification = clarification;
        }
        if let Some(last_booking) = patch.last_booking {
            self.last_booking = last_booking;
        }
    }
}

/// Partial update for [`SlotFillState`]. The outer `Option` says whether a
/// field is named at all; the inner one sets or clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotFillPatch {
    pub intent: Option<Option<Intent>>,
    pub date: Option<Option<NaiveDate>>,
    pub time: Option<Option<ClockTime>>,
    pub clarification: Option<Option<Clarification>>,
    pub last_booking: Option<Option<LastBooking>>,
}

impl SlotFillPatch {
    pub fn intent(mut self, intent: Intent) -> Self {
        self.intent = Some(Some(intent));
        self
    }

    pub fn date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn time(mut self, time: Option<ClockTime>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn clarification(mut self, clarification: Clarification) -> Self {
        self.clarification = Some(Some(clarification));
        self
    }

    pub fn clear_clarification(mut self) -> Self {
        self.clarification = Some(None);
        self
    }

    pub fn last_booking(mut self, last_booking: LastBooking) -> Self {
        self.last_booking = Some(Some(last_booking));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_name: String,
    pub status: SessionStatus,
    pub created_at: NaiveDateTime,
    pub last_updated: NaiveDateTime,
    #[serde(default)]
    pub context: SlotFillState,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
}

impl Session {
    pub fn new(session_id: SessionId, user_name: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            session_id,
            user_name: user_name.into(),
            status: SessionStatus::Active,
            created_at: now,
            last_updated: now,
            context: SlotFillState::default(),
            messages: Vec::new(),
        }
    }

    pub fn push_message(&mut self, role: MessageRole, content: impl Into<String>, now: NaiveDateTime) {
        self.messages.push(SessionMessage { role, content: content.into(), timestamp: now });
        self.last_updated = now;
    }

    pub fn is_idle_since(&self, cutoff: NaiveDateTime) -> bool {
        self.last_updated < cutoff
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        Clarification, ClarificationKind, Session, SessionId, SlotFillPatch, SlotFillState,
    };
    use crate::domain::dialogue::Intent;
    use crate::domain::time::ClockTime;

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    fn time(raw: &str) -> ClockTime {
        raw.parse().expect("time")
    }

    #[test]
    fn successive_merges_keep_untouched_fields() {
        let mut state = SlotFillState::default();
        state.merge(SlotFillPatch::default().date(Some(date("2024-01-01"))));
        state.merge(SlotFillPatch::default().time(Some(time("18:00"))));

        assert_eq!(state.date, Some(date("2024-01-01")));
        assert_eq!(state.time, Some(time("18:00")));
        assert_eq!(state.intent, None);
    }

    #[test]
    fn merge_can_clear_a_named_field() {
        let mut state = SlotFillState {
            intent: Some(Intent::Booking),
            clarification: Some(Clarification::HourlyTimeSuggestion {
                original: time("19:45"),
                suggested: time("20:00"),
            }),
            ..SlotFillState::default()
        };
        assert!(state.pending_clarification());
        assert_eq!(state.clarification_kind(), ClarificationKind::HourlyTimeSuggestion);

        state.merge(SlotFillPatch::default().clear_clarification());

        assert!(!state.pending_clarification());
        assert_eq!(state.clarification_kind(), ClarificationKind::None);
        assert_eq!(state.intent, Some(Intent::Booking));
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let patch = SlotFillPatch::default();
        let mut state = SlotFillState { date: Some(date("2024-05-05")), ..SlotFillState::default() };
        state.merge(patch);
        assert_eq!(state.date, Some(date("2024-05-05")));
    }

    #[test]
    fn clarification_serializes_with_kind_tag() {
        let clarification = Clarification::AmbiguousTime { options: vec![time("19:00"), time("20:00")] };
        let json = serde_json::to_value(&clarification).expect("serialize");
        assert_eq!(json["kind"], "ambiguous_time");
        assert_eq!(json["options"][1], "20:00");
    }

    #[test]
    fn session_ids_are_file_name_safe() {
        assert!(SessionId::generate().is_well_formed());
        assert!(!SessionId("../etc/passwd".to_string()).is_well_formed());
        assert!(!SessionId(String::new()).is_well_formed());
    }

    #[test]
    fn pushing_a_message_bumps_last_updated() {
        let start = date("2024-03-01").and_hms_opt(9, 0, 0).expect("datetime");
        let later = date("2024-03-01").and_hms_opt(9, 5, 0).expect("datetime");
        let mut session = Session::new(SessionId::generate(), "asha", start);
        session.push_message(super::MessageRole::User, "hello", later);

        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.last_updated, later);
        assert!(session.is_idle_since(later + chrono::Duration::hours(1)));
    }
}
