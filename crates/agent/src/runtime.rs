//! The dialogue orchestrator: one utterance in, one response envelope out.
//!
//! Per turn: load or create the session, answer a pending clarification if
//! there is one, otherwise classify the utterance (with the follow-up
//! heuristic) and dispatch on intent. Every failure is folded into the
//! envelope; nothing propagates past [`DialogueOrchestrator::handle_turn`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tablebook_core::calendar::CalendarResolver;
use tablebook_core::clock::Clock;
use tablebook_core::domain::booking::BookingId;
use tablebook_core::domain::dialogue::{Intent, TurnStatus};
use tablebook_core::domain::session::{
    Clarification, LastBooking, MessageRole, Session, SessionId, SlotFillPatch,
};
use tablebook_core::domain::slot::Slot;
use tablebook_core::domain::time::ClockTime;
use tablebook_core::errors::ApplicationError;
use tablebook_core::timeparse::{mentions_clock_time, parse_bare_hour, parse_time};
use tablebook_db::{CancelRequest, SessionStore, SessionUpdate, SlotStore, SlotStoreError};

use crate::conversation::{ExtractedIntent, ExtractionContext, IntentExtractor, KeywordIntentExtractor};
use crate::guardrails::{GuardrailDecision, GuardrailIntent, OperatingHoursPolicy};
use crate::renderer::{RenderError, ReplyOutcome, ReplyRenderer};

const FOLLOW_UP_CUES: &[&str] = &[
    "instead",
    "how about",
    "what about",
    "can it be",
    "is it available",
    "try",
    "another",
    "different",
    "for",
];
const FOLLOW_UP_MAX_WORDS: usize = 7;
const ACCEPT_CUES: &[&str] = &["yes", "yeah", "yep", "ok", "okay", "sure", "fine"];
/// Holiday names tried against the raw utterance when extraction found no date.
const HOLIDAY_KEYWORDS: &[&str] = &["christmas eve", "christmas", "new year", "diwali", "holi"];

/// Body of `POST /booking`. Fields are optional so a missing one can be
/// answered inside the envelope.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub booking_request: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /cancel-booking`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CancellationRequest {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub booking_id: Option<u64>,
}

/// The uniform response envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnResponse {
    pub status: TurnStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<ClockTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_time: Option<ClockTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<Vec<Slot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nlp_response: Option<String>,
}

impl TurnResponse {
    pub fn new(status: TurnStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            session_id: None,
            booking_id: None,
            date: None,
            time: None,
            cancelled_date: None,
            cancelled_time: None,
            available_slots: None,
            nlp_response: None,
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::new(TurnStatus::Pending, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(TurnStatus::Failure, message)
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// What the assistant actually said: the rendered reply when there is one.
    pub fn reply_text(&self) -> &str {
        self.nlp_response.as_deref().unwrap_or(&self.message)
    }
}

/// The per-turn state, derived from the stored context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogueState {
    Idle,
    AwaitingDate,
    AwaitingTime,
    AwaitingTimeClarification { options: Vec<ClockTime> },
    AwaitingHourlyRounding { original: ClockTime, suggested: ClockTime },
}

impl DialogueState {
    pub fn of(session: &Session) -> Self {
        let context = &session.context;
        match &context.clarification {
            Some(Clarification::AmbiguousTime { options }) => {
                Self::AwaitingTimeClarification { options: options.clone() }
            }
            Some(Clarification::HourlyTimeSuggestion { original, suggested }) => {
                Self::AwaitingHourlyRounding { original: *original, suggested: *suggested }
            }
            None => match (context.intent, context.date, context.time) {
                (Some(Intent::Booking), None, _) => Self::AwaitingDate,
                (Some(Intent::Booking), Some(_), None) => Self::AwaitingTime,
                _ => Self::Idle,
            },
        }
    }
}

type TurnResult = Result<TurnResponse, ApplicationError>;

pub struct DialogueOrchestrator {
    slots: Arc<SlotStore>,
    sessions: Arc<SessionStore>,
    calendar: Arc<CalendarResolver>,
    extractor: Arc<dyn IntentExtractor>,
    renderer: Arc<dyn ReplyRenderer>,
    clock: Arc<dyn Clock>,
    policy: OperatingHoursPolicy,
    venue: String,
}

impl DialogueOrchestrator {
    pub fn new(
        slots: Arc<SlotStore>,
        sessions: Arc<SessionStore>,
        calendar: Arc<CalendarResolver>,
        extractor: Arc<dyn IntentExtractor>,
        renderer: Arc<dyn ReplyRenderer>,
        clock: Arc<dyn Clock>,
        venue: impl Into<String>,
    ) -> Self {
        let venue = venue.into();
        Self {
            slots,
            sessions,
            calendar,
            extractor,
            renderer,
            clock,
            policy: OperatingHoursPolicy::new(venue.clone()),
            venue,
        }
    }

    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let echoed_session = request.session_id.clone().map(SessionId);
        let (Some(user_name), Some(text)) = (non_blank(request.user_name), non_blank(request.booking_request))
        else {
            let response = TurnResponse::failure("Missing user_name or booking_request");
            return match echoed_session {
                Some(session_id) => response.with_session(session_id),
                None => response,
            };
        };

        let session = match self.open_session(&user_name, echoed_session).await {
            Ok(session) => session,
            Err(error) => return failed_turn(error, None),
        };
        let session_id = session.session_id.clone();
        info!(
            event_name = "dialogue.turn.received",
            session_id = %session_id,
            user_name = %user_name,
            "dialogue turn received"
        );

        let response = match self.run_turn(&user_name, &text, session).await {
            Ok(response) => response,
            Err(error) => failed_turn(error, Some(&session_id)),
        };

        if let Err(error) =
            self.sessions.append_message(&session_id, MessageRole::Assistant, response.reply_text()).await
        {
            warn!(event_name = "dialogue.reply.not_recorded", session_id = %session_id, error = %error, "assistant reply not saved");
        }
        info!(
            event_name = "dialogue.turn.completed",
            session_id = %session_id,
            status = %response.status,
            "dialogue turn completed"
        );
        response.with_session(session_id)
    }

    /// Direct cancellation, sharing the dialogue's cancellation routine.
    pub async fn cancel_direct(&self, request: CancellationRequest) -> TurnResponse {
        let Some(user_name) = non_blank(request.user_name) else {
            return TurnResponse::failure("Missing user_name for cancellation");
        };
        let time = match non_blank(request.time).map(|raw| ClockTime::from_str(&raw)) {
            None => None,
            Some(Ok(time)) => Some(time),
            Some(Err(_)) => {
                return TurnResponse::failure("Invalid time format for cancellation. Please use HH:MM format.")
            }
        };
        let date = match non_blank(request.date).map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d")) {
            None => None,
            Some(Ok(date)) => Some(date),
            Some(Err(_)) => {
                return TurnResponse::failure(
                    "Invalid date format for cancellation. Please use YYYY-MM-DD format.",
                )
            }
        };

        let cancel = CancelRequest { user_name, date, time, booking_id: request.booking_id.map(BookingId) };
        self.perform_cancellation(cancel, None).await.unwrap_or_else(|error| failed_turn(error, None))
    }

    async fn open_session(
        &self,
        user_name: &str,
        requested: Option<SessionId>,
    ) -> Result<Session, ApplicationError> {
        if let Some(id) = requested {
            if id.is_well_formed() {
                if let Some(session) = self.sessions.get(&id).await? {
                    return Ok(session);
                }
            }
            debug!(event_name = "dialogue.session.replaced", requested = %id, "unknown session id, starting a new one");
        }
        Ok(self.sessions.create(user_name).await?)
    }

    async fn run_turn(&self, user_name: &str, text: &str, session: Session) -> TurnResult {
        let session_id = session.session_id.clone();
        self.sessions.append_message(&session_id, MessageRole::User, text).await?;

        match DialogueState::of(&session) {
            DialogueState::AwaitingTimeClarification { options } => {
                self.answer_time_clarification(user_name, text, &session, &options).await
            }
            DialogueState::AwaitingHourlyRounding { suggested, .. } => {
                self.answer_hourly_rounding(user_name, text, &session, suggested).await
            }
            DialogueState::Idle | DialogueState::AwaitingDate | DialogueState::AwaitingTime => {
                self.dispatch(user_name, text, &session).await
            }
        }
    }

    async fn answer_time_clarification(
        &self,
        user_name: &str,
        text: &str,
        session: &Session,
        options: &[ClockTime],
    ) -> TurnResult {
        let picked = match self.extractor.clarify_time(text, options).await {
            Ok(picked) => picked,
            Err(error) => {
                warn!(event_name = "dialogue.clarification.degraded", error = %error, "clarification reply not understood");
                None
            }
        };
        let Some(picked) = picked else {
            return Ok(TurnResponse::pending(
                "I'm sorry, I still couldn't understand the time. Please specify a time between 9 AM and 11 PM in a clear format, like '2 PM' or '14:00'.",
            ));
        };

        let time = match self.check_hours(GuardrailIntent::ClarifiedTime { time: picked }) {
            GuardrailDecision::Allow { time } => time,
            GuardrailDecision::Deny { user_message, .. } | GuardrailDecision::Clarify { user_message, .. } => {
                return Ok(TurnResponse::failure(user_message));
            }
        };

        self.resume_booking(user_name, session, time).await
    }

    async fn answer_hourly_rounding(
        &self,
        user_name: &str,
        text: &str,
        session: &Session,
        suggested: ClockTime,
    ) -> TurnResult {
        let time = if has_accept_cue(text) {
            suggested
        } else {
            let context = self.extraction_context(session);
            let offered = match self.extractor.booking_details(text, &context).await {
                Ok(details) => details.time,
                Err(error) => {
                    warn!(event_name = "dialogue.clarification.degraded", error = %error, "hourly reply not extracted");
                    None
                }
            };
            let Some(offered) = offered.or_else(|| parse_bare_hour(text)) else {
                return Ok(TurnResponse::pending(
                    "I couldn't understand the time. Please specify an hourly time like 6 PM or 18:00.",
                ));
            };
            match self.check_hours(GuardrailIntent::HourlyReply { time: offered }) {
                GuardrailDecision::Allow { time } => time,
                GuardrailDecision::Deny { user_message, .. } | GuardrailDecision::Clarify { user_message, .. } => {
                    return Ok(TurnResponse::pending(user_message));
                }
            }
        };

        self.resume_booking(user_name, session, time).await
    }

    /// A clarification settled the time: clear it, keep the stored date and
    /// carry on as a booking.
    async fn resume_booking(&self, user_name: &str, session: &Session, time: ClockTime) -> TurnResult {
        let updated = self
            .sessions
            .update(
                &session.session_id,
                SessionUpdate::context(SlotFillPatch::default().time(Some(time)).clear_clarification()),
            )
            .await?;

        let Some(date) = updated.context.date else {
            return Ok(TurnResponse::pending(self.ask_booking_date()));
        };
        self.validate_and_book(user_name, &session.session_id, date, time, None).await
    }

    async fn dispatch(&self, user_name: &str, text: &str, session: &Session) -> TurnResult {
        let context = self.extraction_context(session);
        let previous = &session.context;
        let follow_up = previous.intent == Some(Intent::Booking) && is_follow_up_phrase(text);

        let extracted = match self.extractor.extract(text, &context).await {
            Ok(extracted) => extracted,
            Err(error) => {
                warn!(event_name = "dialogue.extractor.degraded", error = %error, "using keyword extraction");
                KeywordIntentExtractor::new().details(text, KeywordIntentExtractor::new().classify(text), &context)
            }
        };

        let mut intent = extracted.intent;
        if follow_up && mentions_clock_time(text) {
            intent = Intent::Booking;
        }
        if follow_up && intent == Intent::Unknown {
            intent = previous.intent.unwrap_or(Intent::Unknown);
        }
        debug!(
            event_name = "dialogue.intent.resolved",
            session_id = %session.session_id,
            intent = %intent,
            follow_up,
            "intent resolved"
        );

        self.sessions
            .update(&session.session_id, SessionUpdate::context(SlotFillPatch::default().intent(intent)))
            .await?;

        match intent {
            Intent::Booking => {
                let details = if extracted.intent == Intent::Booking {
                    extracted
                } else {
                    self.booking_details(text, &context).await
                };
                let inherited_date = if follow_up { previous.date } else { None };
                let inherited_time = match DialogueState::of(session) {
                    DialogueState::AwaitingDate => previous.time,
                    _ => None,
                };
                self.handle_booking(user_name, text, session, details, inherited_date, inherited_time).await
            }
            Intent::Cancellation => self.handle_cancellation(user_name, session, extracted).await,
            Intent::Availability => self.handle_availability(text, &context, extracted).await,
            Intent::Unknown => Ok(TurnResponse::failure(format!(
                "I couldn't understand your request. Could you please specify if you'd like to make a reservation, cancel a reservation, or check availability at {}?",
                self.venue
            ))),
        }
    }

    async fn handle_booking(
        &self,
        user_name: &str,
        text: &str,
        session: &Session,
        details: ExtractedIntent,
        inherited_date: Option<NaiveDate>,
        inherited_time: Option<ClockTime>,
    ) -> TurnResult {
        let today = self.clock.today();
        let festival = details.festival.clone();

        let mut date = details.date;
        if date.is_none() {
            if let Some(name) = festival.as_deref() {
                date = self.calendar.resolve(name, today).await;
                if let Some(resolved) = date {
                    info!(event_name = "dialogue.festival.resolved", festival = name, date = %resolved, "festival date resolved");
                }
            }
        }
        if date.is_none() {
            date = self.holiday_keyword_date(text, today).await;
        }
        if date.is_none() {
            date = inherited_date;
        }

        let mut time = details.time;
        if time.is_none() && !details.is_time_ambiguous() {
            time = parse_time(text).or(inherited_time);
        }

        let session_id = &session.session_id;
        if details.is_time_ambiguous() && time.is_none() {
            let options = details.time_options.clone();
            self.sessions
                .update(
                    session_id,
                    SessionUpdate::context(
                        SlotFillPatch::default()
                            .date(date)
                            .time(None)
                            .clarification(Clarification::AmbiguousTime { options: options.clone() }),
                    ),
                )
                .await?;
            let listed = options.iter().map(ClockTime::spoken).collect::<Vec<_>>().join(" or ");
            return Ok(TurnResponse::pending(format!(
                "I noticed you mentioned more than one time ({listed}). Which time would you like to reserve at {}?",
                self.venue
            )));
        }

        self.sessions
            .update(session_id, SessionUpdate::context(SlotFillPatch::default().date(date).time(time)))
            .await?;

        let Some(date) = date else {
            return Ok(TurnResponse::pending(self.ask_booking_date()));
        };
        let Some(time) = time else {
            return Ok(TurnResponse::pending(format!(
                "Could you please specify what time you would like to reserve at {}? We accept reservations on the hour between 9 AM and 11 PM.",
                self.venue
            )));
        };

        self.validate_and_book(user_name, session_id, date, time, festival.as_deref()).await
    }

    async fn validate_and_book(
        &self,
        user_name: &str,
        session_id: &SessionId,
        date: NaiveDate,
        time: ClockTime,
        festival: Option<&str>,
    ) -> TurnResult {
        match self.check_hours(GuardrailIntent::Booking { date, time }) {
            GuardrailDecision::Allow { time } => {
                self.book_and_render(user_name, session_id, date, time, festival).await
            }
            GuardrailDecision::Clarify { user_message, suggested, .. } => {
                self.sessions
                    .update(
                        session_id,
                        SessionUpdate::context(
                            SlotFillPatch::default()
                                .date(Some(date))
                                .clarification(Clarification::HourlyTimeSuggestion { original: time, suggested }),
                        ),
                    )
                    .await?;
                Ok(TurnResponse::pending(user_message))
            }
            GuardrailDecision::Deny { user_message, .. } => Ok(TurnResponse::failure(user_message)),
        }
    }

    fn check_hours(&self, intent: GuardrailIntent) -> GuardrailDecision {
        let decision = self.policy.evaluate(&intent);
        match &decision {
            GuardrailDecision::Allow { .. } => {}
            GuardrailDecision::Clarify { reason_code, .. } | GuardrailDecision::Deny { reason_code, .. } => {
                info!(
                    event_name = "dialogue.hours.flagged",
                    action = intent.action_key(),
                    reason_code = *reason_code,
                    "requested time not accepted as is"
                );
            }
        }
        decision
    }

    async fn book_and_render(
        &self,
        user_name: &str,
        session_id: &SessionId,
        date: NaiveDate,
        time: ClockTime,
        festival: Option<&str>,
    ) -> TurnResult {
        let mut booking_id = None;
        let outcome = match self.slots.book(user_name, date, time).await {
            Ok(booking) => {
                booking_id = Some(booking.id);
                let last = LastBooking { date, time, booking_id: booking.id };
                self.sessions
                    .update(
                        session_id,
                        SessionUpdate::context(SlotFillPatch::default().last_booking(last)).completed(),
                    )
                    .await?;
                ReplyOutcome::new(TurnStatus::Success, format!("Slot booked for {date} at {time}"))
            }
            Err(error @ SlotStoreError::Repository(_)) => return Err(error.into()),
            Err(error) => ReplyOutcome::new(TurnStatus::Failure, error.to_string()),
        }
        .at(date, time);

        let reply = self.renderer.render_booking(&outcome, festival).await;
        let mut response = TurnResponse::new(outcome.status, outcome.message.clone());
        response.booking_id = booking_id;
        response.date = Some(date);
        response.time = Some(time);
        response.nlp_response = Some(reply_or_message(reply, &outcome));
        Ok(response)
    }

    async fn handle_cancellation(
        &self,
        user_name: &str,
        session: &Session,
        extracted: ExtractedIntent,
    ) -> TurnResult {
        let mut date = extracted.date;
        if date.is_none() {
            if let Some(name) = extracted.festival.as_deref() {
                date = self.calendar.resolve(name, self.clock.today()).await;
            }
        }
        let time = extracted.time;
        let session_id = &session.session_id;

        self.sessions
            .update(session_id, SessionUpdate::context(SlotFillPatch::default().date(date).time(time)))
            .await?;

        if extracted.refers_to_recent {
            let request = CancelRequest { user_name: user_name.to_string(), ..CancelRequest::default() };
            return self.perform_cancellation(request, Some(session_id)).await;
        }
        let Some(date) = date else {
            return Ok(TurnResponse::pending(
                "Could you please let me know which date your reservation is on that you wish to cancel?",
            ));
        };
        let Some(time) = time else {
            return Ok(TurnResponse::pending(
                "Could you please let me know what time your reservation is that you wish to cancel?",
            ));
        };

        let request = CancelRequest {
            user_name: user_name.to_string(),
            date: Some(date),
            time: Some(time),
            booking_id: None,
        };
        self.perform_cancellation(request, Some(session_id)).await
    }

    /// The one cancellation routine behind both the dialogue and the direct API.
    async fn perform_cancellation(&self, request: CancelRequest, session_id: Option<&SessionId>) -> TurnResult {
        if let Some(time) = request.time {
            if let GuardrailDecision::Deny { user_message, .. } =
                self.check_hours(GuardrailIntent::Cancellation { time })
            {
                return Ok(TurnResponse::failure(user_message));
            }
        }

        let mut cancelled = None;
        let outcome = match self.slots.cancel(&request).await {
            Ok(booking) => {
                cancelled = Some((booking.date, booking.time));
                if let Some(session_id) = session_id {
                    self.sessions.update(session_id, SessionUpdate::default().completed()).await?;
                }
                ReplyOutcome::new(
                    TurnStatus::Success,
                    format!("Booking for {} cancelled on {} at {}", booking.user_name, booking.date, booking.time),
                )
                .at(booking.date, booking.time)
            }
            Err(error @ SlotStoreError::Repository(_)) => return Err(error.into()),
            Err(error) => {
                let outcome = ReplyOutcome::new(TurnStatus::Failure, error.to_string());
                match (request.date, request.time) {
                    (Some(date), Some(time)) => outcome.at(date, time),
                    _ => outcome,
                }
            }
        };

        let reply = self.renderer.render_cancellation(&outcome).await;
        let mut response = TurnResponse::new(outcome.status, outcome.message.clone());
        response.cancelled_date = cancelled.map(|(date, _)| date);
        response.cancelled_time = cancelled.map(|(_, time)| time);
        response.nlp_response = Some(reply_or_message(reply, &outcome));
        Ok(response)
    }

    async fn handle_availability(
        &self,
        text: &str,
        context: &ExtractionContext,
        extracted: ExtractedIntent,
    ) -> TurnResult {
        let mut date = extracted.date;
        let mut festival = extracted.festival;
        if date.is_none() {
            let details = self.booking_details(text, context).await;
            date = details.date;
            festival = festival.or(details.festival);
        }
        if date.is_none() {
            if let Some(name) = festival.as_deref() {
                date = self.calendar.resolve(name, context.today).await;
            }
        }
        let Some(date) = date else {
            return Ok(TurnResponse::pending(format!(
                "Which date would you like to check for available slots at {}?",
                self.venue
            )));
        };

        let availability = self.slots.list_available(Some(date), Some(date)).await?;
        let times: Vec<ClockTime> = availability.slots.iter().map(|slot| slot.time).collect();
        let reply = match self.renderer.render_availability(date, &times).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(event_name = "dialogue.render.failed", error = %error, "availability reply not rendered");
                let listed = times.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                format!("Available slots for {date}: {listed}")
            }
        };

        let mut response = TurnResponse::new(TurnStatus::Success, "Available slots retrieved");
        response.date = Some(date);
        response.available_slots = Some(availability.slots);
        response.nlp_response = Some(reply);
        Ok(response)
    }

    async fn booking_details(&self, text: &str, context: &ExtractionContext) -> ExtractedIntent {
        match self.extractor.booking_details(text, context).await {
            Ok(details) => details,
            Err(error) => {
                warn!(event_name = "dialogue.extractor.degraded", error = %error, "using keyword extraction");
                KeywordIntentExtractor::new().details(text, Intent::Booking, context)
            }
        }
    }

    async fn holiday_keyword_date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        let lower = text.to_lowercase();
        let name = HOLIDAY_KEYWORDS.iter().find(|name| lower.contains(*name))?;
        self.calendar.resolve(name, today).await
    }

    fn extraction_context(&self, session: &Session) -> ExtractionContext {
        ExtractionContext { today: self.clock.today(), last_booking: session.context.last_booking }
    }

    fn ask_booking_date(&self) -> String {
        format!(
            "Could you please specify which date you would like to make a reservation at {}?",
            self.venue
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric() && ch != '\'')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_follow_up_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    FOLLOW_UP_CUES.iter().any(|cue| lower.contains(cue)) || text.split_whitespace().count() <= FOLLOW_UP_MAX_WORDS
}

fn has_accept_cue(text: &str) -> bool {
    words(text).iter().any(|word| ACCEPT_CUES.contains(&word.as_str()))
}

fn reply_or_message(reply: Result<String, RenderError>, outcome: &ReplyOutcome) -> String {
    reply.unwrap_or_else(|error| {
        warn!(event_name = "dialogue.render.failed", error = %error, "reply not rendered");
        outcome.message.clone()
    })
}

fn failed_turn(error: ApplicationError, session_id: Option<&SessionId>) -> TurnResponse {
    let status = error.turn_status();
    let correlation = session_id.map(ToString::to_string).unwrap_or_else(|| "none".to_string());
    warn!(event_name = "dialogue.turn.failed", session_id = %correlation, error = %error, "dialogue turn failed");
    let message = error.into_interface(correlation).user_message().to_string();
    TurnResponse::new(status, message)
}
