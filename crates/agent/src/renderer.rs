//! Natural-language replies for booking, cancellation and availability results.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::warn;

use tablebook_core::domain::dialogue::TurnStatus;
use tablebook_core::domain::time::ClockTime;

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::prompts;

const BOOKING_TEMPLATE: &str = "booking.txt";
const CANCELLATION_TEMPLATE: &str = "cancellation.txt";
const AVAILABILITY_TEMPLATE: &str = "availability.txt";

/// Dates in replies read like "Friday, March 08".
pub const REPLY_DATE_FORMAT: &str = "%A, %B %d";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("reply template failed: {0}")]
    Template(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl From<tera::Error> for RenderError {
    fn from(error: tera::Error) -> Self {
        Self::Template(error.to_string())
    }
}

/// The store-level result a reply is written about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyOutcome {
    pub status: TurnStatus,
    pub message: String,
    pub date: Option<NaiveDate>,
    pub time: Option<ClockTime>,
}

impl ReplyOutcome {
    pub fn new(status: TurnStatus, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), date: None, time: None }
    }

    pub fn at(mut self, date: NaiveDate, time: ClockTime) -> Self {
        self.date = Some(date);
        self.time = Some(time);
        self
    }

    fn display_date(&self) -> String {
        self.date.map(|date| date.format(REPLY_DATE_FORMAT).to_string()).unwrap_or_default()
    }

    fn display_time(&self) -> String {
        self.time.map(|time| time.to_string()).unwrap_or_default()
    }
}

#[async_trait]
pub trait ReplyRenderer: Send + Sync {
    async fn render_booking(
        &self,
        outcome: &ReplyOutcome,
        festival: Option<&str>,
    ) -> Result<String, RenderError>;

    async fn render_cancellation(&self, outcome: &ReplyOutcome) -> Result<String, RenderError>;

    async fn render_availability(
        &self,
        date: NaiveDate,
        slots: &[ClockTime],
    ) -> Result<String, RenderError>;
}

/// Deterministic replies from the built-in tera templates.
pub struct TemplateReplyRenderer {
    tera: Tera,
    venue: String,
}

impl TemplateReplyRenderer {
    pub fn new(venue: impl Into<String>) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (BOOKING_TEMPLATE, include_str!("../templates/booking.txt.tera")),
            (CANCELLATION_TEMPLATE, include_str!("../templates/cancellation.txt.tera")),
            (AVAILABILITY_TEMPLATE, include_str!("../templates/availability.txt.tera")),
        ])?;
        Ok(Self { tera, venue: venue.into() })
    }

    fn outcome_context(&self, outcome: &ReplyOutcome) -> Context {
        let mut context = Context::new();
        context.insert("venue", &self.venue);
        context.insert("status", outcome.status.as_str());
        context.insert("message", &outcome.message);
        context.insert("date", &outcome.display_date());
        context.insert("time", &outcome.display_time());
        context
    }

    pub fn booking(&self, outcome: &ReplyOutcome, festival: Option<&str>) -> Result<String, RenderError> {
        let mut context = self.outcome_context(outcome);
        context.insert("festival", &festival);
        Ok(self.tera.render(BOOKING_TEMPLATE, &context)?)
    }

    pub fn cancellation(&self, outcome: &ReplyOutcome) -> Result<String, RenderError> {
        Ok(self.tera.render(CANCELLATION_TEMPLATE, &self.outcome_context(outcome))?)
    }

    pub fn availability(&self, date: NaiveDate, slots: &[ClockTime]) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("venue", &self.venue);
        context.insert("date", &date.format(REPLY_DATE_FORMAT).to_string());
        context.insert("slots", &sorted_labels(slots));
        Ok(self.tera.render(AVAILABILITY_TEMPLATE, &context)?)
    }
}

#[async_trait]
impl ReplyRenderer for TemplateReplyRenderer {
    async fn render_booking(
        &self,
        outcome: &ReplyOutcome,
        festival: Option<&str>,
    ) -> Result<String, RenderError> {
        self.booking(outcome, festival)
    }

    async fn render_cancellation(&self, outcome: &ReplyOutcome) -> Result<String, RenderError> {
        self.cancellation(outcome)
    }

    async fn render_availability(
        &self,
        date: NaiveDate,
        slots: &[ClockTime],
    ) -> Result<String, RenderError> {
        self.availability(date, slots)
    }
}

fn sorted_labels(slots: &[ClockTime]) -> Vec<String> {
    let mut sorted = slots.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted.iter().map(ToString::to_string).collect()
}

/// Asks the completion endpoint for a friendly reply; any failure falls back
/// to the templates.
pub struct LlmReplyRenderer {
    llm: Arc<dyn LlmClient>,
    venue: String,
    fallback: TemplateReplyRenderer,
}

impl LlmReplyRenderer {
    pub fn new(llm: Arc<dyn LlmClient>, venue: impl Into<String>) -> Result<Self, RenderError> {
        let venue = venue.into();
        let fallback = TemplateReplyRenderer::new(venue.clone())?;
        Ok(Self { llm, venue, fallback })
    }

    async fn complete(&self, prompt: String) -> Result<String, RenderError> {
        let request = CompletionRequest::new(prompt).with_temperature(0.7).with_max_tokens(150);
        Ok(self.llm.complete(&request).await?)
    }
}

fn result_json(outcome: &ReplyOutcome) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|_| outcome.message.clone())
}

#[async_trait]
impl ReplyRenderer for LlmReplyRenderer {
    async fn render_booking(
        &self,
        outcome: &ReplyOutcome,
        festival: Option<&str>,
    ) -> Result<String, RenderError> {
        let occasion = festival.map(|name| format!(" for {name}")).unwrap_or_default();
        let prompt = prompts::booking_reply_prompt(
            &self.venue,
            &result_json(outcome),
            &occasion,
            &outcome.display_date(),
            &outcome.display_time(),
            outcome.status.as_str(),
        );
        match self.complete(prompt).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                warn!(event_name = "renderer.llm.degraded", reply = "booking", error = %error, "using template reply");
                self.fallback.booking(outcome, festival)
            }
        }
    }

    async fn render_cancellation(&self, outcome: &ReplyOutcome) -> Result<String, RenderError> {
        let prompt = prompts::cancellation_reply_prompt(
            &self.venue,
            &result_json(outcome),
            &outcome.display_date(),
            &outcome.display_time(),
            outcome.status.as_str(),
        );
        match self.complete(prompt).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                warn!(event_name = "renderer.llm.degraded", reply = "cancellation", error = %error, "using template reply");
                self.fallback.cancellation(outcome)
            }
        }
    }

    async fn render_availability(
        &self,
        date: NaiveDate,
        slots: &[ClockTime],
    ) -> Result<String, RenderError> {
        let labels = sorted_labels(slots);
        let times = if labels.is_empty() { "None".to_string() } else { labels.join(", ") };
        let prompt = prompts::availability_reply_prompt(
            &self.venue,
            &date.format(REPLY_DATE_FORMAT).to_string(),
            &times,
            labels.len(),
        );
        match self.complete(prompt).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                warn!(event_name = "renderer.llm.degraded", reply = "availability", error = %error, "using template reply");
                self.fallback.availability(date, slots)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use tablebook_core::domain::dialogue::TurnStatus;
    use tablebook_core::domain::time::ClockTime;

    use super::{LlmReplyRenderer, ReplyOutcome, ReplyRenderer, TemplateReplyRenderer};
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::LlmError;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 8).expect("date")
    }

    fn time(raw: &str) -> ClockTime {
        raw.parse().expect("time")
    }

    #[test]
    fn booking_template_mentions_festival_only_on_success() {
        let renderer = TemplateReplyRenderer::new("Paradise Grill").expect("templates");
        let booked = ReplyOutcome::new(TurnStatus::Success, "Slot booked for 2024-03-08 at 19:00")
            .at(date(), time("19:00"));

        assert_eq!(
            renderer.booking(&booked, Some("Holi")).expect("render"),
            "Booking success. Slot booked for 2024-03-08 at 19:00 Enjoy your Holi celebration at Paradise Grill!"
        );

        let taken = ReplyOutcome::new(TurnStatus::Failure, "Slot already booked").at(date(), time("19:00"));
        assert_eq!(
            renderer.booking(&taken, Some("Holi")).expect("render"),
            "Booking failure. Slot already booked"
        );
    }

    #[test]
    fn availability_template_sorts_times_and_formats_the_date() {
        let renderer = TemplateReplyRenderer::new("Paradise Grill").expect("templates");

        assert_eq!(
            renderer.availability(date(), &[time("21:00"), time("09:00")]).expect("render"),
            "Available slots for Friday, March 08: 09:00, 21:00"
        );
        assert_eq!(
            renderer.availability(date(), &[]).expect("render"),
            "Sorry, there are no available slots at Paradise Grill for Friday, March 08. Please try another date."
        );
    }

    #[tokio::test]
    async fn llm_renderer_prefers_the_model_and_degrades_to_templates() {
        let llm = Arc::new(ScriptedLlm::with_replies([
            Ok("Your cancellation is confirmed. We hope to see you soon!".to_string()),
            Err(LlmError::Status { status: 503, body: "busy".to_string() }),
        ]));
        let renderer = LlmReplyRenderer::new(llm.clone(), "Paradise Grill").expect("renderer");
        let outcome = ReplyOutcome::new(TurnStatus::Success, "Booking for asha cancelled on 2024-03-08 at 19:00")
            .at(date(), time("19:00"));

        assert_eq!(
            renderer.render_cancellation(&outcome).await.expect("render"),
            "Your cancellation is confirmed. We hope to see you soon!"
        );
        assert_eq!(
            renderer.render_cancellation(&outcome).await.expect("render"),
            "Cancellation success. Booking for asha cancelled on 2024-03-08 at 19:00"
        );

        let requests = llm.requests.lock().expect("lock");
        assert!(requests[0].system.contains("Cancellation on Friday, March 08 at 19:00"));
        assert!(requests[0].system.contains("\"status\":\"success\""));
    }
}
