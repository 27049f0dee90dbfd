//! Intent and slot extraction from free text.
//!
//! [`KeywordIntentExtractor`] is deterministic and works offline.
//! [`LlmIntentExtractor`] asks the completion endpoint and falls back to the
//! keyword extractor whenever the call or its JSON fails.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use tablebook_core::calendar::{find_festival, fixed_holiday, resolve_phrase};
use tablebook_core::domain::dialogue::Intent;
use tablebook_core::domain::session::LastBooking;
use tablebook_core::domain::time::ClockTime;
use tablebook_core::timeparse::{parse_bare_hour, parse_times};

use crate::llm::{json_object_span, CompletionRequest, LlmClient, LlmError};
use crate::prompts;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("extractor reply was not the expected json: {0}")]
    Malformed(String),
}

/// What the extractor may rely on besides the utterance itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionContext {
    pub today: NaiveDate,
    pub last_booking: Option<LastBooking>,
}

impl ExtractionContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today, last_booking: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedIntent {
    pub intent: Intent,
    pub date: Option<NaiveDate>,
    pub time: Option<ClockTime>,
    /// Two or more candidate times; `time` is `None` when this is set.
    pub time_options: Vec<ClockTime>,
    pub festival: Option<String>,
    pub refers_to_recent: bool,
}

impl ExtractedIntent {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            date: None,
            time: None,
            time_options: Vec::new(),
            festival: None,
            refers_to_recent: false,
        }
    }

    pub fn is_time_ambiguous(&self) -> bool {
        self.time.is_none() && self.time_options.len() > 1
    }

    fn with_times(mut self, times: Vec<ClockTime>) -> Self {
        match times.len() {
            0 => {}
            1 => self.time = times.first().copied(),
            _ => self.time_options = times,
        }
        self
    }
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Intent plus whatever slots the utterance carries for that intent.
    async fn extract(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError>;

    /// Date, time and festival read as if the utterance were a booking request.
    async fn booking_details(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError>;

    /// Which of `options` a clarification reply picks, if any.
    async fn clarify_time(
        &self,
        reply: &str,
        options: &[ClockTime],
    ) -> Result<Option<ClockTime>, ExtractorError>;
}

const CANCELLATION_CUES: &[&str] = &["cancel", "call off", "delete my", "remove my", "drop my"];
const AVAILABILITY_CUES: &[&str] = &[
    "available",
    "availability",
    "free slot",
    "open slot",
    "what slots",
    "which slots",
    "any slots",
    "what times",
    "which times",
    "free tables",
];
const BOOKING_CUES: &[&str] =
    &["book", "reserve", "reservation", "a table", "table for", "dine", "dinner", "lunch", "seat us"];

#[derive(Clone, Debug, Default)]
pub struct KeywordIntentExtractor;

impl KeywordIntentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> Intent {
        classify_intent(&normalize_text(text))
    }

    pub fn details(&self, text: &str, intent: Intent, context: &ExtractionContext) -> ExtractedIntent {
        let normalized = normalize_text(text);
        let mut extracted = ExtractedIntent::new(intent).with_times(parse_times(&normalized));
        extracted.date = resolve_phrase(&normalized, context.today);
        extracted.festival = extract_festival(&normalized, context.today.year());
        extracted.refers_to_recent = intent == Intent::Cancellation
            && extracted.date.is_none()
            && extracted.time.is_none()
            && extracted.time_options.is_empty()
            && extracted.festival.is_none();
        extracted
    }

    pub fn pick_option(&self, reply: &str, options: &[ClockTime]) -> Option<ClockTime> {
        pick_time_option(&normalize_text(reply), options)
    }
}

#[async_trait]
impl IntentExtractor for KeywordIntentExtractor {
    async fn extract(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError> {
        let intent = self.classify(text);
        Ok(self.details(text, intent, context))
    }

    async fn booking_details(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError> {
        Ok(self.details(text, Intent::Booking, context))
    }

    async fn clarify_time(
        &self,
        reply: &str,
        options: &[ClockTime],
    ) -> Result<Option<ClockTime>, ExtractorError> {
        Ok(self.pick_option(reply, options))
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

fn contains_any(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| text.contains(cue))
}

fn classify_intent(normalized: &str) -> Intent {
    if contains_any(normalized, CANCELLATION_CUES) {
        Intent::Cancellation
    } else if contains_any(normalized, AVAILABILITY_CUES) {
        Intent::Availability
    } else if contains_any(normalized, BOOKING_CUES) {
        Intent::Booking
    } else {
        Intent::Unknown
    }
}

fn extract_festival(normalized: &str, year: i32) -> Option<String> {
    fixed_holiday(normalized, year)
        .map(|(name, _)| name)
        .or_else(|| find_festival(normalized))
        .map(str::to_string)
}

fn pick_time_option(normalized: &str, options: &[ClockTime]) -> Option<ClockTime> {
    if let Some(time) = parse_times(normalized).into_iter().next() {
        return Some(time);
    }
    if normalized.contains("first") || normalized.contains("earlier") || normalized.contains("former") {
        return if normalized.contains("first") {
            options.first().copied()
        } else {
            options.iter().min().copied()
        };
    }
    if normalized.contains("second") || normalized.contains("later") || normalized.contains("latter") {
        return if normalized.contains("second") {
            options.get(1).copied()
        } else {
            options.iter().max().copied()
        };
    }
    // "the 8" picks 20:00 when that is one of the options
    let hour = parse_bare_hour(normalized)?;
    options
        .iter()
        .find(|option| option.hour() == hour.hour() || option.hour() == hour.hour() + 12)
        .copied()
}

#[derive(Debug, Deserialize)]
struct IntentReply {
    #[serde(default)]
    intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsReply {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    time_options: Option<Vec<String>>,
    #[serde(default)]
    festival_referenced: Option<String>,
    #[serde(default)]
    is_recent_reference: Option<bool>,
}

impl DetailsReply {
    fn into_extracted(self, intent: Intent) -> ExtractedIntent {
        let mut extracted = ExtractedIntent::new(intent);
        extracted.date = self
            .date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());
        extracted.time = self.time.as_deref().and_then(|raw| ClockTime::from_str(raw.trim()).ok());
        if extracted.time.is_none() {
            let options: Vec<ClockTime> = self
                .time_options
                .unwrap_or_default()
                .into_iter()
                .filter_map(|raw| ClockTime::from_str(raw.trim()).ok())
                .collect();
            extracted = extracted.with_times(options);
        }
        extracted.festival = self
            .festival_referenced
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("null"));
        extracted.refers_to_recent = intent == Intent::Cancellation && self.is_recent_reference.unwrap_or(false);
        extracted
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T, ExtractorError> {
    let span = json_object_span(content).ok_or_else(|| ExtractorError::Malformed(content.to_string()))?;
    serde_json::from_str(span).map_err(|error| ExtractorError::Malformed(error.to_string()))
}

pub struct LlmIntentExtractor {
    llm: Arc<dyn LlmClient>,
    venue: String,
    fallback: KeywordIntentExtractor,
}

impl LlmIntentExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, venue: impl Into<String>) -> Self {
        Self { llm, venue: venue.into(), fallback: KeywordIntentExtractor::new() }
    }

    async fn classify(&self, text: &str, context: &ExtractionContext) -> Result<Intent, ExtractorError> {
        let request = CompletionRequest::new(prompts::intent_prompt(&self.venue, context.last_booking.as_ref()))
            .with_user(text)
            .with_temperature(0.3)
            .with_max_tokens(100);
        let reply: IntentReply = parse_json(&self.llm.complete(&request).await?)?;
        Ok(reply.intent.as_deref().map_or(Intent::Unknown, |raw| {
            Intent::from_str(raw).unwrap_or(Intent::Unknown)
        }))
    }

    async fn try_extract(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError> {
        let intent = self.classify(text, context).await?;
        match intent {
            Intent::Booking | Intent::Cancellation => self.details(text, intent, context).await,
            Intent::Availability | Intent::Unknown => Ok(ExtractedIntent::new(intent)),
        }
    }

    async fn details(
        &self,
        text: &str,
        intent: Intent,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError> {
        let system = if intent == Intent::Cancellation {
            prompts::cancellation_details_prompt(&self.venue, context.today, context.last_booking.as_ref())
        } else {
            prompts::booking_details_prompt(&self.venue, context.today, context.last_booking.as_ref())
        };
        let request = CompletionRequest::new(system).with_user(text);
        let reply: DetailsReply = parse_json(&self.llm.complete(&request).await?)?;
        let extracted = reply.into_extracted(intent);
        debug!(
            event_name = "extractor.llm.details",
            intent = %intent,
            date = ?extracted.date,
            time = ?extracted.time,
            festival = ?extracted.festival,
            "llm extracted request details"
        );
        Ok(extracted)
    }
}

#[async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn extract(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError> {
        match self.try_extract(text, context).await {
            Ok(extracted) => Ok(extracted),
            Err(error) => {
                warn!(event_name = "extractor.llm.degraded", error = %error, "falling back to keyword extraction");
                self.fallback.extract(text, context).await
            }
        }
    }

    async fn booking_details(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedIntent, ExtractorError> {
        match self.details(text, Intent::Booking, context).await {
            Ok(extracted) => Ok(extracted),
            Err(error) => {
                warn!(event_name = "extractor.llm.degraded", error = %error, "falling back to keyword extraction");
                self.fallback.booking_details(text, context).await
            }
        }
    }

    async fn clarify_time(
        &self,
        reply: &str,
        options: &[ClockTime],
    ) -> Result<Option<ClockTime>, ExtractorError> {
        let request = CompletionRequest::new(prompts::time_clarification_prompt(&self.venue, options))
            .with_user(reply)
            .with_max_tokens(100);
        match self.llm.complete(&request).await {
            Ok(content) if content.trim().eq_ignore_ascii_case("unknown") => Ok(None),
            Ok(content) => match ClockTime::from_str(content.trim().trim_matches('"')) {
                Ok(time) => Ok(Some(time)),
                Err(_) => self.fallback.clarify_time(reply, options).await,
            },
            Err(error) => {
                warn!(event_name = "extractor.llm.degraded", error = %error, "falling back to keyword clarification");
                self.fallback.clarify_time(reply, options).await
            }
        }
    }
}
