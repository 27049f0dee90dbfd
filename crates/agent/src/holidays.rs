//! External date sources behind the calendar resolver: the Calendarific
//! holiday API and LLM date inference.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use tablebook_core::calendar::{CalendarError, DateInference, HolidayLookup};
use tablebook_core::config::CalendarConfig;

use crate::llm::{CompletionRequest, LlmClient};
use crate::prompts;

#[derive(Debug, Deserialize)]
struct HolidayEnvelope {
    meta: HolidayMeta,
    #[serde(default)]
    response: Value,
}

#[derive(Debug, Deserialize)]
struct HolidayMeta {
    code: u16,
    #[serde(default)]
    error_detail: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HolidayList {
    #[serde(default)]
    holidays: Vec<HolidayEntry>,
}

#[derive(Debug, Deserialize)]
struct HolidayEntry {
    name: String,
    date: HolidayDate,
}

#[derive(Debug, Deserialize)]
struct HolidayDate {
    iso: String,
}

/// Calendarific `GET /holidays?country=..&year=..` for one country.
pub struct CalendarificClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    country_code: String,
}

impl CalendarificClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        country_code: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CalendarError::Unavailable(format!("failed to build http client: {error}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            country_code: country_code.into(),
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &CalendarConfig) -> Result<Option<Self>, CalendarError> {
        if !config.lookup_enabled() {
            return Ok(None);
        }
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        Self::new(
            &config.base_url,
            api_key,
            config.country_code.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }
}

#[async_trait]
impl HolidayLookup for CalendarificClient {
    async fn holidays_for_year(&self, year: i32) -> Result<BTreeMap<String, NaiveDate>, CalendarError> {
        let url = format!("{}/holidays", self.base_url);
        let year_param = year.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.expose_secret()),
                ("country", self.country_code.as_str()),
                ("year", year_param.as_str()),
            ])
            .send()
            .await
            .map_err(|error| CalendarError::Unavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(event_name = "calendar.lookup.rejected", status = %status, year, "holiday lookup rejected");
            return Err(CalendarError::Unavailable(format!("holiday lookup returned {status}")));
        }

        let envelope: HolidayEnvelope =
            response.json().await.map_err(|error| CalendarError::Malformed(error.to_string()))?;
        let holidays = holidays_from_envelope(envelope)?;
        debug!(
            event_name = "calendar.lookup.fetched",
            year,
            country = %self.country_code,
            count = holidays.len(),
            "holidays fetched"
        );
        Ok(holidays)
    }
}

fn holidays_from_envelope(envelope: HolidayEnvelope) -> Result<BTreeMap<String, NaiveDate>, CalendarError> {
    if envelope.meta.code != 200 {
        let detail = envelope
            .meta
            .error_detail
            .or(envelope.meta.error_type)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(CalendarError::Unavailable(format!("code {}: {detail}", envelope.meta.code)));
    }

    let list: HolidayList = serde_json::from_value(envelope.response)
        .map_err(|error| CalendarError::Malformed(error.to_string()))?;
    let mut holidays = BTreeMap::new();
    for entry in list.holidays {
        // iso may carry a time part: 2024-10-31T00:00:00+05:30
        let Some(date) = entry.date.iso.get(..10).and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let name = entry.name.trim().to_lowercase();
        if !name.is_empty() {
            holidays.insert(name, date);
        }
    }
    Ok(holidays)
}

/// Asks the completion endpoint for the date of a named occasion.
pub struct LlmDateInference {
    llm: Arc<dyn LlmClient>,
}

impl LlmDateInference {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl DateInference for LlmDateInference {
    async fn infer_date(&self, occasion: &str, year: i32) -> Result<Option<NaiveDate>, CalendarError> {
        let request = CompletionRequest::new(prompts::holiday_date_prompt(year))
            .with_user(prompts::holiday_date_question(occasion, year))
            .with_max_tokens(20);
        let content = self
            .llm
            .complete(&request)
            .await
            .map_err(|error| CalendarError::Unavailable(error.to_string()))?;
        Ok(parse_inferred_date(&content))
    }
}

fn parse_inferred_date(content: &str) -> Option<NaiveDate> {
    let trimmed = content.trim().trim_matches('"');
    if trimmed.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}
