use std::path::PathBuf;
use std::sync::Arc;

use tablebook_agent::{
    CalendarificClient, ChatCompletionsClient, DialogueOrchestrator, IntentExtractor, KeywordIntentExtractor,
    LlmClient, LlmDateInference, LlmIntentExtractor, LlmReplyRenderer, ReplyRenderer, TemplateReplyRenderer,
};
use tablebook_core::calendar::{CalendarResolver, DateInference, HolidayLookup};
use tablebook_core::clock::{Clock, SystemClock};
use tablebook_core::config::{AppConfig, ConfigError, LoadOptions};
use tablebook_db::{
    migrate_bookings_file, CsvBookingTable, JsonSessionRepository, RepositoryError, SessionStore, SlotStore,
};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub bookings_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bookings migration failed: {0}")]
    Migration(#[source] RepositoryError),
    #[error("bookings storage could not be prepared: {0}")]
    Storage(#[source] RepositoryError),
    #[error("integration setup failed: {0}")]
    Integration(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Legacy rows must be upgraded before the store reads the file.
    let bookings_path = config.storage.bookings_path();
    let report =
        migrate_bookings_file(&bookings_path, clock.now()).await.map_err(BootstrapError::Migration)?;
    if report.changed() {
        info!(
            event_name = "system.bootstrap.bookings_migrated",
            correlation_id = "bootstrap",
            path = %bookings_path.display(),
            rows = report.rows,
            dates_filled = report.dates_filled,
            ids_assigned = report.ids_assigned,
            "bookings file upgraded to the current schema"
        );
    }
    if !report.unresolved_rows.is_empty() {
        warn!(
            event_name = "system.bootstrap.bookings_unresolved",
            correlation_id = "bootstrap",
            rows = ?report.unresolved_rows,
            "bookings rows without a usable date"
        );
    }

    let table = CsvBookingTable::new(bookings_path.clone());
    table.ensure_exists().await.map_err(BootstrapError::Storage)?;
    let slots = Arc::new(SlotStore::new(Arc::new(table), clock.clone()));
    let sessions = Arc::new(SessionStore::new(
        Arc::new(JsonSessionRepository::new(config.storage.sessions_path())),
        clock.clone(),
    ));

    let llm: Option<Arc<dyn LlmClient>> = ChatCompletionsClient::from_config(&config.llm)
        .map_err(|error| BootstrapError::Integration(error.to_string()))?
        .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
    let lookup: Option<Arc<dyn HolidayLookup>> = CalendarificClient::from_config(&config.calendar)
        .map_err(|error| BootstrapError::Integration(error.to_string()))?
        .map(|client| Arc::new(client) as Arc<dyn HolidayLookup>);
    let inference: Option<Arc<dyn DateInference>> =
        llm.clone().map(|llm| Arc::new(LlmDateInference::new(llm)) as Arc<dyn DateInference>);
    let calendar = Arc::new(
        CalendarResolver::with_cache_file(config.storage.holiday_cache_path(), lookup, inference).await,
    );

    let venue = config.venue.name.clone();
    let (extractor, renderer): (Arc<dyn IntentExtractor>, Arc<dyn ReplyRenderer>) = match &llm {
        Some(llm) => (
            Arc::new(LlmIntentExtractor::new(llm.clone(), venue.clone())),
            Arc::new(
                LlmReplyRenderer::new(llm.clone(), venue.clone())
                    .map_err(|error| BootstrapError::Integration(error.to_string()))?,
            ),
        ),
        None => (
            Arc::new(KeywordIntentExtractor::new()),
            Arc::new(
                TemplateReplyRenderer::new(venue.clone())
                    .map_err(|error| BootstrapError::Integration(error.to_string()))?,
            ),
        ),
    };
    info!(
        event_name = "system.bootstrap.dialogue_ready",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        holiday_lookup = calendar.has_lookup(),
        "dialogue orchestrator assembled"
    );

    let orchestrator =
        Arc::new(DialogueOrchestrator::new(slots, sessions, calendar, extractor, renderer, clock, venue));

    Ok(Application { config, orchestrator, bookings_path })
}
