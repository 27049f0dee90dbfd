//! Date resolution for booking requests: relative phrases, weekday names,
//! fixed holidays, and festivals whose dates move every year.

pub mod holidays;
pub mod phrases;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use holidays::{find_festival, fixed_holiday};
pub use phrases::{next_weekday, parse_weekday, resolve_phrase, weekday_name};

/// year -> lowercase holiday name -> date
pub type HolidayCache = BTreeMap<i32, BTreeMap<String, NaiveDate>>;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("holiday lookup unavailable: {0}")]
    Unavailable(String),
    #[error("holiday lookup returned malformed data: {0}")]
    Malformed(String),
    #[error("holiday cache `{path}` could not be read or written: {message}")]
    Cache { path: PathBuf, message: String },
}

/// External holiday calendar keyed by year (country is fixed per instance).
#[async_trait]
pub trait HolidayLookup: Send + Sync {
    async fn holidays_for_year(&self, year: i32) -> Result<BTreeMap<String, NaiveDate>, CalendarError>;
}

/// Free-text date inference for a named occasion, e.g. an LLM prompt.
#[async_trait]
pub trait DateInference: Send + Sync {
    async fn infer_date(&self, occasion: &str, year: i32) -> Result<Option<NaiveDate>, CalendarError>;
}

/// Owns the per-year holiday cache. Construct once and share behind an `Arc`.
pub struct CalendarResolver {
    cache: RwLock<HolidayCache>,
    cache_path: Option<PathBuf>,
    lookup: Option<Arc<dyn HolidayLookup>>,
    inference: Option<Arc<dyn DateInference>>,
}

impl CalendarResolver {
    pub fn new(
        lookup: Option<Arc<dyn HolidayLookup>>,
        inference: Option<Arc<dyn DateInference>>,
    ) -> Self {
        Self { cache: RwLock::new(HolidayCache::new()), cache_path: None, lookup, inference }
    }

    /// Resolver backed by a JSON cache file. A missing file starts empty; an
    /// unreadable one is logged and ignored so resolution still works.
    pub async fn with_cache_file(
        path: impl Into<PathBuf>,
        lookup: Option<Arc<dyn HolidayLookup>>,
        inference: Option<Arc<dyn DateInference>>,
    ) -> Self {
        let path = path.into();
        let cache = match load_cache(&path).await {
            Ok(cache) => cache,
            Err(error) => {
                warn!(
                    event_name = "calendar.cache.load_failed",
                    path = %path.display(),
                    error = %error,
                    "starting with an empty holiday cache"
                );
                HolidayCache::new()
            }
        };
        Self { cache: RwLock::new(cache), cache_path: Some(path), lookup, inference }
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// Resolve a date reference relative to `as_of`. `None` means the caller
    /// has to ask the user.
    pub async fn resolve(&self, reference: &str, as_of: NaiveDate) -> Option<NaiveDate> {
        let normalized = holidays::apply_reference_aliases(reference);
        if normalized.is_empty() {
            return None;
        }
        if let Some((_, date)) = fixed_holiday(&normalized, as_of.year()) {
            return Some(date);
        }
        if let Some(date) = resolve_phrase(&normalized, as_of) {
            return Some(date);
        }
        self.festival_date(&normalized, as_of.year()).await
    }

    /// Festival lookup order: cache, lookup service (fills the cache),
    /// date inference, then the built-in table.
    pub async fn festival_date(&self, name: &str, year: i32) -> Option<NaiveDate> {
        let name = holidays::apply_reference_aliases(name);

        if let Some(date) = self.cached(&name, year).await {
            return Some(date);
        }

        let year_cached = self.cache.read().await.contains_key(&year);
        if !year_cached && self.lookup.is_some() {
            match self.refresh_year(year).await {
                Ok(count) => debug!(event_name = "calendar.lookup.filled", year, count, "holiday cache filled"),
                Err(error) => warn!(
                    event_name = "calendar.lookup.failed",
                    year,
                    error = %error,
                    "holiday lookup failed, trying inference"
                ),
            }
            if let Some(date) = self.cached(&name, year).await {
                return Some(date);
            }
        }

        if let Some(inference) = &self.inference {
            match inference.infer_date(&name, year).await {
                Ok(Some(date)) => return Some(date),
                Ok(None) => {}
                Err(error) => warn!(
                    event_name = "calendar.inference.failed",
                    festival = %name,
                    year,
                    error = %error,
                    "date inference failed"
                ),
            }
        }

        holidays::builtin_festival(&name, year)
    }

    /// Fetch one year from the lookup service, replace that year in the cache
    /// and persist the whole cache. Returns the number of names stored.
    pub async fn refresh_year(&self, year: i32) -> Result<usize, CalendarError> {
        let lookup = self
            .lookup
            .as_ref()
            .ok_or_else(|| CalendarError::Unavailable("no holiday lookup configured".to_string()))?;
        let entries = holidays::normalize_lookup_names(lookup.holidays_for_year(year).await?);
        let count = entries.len();

        let snapshot = {
            let mut cache = self.cache.write().await;
            cache.insert(year, entries);
            cache.clone()
        };

        if let Some(path) = &self.cache_path {
            save_cache(path, &snapshot).await?;
        }
        info!(event_name = "calendar.cache.refreshed", year, count, "holiday cache refreshed");
        Ok(count)
    }

    pub async fn cached_year(&self, year: i32) -> Option<BTreeMap<String, NaiveDate>> {
        self.cache.read().await.get(&year).cloned()
    }

    async fn cached(&self, name: &str, year: i32) -> Option<NaiveDate> {
        let cache = self.cache.read().await;
        let entries = cache.get(&year)?;
        if let Some(date) = entries.get(name) {
            return Some(*date);
        }
        entries
            .iter()
            .find(|(key, _)| key.contains(name) || (key.len() >= 4 && name.contains(key.as_str())))
            .map(|(_, date)| *date)
    }
}

async fn load_cache(path: &Path) -> Result<HolidayCache, CalendarError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).map_err(|error| CalendarError::Cache {
            path: path.to_path_buf(),
            message: error.to_string(),
        }),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(HolidayCache::new()),
        Err(error) => {
            Err(CalendarError::Cache { path: path.to_path_buf(), message: error.to_string() })
        }
    }
}

async fn save_cache(path: &Path, cache: &HolidayCache) -> Result<(), CalendarError> {
    let cache_error =
        |message: String| CalendarError::Cache { path: path.to_path_buf(), message };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|error| cache_error(error.to_string()))?;
    }
    let json = serde_json::to_string_pretty(cache).map_err(|error| cache_error(error.to_string()))?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, json).await.map_err(|error| cache_error(error.to_string()))?;
    tokio::fs::rename(&staging, path).await.map_err(|error| cache_error(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::{CalendarError, CalendarResolver, DateInference, HolidayLookup};

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl HolidayLookup for CountingLookup {
        async fn holidays_for_year(
            &self,
            year: i32,
        ) -> Result<BTreeMap<String, NaiveDate>, CalendarError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CalendarError::Unavailable("offline".to_string()));
            }
            let mut entries = BTreeMap::new();
            entries.insert(
                "Diwali/Deepavali".to_string(),
                NaiveDate::from_ymd_opt(year, 10, 31).expect("date"),
            );
            entries.insert("Guru Nanak Jayanti".to_string(), NaiveDate::from_ymd_opt(year, 11, 15).expect("date"));
            Ok(entries)
        }
    }

    struct FixedInference(Option<NaiveDate>);

    #[async_trait]
    impl DateInference for FixedInference {
        async fn infer_date(
            &self,
            _occasion: &str,
            _year: i32,
        ) -> Result<Option<NaiveDate>, CalendarError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn relative_and_fixed_references_need_no_services() {
        let resolver = CalendarResolver::new(None, None);
        let as_of = date("2024-03-01");

        assert_eq!(resolver.resolve("tomorrow", as_of).await, Some(date("2024-03-02")));
        assert_eq!(resolver.resolve("next Monday", as_of).await, Some(date("2024-03-04")));
        assert_eq!(resolver.resolve("next Friday", as_of).await, Some(date("2024-03-08")));
        assert_eq!(resolver.resolve("Christmas Eve", as_of).await, Some(date("2024-12-24")));
        assert_eq!(resolver.resolve("", as_of).await, None);
    }

    #[tokio::test]
    async fn festival_lookup_is_cached_per_year() {
        let lookup = Arc::new(CountingLookup::default());
        let resolver = CalendarResolver::new(Some(lookup.clone()), None);
        let as_of = date("2030-01-10");

        assert_eq!(resolver.resolve("deepavali", as_of).await, Some(date("2030-10-31")));
        assert_eq!(resolver.resolve("guru nanak jayanti", as_of).await, Some(date("2030-11-15")));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_to_inference_then_table() {
        let lookup = Arc::new(CountingLookup { fail: true, ..CountingLookup::default() });
        let inferred = CalendarResolver::new(
            Some(lookup.clone()),
            Some(Arc::new(FixedInference(Some(date("2030-03-20"))))),
        );
        assert_eq!(inferred.festival_date("holi", 2030).await, Some(date("2030-03-20")));

        let table_only = CalendarResolver::new(Some(lookup), Some(Arc::new(FixedInference(None))));
        assert_eq!(table_only.festival_date("holi", 2024).await, Some(date("2024-03-25")));
        assert_eq!(table_only.festival_date("onam", 2031).await, None);
    }

    #[tokio::test]
    async fn cache_file_survives_a_new_resolver() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cache").join("holiday_cache.json");

        let lookup = Arc::new(CountingLookup::default());
        let first = CalendarResolver::with_cache_file(&path, Some(lookup.clone()), None).await;
        assert_eq!(first.refresh_year(2031).await.expect("refresh"), 3);
        assert!(path.exists());

        let offline = CalendarResolver::with_cache_file(&path, None, None).await;
        assert_eq!(offline.festival_date("diwali", 2031).await, Some(date("2031-10-31")));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_cache_file_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("holiday_cache.json");
        std::fs::write(&path, "not json").expect("write");

        let resolver = CalendarResolver::with_cache_file(&path, None, None).await;
        assert!(resolver.cached_year(2024).await.is_none());
        assert_eq!(resolver.festival_date("diwali", 2024).await, Some(date("2024-11-01")));
    }
}
