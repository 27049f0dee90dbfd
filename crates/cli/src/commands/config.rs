use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tablebook_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            &field,
            options,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new("venue.name", "TABLEBOOK_VENUE_NAME", config.venue.name.clone()),
        Field::new(
            "storage.data_dir",
            "TABLEBOOK_STORAGE_DATA_DIR",
            config.storage.data_dir.display().to_string(),
        ),
        Field::new(
            "storage.bookings_file",
            "TABLEBOOK_STORAGE_BOOKINGS_FILE",
            config.storage.bookings_path().display().to_string(),
        ),
        Field::new(
            "storage.sessions_dir",
            "TABLEBOOK_STORAGE_SESSIONS_DIR",
            config.storage.sessions_path().display().to_string(),
        ),
        Field::new(
            "storage.holiday_cache_file",
            "TABLEBOOK_STORAGE_HOLIDAY_CACHE_FILE",
            config.storage.holiday_cache_path().display().to_string(),
        ),
        Field::new("llm.provider", "TABLEBOOK_LLM_PROVIDER", config.llm.provider.as_str()),
        Field::new("llm.model", "TABLEBOOK_LLM_MODEL", config.llm.model.clone()),
        Field::new(
            "llm.base_url",
            "TABLEBOOK_LLM_BASE_URL",
            config.llm.endpoint_base().unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new("llm.api_key", "TABLEBOOK_LLM_API_KEY", redact_secret(config.llm.api_key.as_ref())),
        Field::new("llm.timeout_secs", "TABLEBOOK_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        Field::new("calendar.base_url", "TABLEBOOK_CALENDAR_BASE_URL", config.calendar.base_url.clone()),
        Field::new(
            "calendar.country_code",
            "TABLEBOOK_CALENDAR_COUNTRY_CODE",
            config.calendar.country_code.clone(),
        ),
        Field::new(
            "calendar.api_key",
            "TABLEBOOK_CALENDAR_API_KEY",
            redact_secret(config.calendar.api_key.as_ref()),
        ),
        Field::new(
            "calendar.timeout_secs",
            "TABLEBOOK_CALENDAR_TIMEOUT_SECS",
            config.calendar.timeout_secs.to_string(),
        ),
        Field::new(
            "sessions.max_age_hours",
            "TABLEBOOK_SESSIONS_MAX_AGE_HOURS",
            config.sessions.max_age_hours.to_string(),
        ),
        Field::new(
            "server.bind_address",
            "TABLEBOOK_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        Field::new("server.port", "TABLEBOOK_SERVER_PORT", config.server.port.to_string()),
        Field::new(
            "server.graceful_shutdown_secs",
            "TABLEBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new("logging.level", "TABLEBOOK_LOGGING_LEVEL", config.logging.level.clone()),
        Field::new("logging.format", "TABLEBOOK_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("tablebook.toml"), PathBuf::from("config/tablebook.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn flag_for(key: &str, options: &LoadOptions) -> Option<&'static str> {
    let overrides = &options.overrides;
    match key {
        "storage.data_dir" if overrides.data_dir.is_some() => Some("--data-dir"),
        "logging.level" if overrides.log_level.is_some() => Some("--log-level"),
        "calendar.country_code" if overrides.calendar_country_code.is_some() => Some("--country"),
        _ => None,
    }
}

fn field_source(
    field: &Field,
    options: &LoadOptions,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(flag) = flag_for(field.key, options) {
        return format!("flag ({flag})");
    }

    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('_') {
        if prefix.len() <= 4 {
            return format!("{prefix}_***");
        }
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::redact_secret;

    #[test]
    fn secrets_never_print_past_their_prefix() {
        assert_eq!(redact_secret(None), "<unset>");
        assert_eq!(redact_secret(Some(&SecretString::from("gsk_abcdef123".to_string()))), "gsk_***");
        assert_eq!(redact_secret(Some(&SecretString::from("plainsecretvalue".to_string()))), "<redacted>");
        assert_eq!(redact_secret(Some(&SecretString::from("  ".to_string()))), "<empty>");
    }
}
