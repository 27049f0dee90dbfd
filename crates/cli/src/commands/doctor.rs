use std::fs;
use std::path::Path;

use serde::Serialize;
use tablebook_agent::{CalendarificClient, ChatCompletionsClient};
use tablebook_core::config::{AppConfig, LoadOptions};
use tablebook_db::{BookingTable, CsvBookingTable};

use crate::commands::CommandResult;

const PROBE_FILE: &str = ".tablebook-doctor-probe";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 1 when any check fails.
pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_storage_writable(&config));
            checks.push(check_bookings_readable(&config));
            checks.push(check_llm(&config));
            checks.push(check_holiday_lookup(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["storage_writable", "bookings_readable", "llm_readiness", "holiday_lookup"] {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_storage_writable(config: &AppConfig) -> DoctorCheck {
    let bookings_path = config.storage.bookings_path();
    let dir = match bookings_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    let probe = dir.join(PROBE_FILE);
    let result = fs::create_dir_all(&dir)
        .and_then(|()| fs::write(&probe, b"ok"))
        .and_then(|()| fs::remove_file(&probe));

    match result {
        Ok(()) => DoctorCheck::new("storage_writable", CheckStatus::Pass, format!("{} is writable", dir.display())),
        Err(error) => DoctorCheck::new(
            "storage_writable",
            CheckStatus::Fail,
            format!("{} is not writable: {error}", dir.display()),
        ),
    }
}

fn check_bookings_readable(config: &AppConfig) -> DoctorCheck {
    let path = config.storage.bookings_path();
    if !path.exists() {
        return DoctorCheck::new(
            "bookings_readable",
            CheckStatus::Pass,
            format!("{} does not exist yet; it is created on first start", path.display()),
        );
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::new(
                "bookings_readable",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let table = CsvBookingTable::new(path.clone());
    match runtime.block_on(table.load()) {
        Ok(bookings) => DoctorCheck::new(
            "bookings_readable",
            CheckStatus::Pass,
            format!("{} holds {} bookings", path.display(), bookings.len()),
        ),
        Err(error) => DoctorCheck::new(
            "bookings_readable",
            CheckStatus::Fail,
            format!("{error}; run `tablebook migrate` if the file predates the date column"),
        ),
    }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    match ChatCompletionsClient::from_config(&config.llm) {
        Ok(None) => DoctorCheck::new(
            "llm_readiness",
            CheckStatus::Pass,
            "offline mode: keyword extraction and template replies",
        ),
        Ok(Some(client)) => DoctorCheck::new(
            "llm_readiness",
            CheckStatus::Pass,
            format!("{} via {} (model {})", config.llm.provider.as_str(), client.endpoint(), config.llm.model),
        ),
        Err(error) => DoctorCheck::new("llm_readiness", CheckStatus::Fail, error.to_string()),
    }
}

fn check_holiday_lookup(config: &AppConfig) -> DoctorCheck {
    match CalendarificClient::from_config(&config.calendar) {
        Ok(None) => DoctorCheck::new(
            "holiday_lookup",
            CheckStatus::Skipped,
            "calendar.api_key unset; built-in holiday tables only",
        ),
        Ok(Some(client)) => DoctorCheck::new(
            "holiday_lookup",
            CheckStatus::Pass,
            format!("holiday lookup configured for {}", client.country_code()),
        ),
        Err(error) => DoctorCheck::new("holiday_lookup", CheckStatus::Fail, error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
