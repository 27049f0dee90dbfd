//! Explicit, idempotent upgrade of the bookings file.
//!
//! Older files carried only a weekday name (`day`) per row. The migration
//! fills `date` from `day`, backfills `day` from `date`, adds any missing
//! canonical columns, and assigns ids to rows that lack one. A timestamped
//! backup is written before any change; an already-current file is left
//! untouched.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use tablebook_core::calendar::{next_weekday, parse_weekday, weekday_name};

use crate::repositories::bookings_csv::{parse_booking_id, BOOKING_COLUMNS};
use crate::repositories::RepositoryError;

pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub path: PathBuf,
    pub file_found: bool,
    pub rows: usize,
    pub columns_added: Vec<String>,
    pub dates_filled: usize,
    pub days_filled: usize,
    pub ids_assigned: usize,
    /// Rows whose `day` value is not a weekday name and that have no `date`.
    pub unresolved_rows: Vec<usize>,
    pub backup: Option<PathBuf>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        !self.columns_added.is_empty()
            || self.dates_filled > 0
            || self.days_filled > 0
            || self.ids_assigned > 0
    }
}

/// Migrate the bookings file at `path`. `now` anchors weekday resolution
/// (next occurrence strictly after today) and names the backup file.
pub async fn migrate_bookings_file(
    path: impl Into<PathBuf>,
    now: NaiveDateTime,
) -> Result<MigrationReport, RepositoryError> {
    let path = path.into();
    tokio::task::spawn_blocking(move || migrate_blocking(&path, now)).await?
}

pub fn backup_path_for(path: &Path, now: NaiveDateTime) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".bak.{}", now.format(BACKUP_TIMESTAMP_FORMAT)));
    PathBuf::from(name)
}

fn migrate_blocking(path: &Path, now: NaiveDateTime) -> Result<MigrationReport, RepositoryError> {
    let mut report = MigrationReport { path: path.to_path_buf(), ..MigrationReport::default() };

    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            info!(event_name = "bookings.migration.skipped", path = %path.display(), "no bookings file to migrate");
            return Ok(report);
        }
        Err(error) => return Err(RepositoryError::io(path, error)),
    };
    report.file_found = true;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let records = reader.records().collect::<Result<Vec<StringRecord>, csv::Error>>()?;
    report.rows = records.len();

    let mut columns: Vec<String> = BOOKING_COLUMNS.iter().map(|column| column.to_string()).collect();
    for column in BOOKING_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            report.columns_added.push(column.to_string());
        }
    }
    // unknown columns are carried after the canonical ones
    for header in &headers {
        if !header.is_empty() && !columns.contains(header) {
            columns.push(header.clone());
        }
    }

    let today = now.date();
    let mut rows: Vec<HashMap<String, String>> = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.clone(), value.to_string()))
                .collect()
        })
        .collect();

    let mut next_id = rows
        .iter()
        .filter_map(|row| row.get("booking_id").and_then(|raw| parse_booking_id(raw)))
        .max()
        .unwrap_or(0);

    for (index, row) in rows.iter_mut().enumerate() {
        let line = index + 2;
        let date = field(row, "date");
        let day = field(row, "day");

        if date.is_empty() {
            match parse_weekday(&day) {
                Some(weekday) => {
                    let resolved = next_weekday(today, weekday);
                    row.insert("date".to_string(), resolved.format("%Y-%m-%d").to_string());
                    report.dates_filled += 1;
                }
                None => {
                    warn!(event_name = "bookings.migration.unresolved", line, day = %day, "row has neither a date nor a weekday");
                    report.unresolved_rows.push(line);
                }
            }
        } else if day.is_empty() {
            if let Ok(parsed) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
                row.insert("day".to_string(), weekday_name(parsed).to_string());
                report.days_filled += 1;
            }
        }

        if parse_booking_id(&field(row, "booking_id")).is_none() {
            next_id += 1;
            row.insert("booking_id".to_string(), next_id.to_string());
            report.ids_assigned += 1;
        }
    }

    if !report.changed() {
        info!(event_name = "bookings.migration.current", path = %path.display(), rows = report.rows, "bookings file already current");
        return Ok(report);
    }

    let backup = backup_path_for(path, now);
    fs::copy(path, &backup).map_err(|error| RepositoryError::io(&backup, error))?;
    write_records(path, &columns, &rows)?;
    report.backup = Some(backup);

    info!(
        event_name = "bookings.migration.applied",
        path = %path.display(),
        rows = report.rows,
        dates_filled = report.dates_filled,
        days_filled = report.days_filled,
        ids_assigned = report.ids_assigned,
        columns_added = report.columns_added.len(),
        "bookings file migrated"
    );
    Ok(report)
}

fn field(row: &HashMap<String, String>, column: &str) -> String {
    row.get(column).cloned().unwrap_or_default()
}

fn write_records(
    path: &Path,
    columns: &[String],
    rows: &[HashMap<String, String>],
) -> Result<(), RepositoryError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let staging = NamedTempFile::new_in(&parent).map_err(|error| RepositoryError::io(&parent, error))?;
    {
        let mut writer = csv::Writer::from_writer(staging.as_file());
        writer.write_record(columns)?;
        for row in rows {
            writer.write_record(columns.iter().map(|column| field(row, column)))?;
        }
        writer.flush().map_err(|error| RepositoryError::io(path, error))?;
    }
    staging.persist(path).map_err(|error| RepositoryError::io(path, error.error))?;
    Ok(())
}
