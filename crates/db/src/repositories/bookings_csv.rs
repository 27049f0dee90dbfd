use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use tablebook_core::calendar::weekday_name;
use tablebook_core::domain::booking::{Booking, BookingId};

use super::{BookingTable, RepositoryError};

pub const BOOKING_COLUMNS: [&str; 6] =
    ["user_name", "date", "time", "booking_date", "booking_id", "day"];

pub(crate) const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bookings stored as a CSV file with a header row.
///
/// The `day` column is written for older readers and ignored on load. A file
/// that only has `day` and no `date` must go through the migration first.
#[derive(Clone, Debug)]
pub struct CsvBookingTable {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct BookingRow {
    user_name: String,
    date: String,
    time: String,
    #[serde(default)]
    booking_date: String,
    #[serde(default)]
    booking_id: String,
    #[serde(default)]
    day: String,
}

impl CsvBookingTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with only a header row when it does not exist yet.
    pub async fn ensure_exists(&self) -> Result<(), RepositoryError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if path.exists() {
                return Ok(());
            }
            write_rows(&path, &[])
        })
        .await?
    }
}

#[async_trait]
impl BookingTable for CsvBookingTable {
    async fn load(&self) -> Result<Vec<Booking>, RepositoryError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_rows(&path)).await?
    }

    async fn replace(&self, bookings: Vec<Booking>) -> Result<(), RepositoryError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_rows(&path, &bookings)).await?
    }
}

fn read_rows(path: &Path) -> Result<Vec<Booking>, RepositoryError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(RepositoryError::io(path, error)),
    };

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    if !headers.iter().any(|header| header == "date") {
        return Err(RepositoryError::Schema(format!(
            "`{}` has no `date` column; run the booking migration first",
            path.display()
        )));
    }

    let mut bookings = Vec::new();
    for (index, row) in reader.deserialize::<BookingRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = row?;
        bookings.push(decode_row(row, line)?);
    }
    debug!(event_name = "bookings.table.loaded", path = %path.display(), rows = bookings.len(), "booking table loaded");
    Ok(bookings)
}

fn decode_row(row: BookingRow, line: usize) -> Result<Booking, RepositoryError> {
    let decode = |field: &str, value: &str| {
        RepositoryError::Decode(format!("line {line}: invalid {field} `{value}`"))
    };

    let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
        .map_err(|_| decode("date", &row.date))?;
    let time = row.time.parse().map_err(|_| decode("time", &row.time))?;
    let id = parse_booking_id(&row.booking_id).ok_or_else(|| decode("booking_id", &row.booking_id))?;
    let created_at = if row.booking_date.is_empty() {
        date.and_time(chrono::NaiveTime::MIN)
    } else {
        NaiveDateTime::parse_from_str(&row.booking_date, CREATED_AT_FORMAT)
            .map_err(|_| decode("booking_date", &row.booking_date))?
    };

    Ok(Booking { id: BookingId(id), user_name: row.user_name, date, time, created_at })
}

/// Ids written by spreadsheet tools sometimes come back as `3.0`.
pub(crate) fn parse_booking_id(raw: &str) -> Option<u64> {
    if let Ok(id) = raw.parse::<u64>() {
        return Some(id);
    }
    let float = raw.parse::<f64>().ok()?;
    (float.fract() == 0.0 && float >= 0.0).then_some(float as u64)
}

fn write_rows(path: &Path, bookings: &[Booking]) -> Result<(), RepositoryError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|error| RepositoryError::io(&parent, error))?;

    let staging = NamedTempFile::new_in(&parent).map_err(|error| RepositoryError::io(&parent, error))?;
    {
        let mut writer =
            csv::WriterBuilder::new().has_headers(false).from_writer(staging.as_file());
        writer.write_record(BOOKING_COLUMNS)?;
        for booking in bookings {
            writer.serialize(BookingRow {
                user_name: booking.user_name.clone(),
                date: booking.date.format("%Y-%m-%d").to_string(),
                time: booking.time.to_string(),
                booking_date: booking.created_at.format(CREATED_AT_FORMAT).to_string(),
                booking_id: booking.id.to_string(),
                day: weekday_name(booking.date).to_string(),
            })?;
        }
        writer.flush().map_err(|error| RepositoryError::io(path, error))?;
    }
    staging.persist(path).map_err(|error| RepositoryError::io(path, error.error))?;
    Ok(())
}
