use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date pattern is valid")
});

static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\b",
    )
    .expect("day month pattern is valid")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b",
    )
    .expect("month day pattern is valid")
});

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let lower = name.trim().to_ascii_lowercase();
    WEEKDAYS.iter().find(|(day, _)| *day == lower).map(|(_, weekday)| *weekday)
}

/// First date strictly after `as_of` falling on `weekday`; a full week ahead
/// when `as_of` already is that weekday.
pub fn next_weekday(as_of: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = as_of.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let ahead = match (target + 7 - current) % 7 {
        0 => 7,
        days => days,
    };
    as_of.checked_add_days(Days::new(u64::from(ahead))).unwrap_or(as_of)
}

/// Relative words, weekday names and explicit dates. No network, no cache.
pub fn resolve_phrase(text: &str, as_of: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    let words: Vec<&str> =
        lower.split(|ch: char| !ch.is_alphanumeric() && ch != '\'').filter(|w| !w.is_empty()).collect();

    if let Some(date) = explicit_date(&lower, as_of) {
        return Some(date);
    }
    if lower.contains("day after tomorrow") {
        return as_of.checked_add_days(Days::new(2));
    }
    if words.contains(&"tomorrow") {
        return as_of.checked_add_days(Days::new(1));
    }
    if words.contains(&"today") || words.contains(&"tonight") {
        return Some(as_of);
    }
    WEEKDAYS
        .iter()
        .find(|(day, _)| words.contains(day))
        .map(|(_, weekday)| next_weekday(as_of, *weekday))
}

/// ISO or month-name date. Month-name dates without a year land on the next
/// occurrence on or after `as_of`.
fn explicit_date(lower: &str, as_of: NaiveDate) -> Option<NaiveDate> {
    if let Some(captures) = ISO_DATE.captures(lower) {
        let year = captures.get(1)?.as_str().parse().ok()?;
        let month = captures.get(2)?.as_str().parse().ok()?;
        let day = captures.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let (month, day) = if let Some(captures) = DAY_MONTH.captures(lower) {
        (month_number(captures.get(2)?.as_str())?, captures.get(1)?.as_str().parse::<u32>().ok()?)
    } else if let Some(captures) = MONTH_DAY.captures(lower) {
        (month_number(captures.get(1)?.as_str())?, captures.get(2)?.as_str().parse::<u32>().ok()?)
    } else {
        return None;
    };

    let this_year = NaiveDate::from_ymd_opt(as_of.year(), month, day)?;
    if this_year >= as_of {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(as_of.year() + 1, month, day)
    }
}

fn month_number(prefix: &str) -> Option<u32> {
    let month = match &prefix.to_ascii_lowercase()[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use super::{next_weekday, parse_weekday, resolve_phrase, weekday_name};

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    #[test]
    fn next_weekday_never_returns_the_same_day() {
        let friday = date("2024-03-01");
        assert_eq!(next_weekday(friday, Weekday::Mon), date("2024-03-04"));
        assert_eq!(next_weekday(friday, Weekday::Fri), date("2024-03-08"));
        assert_eq!(next_weekday(friday, Weekday::Sat), date("2024-03-02"));
    }

    #[test]
    fn relative_words_resolve_against_as_of() {
        let as_of = date("2024-03-01");
        assert_eq!(resolve_phrase("tomorrow", as_of), Some(date("2024-03-02")));
        assert_eq!(resolve_phrase("Today please", as_of), Some(date("2024-03-01")));
        assert_eq!(resolve_phrase("the day after tomorrow", as_of), Some(date("2024-03-03")));
        assert_eq!(resolve_phrase("next Monday", as_of), Some(date("2024-03-04")));
        assert_eq!(resolve_phrase("next Friday", as_of), Some(date("2024-03-08")));
        assert_eq!(resolve_phrase("sometime soon", as_of), None);
    }

    #[test]
    fn explicit_dates_are_recognised() {
        let as_of = date("2024-03-01");
        assert_eq!(resolve_phrase("on 2024-04-10 at 7pm", as_of), Some(date("2024-04-10")));
        assert_eq!(resolve_phrase("15th of March", as_of), Some(date("2024-03-15")));
        assert_eq!(resolve_phrase("march 5", as_of), Some(date("2024-03-05")));
        assert_eq!(resolve_phrase("jan 10", as_of), Some(date("2025-01-10")));
        assert_eq!(resolve_phrase("2024-02-30", as_of), None);
    }

    #[test]
    fn weekday_names_round_trip() {
        assert_eq!(weekday_name(date("2024-03-01")), "Friday");
        assert_eq!(parse_weekday("Sunday"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("someday"), None);
    }
}
