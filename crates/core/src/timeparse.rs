//! Local time-phrase recognition used when no extractor supplied a time.
//!
//! A number counts as a time only when something marks it as one: a `:MM`
//! part, am/pm, "o'clock", or a leading "at"/"around"/"by"/"@". Bare numbers
//! such as the 15 in "15th" are ignored.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::time::ClockTime;

static TIME_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (?P<prefix>\b(?:at|around|by)\s+|@\s*)?
        \b(?P<hour>\d{1,2})
        (?::(?P<minute>\d{2}))?
        \s*
        (?P<suffix>[ap]\.?m\b\.?|o['’]?\s?clock\b)?
        ",
    )
    .expect("time phrase pattern is valid")
});

static NOON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:noon|midday)\b").expect("noon pattern is valid"));

static EXPLICIT_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+\s*(?:am|pm|a\.m|p\.m|o'clock)\b").expect("clock pattern is valid")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\b").expect("bare number pattern is valid"));

const EVENING_CUES: &[&str] = &["evening", "tonight", "night", "dinner"];

/// Every distinct time mentioned, in order of appearance.
pub fn parse_times(text: &str) -> Vec<ClockTime> {
    let evening = has_evening_cue(text);
    let mut found: Vec<(usize, ClockTime)> = TIME_PHRASE
        .captures_iter(text)
        .filter_map(|captures| {
            let start = captures.get(0)?.start();
            time_from_captures(text, &captures, evening).map(|time| (start, time))
        })
        .collect();

    found.extend(NOON.find_iter(text).filter_map(|m| {
        ClockTime::on_the_hour(12).ok().map(|time| (m.start(), time))
    }));
    found.sort_by_key(|(start, _)| *start);

    let mut times = Vec::with_capacity(found.len());
    for (_, time) in found {
        if !times.contains(&time) {
            times.push(time);
        }
    }
    times
}

/// First time mentioned, if any.
pub fn parse_time(text: &str) -> Option<ClockTime> {
    parse_times(text).into_iter().next()
}

/// True when the text carries a number explicitly marked as a clock time
/// ("7pm", "9 a.m", "8 o'clock").
pub fn mentions_clock_time(text: &str) -> bool {
    EXPLICIT_CLOCK.is_match(text)
}

/// Last-resort reading of a reply such as "8" or "make it 9 pm": the first
/// standalone number in 1..=23, shifted into the afternoon when the text says
/// pm or evening.
pub fn parse_bare_hour(text: &str) -> Option<ClockTime> {
    let lower = text.to_ascii_lowercase();
    let afternoon = lower.contains("pm") || lower.contains("evening");
    BARE_NUMBER
        .captures_iter(&lower)
        .filter_map(|captures| captures.get(1)?.as_str().parse::<u8>().ok())
        .find(|hour| (1..=23).contains(hour))
        .and_then(|hour| {
            let hour = if afternoon && hour < 12 { hour + 12 } else { hour };
            ClockTime::on_the_hour(hour).ok()
        })
}

fn time_from_captures(text: &str, captures: &Captures<'_>, evening: bool) -> Option<ClockTime> {
    let hour_match = captures.name("hour")?;
    let minute = captures.name("minute");
    let suffix = captures.name("suffix").map(|m| m.as_str().to_ascii_lowercase());
    let prefixed = captures.name("prefix").is_some();

    // "2024" would otherwise read as hour 20.
    if minute.is_none() && text[hour_match.end()..].starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }
    if minute.is_none() && suffix.is_none() && !prefixed {
        return None;
    }

    let mut hour = hour_match.as_str().parse::<u8>().ok()?;
    let minute = match minute {
        Some(m) => m.as_str().parse::<u8>().ok()?,
        None => 0,
    };

    match suffix.as_deref().map(|s| s.chars().next()) {
        Some(Some('p')) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour < 12 {
                hour += 12;
            }
        }
        Some(Some('a')) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour == 12 {
                hour = 0;
            }
        }
        _ => {
            if evening && (1..=11).contains(&hour) {
                hour += 12;
            }
        }
    }

    ClockTime::new(hour, minute).ok()
}

fn has_evening_cue(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower
        .split(|ch: char| !ch.is_ascii_alphabetic())
        .any(|word| EVENING_CUES.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::{mentions_clock_time, parse_bare_hour, parse_time, parse_times};
    use crate::domain::time::ClockTime;

    fn time(raw: &str) -> ClockTime {
        raw.parse().expect("time")
    }

    #[test]
    fn recognises_marked_times() {
        struct Case {
            input: &'static str,
            expected: Option<&'static str>,
        }

        let cases = [
            Case { input: "book a table tomorrow at 9", expected: Some("09:00") },
            Case { input: "table for diwali at 9pm", expected: Some("21:00") },
            Case { input: "reserve for 7:45 pm on friday", expected: Some("19:45") },
            Case { input: "18:30 please", expected: Some("18:30") },
            Case { input: "around 8 o'clock", expected: Some("08:00") },
            Case { input: "12 am", expected: Some("00:00") },
            Case { input: "12pm", expected: Some("12:00") },
            Case { input: "lunch at noon", expected: Some("12:00") },
            Case { input: "at 7 tonight", expected: Some("19:00") },
            Case { input: "9 a.m. on monday", expected: Some("09:00") },
            Case { input: "on the 15th", expected: None },
            Case { input: "for 4 people", expected: None },
            Case { input: "at 2024-03-15", expected: None },
            Case { input: "13pm", expected: None },
        ];

        for case in cases {
            let expected = case.expected.map(time);
            assert_eq!(parse_time(case.input), expected, "input: {}", case.input);
        }
    }

    #[test]
    fn lists_every_distinct_time_in_order() {
        assert_eq!(parse_times("at 7 or 8 pm"), vec![time("07:00"), time("20:00")]);
        assert_eq!(parse_times("7pm, I mean 7pm"), vec![time("19:00")]);
        assert!(parse_times("tomorrow please").is_empty());
    }

    #[test]
    fn detects_explicit_clock_mentions() {
        assert!(mentions_clock_time("how about 8pm"));
        assert!(mentions_clock_time("9 a.m"));
        assert!(mentions_clock_time("10 o'clock"));
        assert!(!mentions_clock_time("how about friday"));
        assert!(!mentions_clock_time("at 9"));
    }

    #[test]
    fn bare_hour_shifts_into_evening_on_cue() {
        assert_eq!(parse_bare_hour("8"), Some(time("08:00")));
        assert_eq!(parse_bare_hour("make it 8 in the evening"), Some(time("20:00")));
        assert_eq!(parse_bare_hour("21"), Some(time("21:00")));
        assert_eq!(parse_bare_hour("no thanks"), None);
        assert_eq!(parse_bare_hour("0"), None);
    }
}
