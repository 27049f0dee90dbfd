use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Fixed-date holidays, longest names first so "christmas eve" wins over
/// "christmas".
pub const FIXED_HOLIDAYS: &[(&str, u32, u32)] = &[
    ("christmas eve", 12, 24),
    ("christmas", 12, 25),
    ("new year's eve", 12, 31),
    ("new years eve", 12, 31),
    ("new year's day", 1, 1),
    ("new years day", 1, 1),
    ("new year", 1, 1),
    ("valentine's day", 2, 14),
    ("valentines day", 2, 14),
    ("halloween", 10, 31),
    ("independence day", 8, 15),
    ("republic day", 1, 26),
    ("gandhi jayanti", 10, 2),
];

/// Lunar festivals with known dates, used once every external source failed.
const BUILTIN_FESTIVALS: &[(&str, i32, u32, u32)] = &[
    ("diwali", 2023, 11, 12),
    ("holi", 2023, 3, 8),
    ("navratri", 2023, 10, 15),
    ("diwali", 2024, 11, 1),
    ("holi", 2024, 3, 25),
    ("navratri", 2024, 10, 3),
    ("diwali", 2025, 10, 20),
    ("holi", 2025, 3, 14),
    ("navratri", 2025, 9, 23),
    ("diwali", 2026, 11, 8),
    ("holi", 2026, 3, 3),
    ("navratri", 2026, 10, 12),
];

/// Festival names recognised in free text, mapped to their canonical name.
pub const FESTIVAL_NAMES: &[(&str, &str)] = &[
    ("deepavali", "diwali"),
    ("diwali", "diwali"),
    ("holi", "holi"),
    ("navratri", "navratri"),
    ("navaratri", "navratri"),
    ("dussehra", "dussehra"),
    ("dasara", "dussehra"),
    ("vijayadashami", "dussehra"),
    ("krishna janmashtami", "janmashtami"),
    ("janmashtami", "janmashtami"),
    ("makar sankranti", "makar sankranti"),
    ("pongal", "makar sankranti"),
    ("ganesh chaturthi", "ganesh chaturthi"),
    ("raksha bandhan", "raksha bandhan"),
    ("onam", "onam"),
    ("eid", "eid"),
];

/// Phrase rewrites applied before any lookup.
const REFERENCE_ALIASES: &[(&str, &str)] = &[
    ("independence day of india", "independence day"),
    ("indian independence day", "independence day"),
    ("indian republic day", "republic day"),
    ("deepavali", "diwali"),
];

/// Canonical keys added next to lookup-service names that contain them.
const LOOKUP_ALIASES: &[(&str, &[&str])] = &[
    ("diwali", &["diwali", "deepavali"]),
    ("christmas eve", &["christmas eve"]),
    ("christmas", &["christmas day", "christmas"]),
    ("independence day", &["independence day"]),
    ("republic day", &["republic day"]),
    ("holi", &["holi"]),
    ("janmashtami", &["janmashtami"]),
    ("dussehra", &["dussehra", "dasara", "vijayadashami"]),
    ("makar sankranti", &["makar sankranti", "pongal"]),
    ("gandhi jayanti", &["gandhi jayanti"]),
];

pub fn apply_reference_aliases(reference: &str) -> String {
    let mut normalized = reference.trim().to_lowercase();
    for (from, to) in REFERENCE_ALIASES {
        if normalized.contains(from) {
            normalized = normalized.replace(from, to);
        }
    }
    normalized
}

/// Fixed holiday named anywhere in `text`, dated in `year`.
pub fn fixed_holiday(text: &str, year: i32) -> Option<(&'static str, NaiveDate)> {
    let lower = apply_reference_aliases(text);
    FIXED_HOLIDAYS.iter().find(|(name, _, _)| lower.contains(name)).and_then(
        |(name, month, day)| NaiveDate::from_ymd_opt(year, *month, *day).map(|date| (*name, date)),
    )
}

pub fn builtin_festival(name: &str, year: i32) -> Option<NaiveDate> {
    BUILTIN_FESTIVALS
        .iter()
        .find(|(festival, festival_year, _, _)| *festival_year == year && name.contains(festival))
        .and_then(|(_, year, month, day)| NaiveDate::from_ymd_opt(*year, *month, *day))
}

/// Canonical festival named anywhere in `text`.
pub fn find_festival(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    FESTIVAL_NAMES
        .iter()
        .find(|(phrase, _)| {
            lower
                .match_indices(phrase)
                .any(|(index, _)| is_word_bounded(&lower, index, phrase.len()))
        })
        .map(|(_, canonical)| *canonical)
}

/// Lowercases lookup-service names and adds canonical aliases, so "Diwali/Deepavali"
/// is also reachable as "diwali".
pub fn normalize_lookup_names(entries: BTreeMap<String, NaiveDate>) -> BTreeMap<String, NaiveDate> {
    let mut normalized = BTreeMap::new();
    for (name, date) in entries {
        let lower = name.trim().to_lowercase();
        for (canonical, variants) in LOOKUP_ALIASES {
            if variants.iter().any(|variant| lower.contains(variant)) {
                normalized.entry((*canonical).to_string()).or_insert(date);
            }
        }
        normalized.insert(lower, date);
    }
    normalized
}

fn is_word_bounded(text: &str, start: usize, len: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[start + len..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::{
        apply_reference_aliases, builtin_festival, find_festival, fixed_holiday,
        normalize_lookup_names,
    };

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    #[test]
    fn fixed_holidays_prefer_the_longer_name() {
        assert_eq!(fixed_holiday("dinner on christmas eve", 2024), Some(("christmas eve", date("2024-12-24"))));
        assert_eq!(fixed_holiday("Christmas lunch", 2024), Some(("christmas", date("2024-12-25"))));
        assert_eq!(fixed_holiday("new year's eve party", 2025), Some(("new year's eve", date("2025-12-31"))));
        assert_eq!(
            fixed_holiday("indian independence day", 2024),
            Some(("independence day", date("2024-08-15")))
        );
        assert_eq!(fixed_holiday("a regular tuesday", 2024), None);
    }

    #[test]
    fn builtin_table_covers_known_years_only() {
        assert_eq!(builtin_festival("diwali", 2024), Some(date("2024-11-01")));
        assert_eq!(builtin_festival("holi", 2026), Some(date("2026-03-03")));
        assert_eq!(builtin_festival("diwali", 2031), None);
    }

    #[test]
    fn festival_names_need_word_boundaries() {
        assert_eq!(find_festival("table for Deepavali night"), Some("diwali"));
        assert_eq!(find_festival("holi party"), Some("holi"));
        assert_eq!(find_festival("book for the holiday"), None);
    }

    #[test]
    fn reference_aliases_rewrite_known_phrases() {
        assert_eq!(apply_reference_aliases("Independence Day of India"), "independence day");
        assert_eq!(apply_reference_aliases("deepavali"), "diwali");
    }

    #[test]
    fn lookup_names_gain_canonical_aliases() {
        let mut raw = BTreeMap::new();
        raw.insert("Diwali/Deepavali".to_string(), date("2024-11-01"));
        raw.insert("Dussehra".to_string(), date("2024-10-12"));

        let normalized = normalize_lookup_names(raw);

        assert_eq!(normalized.get("diwali/deepavali"), Some(&date("2024-11-01")));
        assert_eq!(normalized.get("diwali"), Some(&date("2024-11-01")));
        assert_eq!(normalized.get("dussehra"), Some(&date("2024-10-12")));
    }
}
