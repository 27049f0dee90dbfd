use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

/// Wall-clock time of day at minute resolution, rendered as `HH:MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, DomainError> {
        if hour > 23 {
            return Err(DomainError::InvalidField {
                field: "time",
                reason: format!("hour {hour} is out of range 0..=23"),
            });
        }
        if minute > 59 {
            return Err(DomainError::InvalidField {
                field: "time",
                reason: format!("minute {minute} is out of range 0..=59"),
            });
        }
        Ok(Self { hour, minute })
    }

    pub fn on_the_hour(hour: u8) -> Result<Self, DomainError> {
        Self::new(hour, 0)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn is_on_the_hour(&self) -> bool {
        self.minute == 0
    }

    /// Nearest whole hour, rounding up from half past. Returns `None` when
    /// rounding would cross midnight.
    pub fn round_to_hour(&self) -> Option<Self> {
        let hour = if self.minute >= 30 { self.hour + 1 } else { self.hour };
        (hour <= 23).then_some(Self { hour, minute: 0 })
    }

    /// Twelve-hour label used in replies, e.g. `9 PM` or `10:30 AM`.
    pub fn spoken(&self) -> String {
        let suffix = if self.hour >= 12 { "PM" } else { "AM" };
        let hour = match self.hour % 12 {
            0 => 12,
            other => other,
        };
        if self.minute == 0 {
            format!("{hour} {suffix}")
        } else {
            format!("{hour}:{:02} {suffix}", self.minute)
        }
    }
}

impl From<ClockTime> for NaiveTime {
    fn from(value: ClockTime) -> Self {
        NaiveTime::from_hms_opt(u32::from(value.hour), u32::from(value.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(value: NaiveTime) -> Self {
        Self { hour: value.hour() as u8, minute: value.minute() as u8 }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = DomainError;

    /// Accepts `H:MM`, `HH:MM` and `HH:MM:SS` (seconds are dropped).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidField {
            field: "time",
            reason: format!("`{value}` is not a HH:MM time"),
        };

        let mut parts = value.trim().split(':');
        let hour = parts.next().ok_or_else(invalid)?;
        let minute = parts.next().ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            if seconds.len() != 2 || !seconds.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
        }
        if parts.next().is_some() || hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }

        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::ClockTime;

    fn time(raw: &str) -> ClockTime {
        raw.parse().expect("valid time")
    }

    #[test]
    fn rounds_up_from_half_past_and_down_before() {
        assert_eq!(time("19:45").round_to_hour(), Some(time("20:00")));
        assert_eq!(time("19:30").round_to_hour(), Some(time("20:00")));
        assert_eq!(time("19:10").round_to_hour(), Some(time("19:00")));
        assert_eq!(time("19:29").round_to_hour(), Some(time("19:00")));
    }

    #[test]
    fn rounding_past_midnight_has_no_suggestion() {
        assert_eq!(time("23:45").round_to_hour(), None);
        assert_eq!(time("23:15").round_to_hour(), Some(time("23:00")));
    }

    #[test]
    fn parses_and_renders_hh_mm() {
        assert_eq!(time("9:00").to_string(), "09:00");
        assert_eq!(time("18:30:00").to_string(), "18:30");
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("7pm".parse::<ClockTime>().is_err());
        assert!("12:5".parse::<ClockTime>().is_err());
    }

    #[test]
    fn spoken_label_uses_twelve_hour_clock() {
        assert_eq!(time("21:00").spoken(), "9 PM");
        assert_eq!(time("00:00").spoken(), "12 AM");
        assert_eq!(time("12:30").spoken(), "12:30 PM");
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&time("07:05")).expect("serialize");
        assert_eq!(json, "\"07:05\"");
        let back: ClockTime = serde_json::from_str("\"17:00\"").expect("deserialize");
        assert_eq!(back, time("17:00"));
    }
}
