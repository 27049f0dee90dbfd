//! Operating-hours checks applied before anything reaches the slot store.
//!
//! Booking creation and cancellation carry separate windows: bookings accept
//! any hour below 24, cancellations any hour below 23.

use chrono::NaiveDate;

use tablebook_core::domain::slot::OperatingWindow;
use tablebook_core::domain::time::ClockTime;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent {
    /// Time as extracted from a booking request.
    Booking { date: NaiveDate, time: ClockTime },
    /// A new time offered in reply to an hourly-rounding question.
    HourlyReply { time: ClockTime },
    /// The option picked in reply to an ambiguous-time question.
    ClarifiedTime { time: ClockTime },
    Cancellation { time: ClockTime },
}

impl GuardrailIntent {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::Booking { .. } => "booking.create",
            Self::HourlyReply { .. } => "booking.hourly_reply",
            Self::ClarifiedTime { .. } => "booking.clarified_time",
            Self::Cancellation { .. } => "booking.cancel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    /// Proceed with `time`, which may differ from the requested one after rounding.
    Allow { time: ClockTime },
    /// Ask the user to confirm the nearest whole hour.
    Clarify { reason_code: &'static str, user_message: String, suggested: ClockTime },
    Deny { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatingHoursPolicy {
    pub venue: String,
    pub booking: OperatingWindow,
    pub cancellation: OperatingWindow,
}

impl OperatingHoursPolicy {
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            booking: OperatingWindow::BOOKING,
            cancellation: OperatingWindow::CANCELLATION,
        }
    }

    pub fn evaluate(&self, intent: &GuardrailIntent) -> GuardrailDecision {
        match *intent {
            GuardrailIntent::Booking { date, time } => self.booking_time(date, time),
            GuardrailIntent::HourlyReply { time } => {
                if !time.is_on_the_hour() {
                    GuardrailDecision::Deny {
                        reason_code: "time_not_on_hour",
                        user_message: "I can only book on the hour. Please choose a time between 9:00 and 23:00."
                            .to_string(),
                    }
                } else if !self.booking.contains(time) {
                    GuardrailDecision::Deny {
                        reason_code: "outside_operating_hours",
                        user_message: format!(
                            "{} is open from 9 AM to 12 midnight. Please choose a time within these hours.",
                            self.venue
                        ),
                    }
                } else {
                    GuardrailDecision::Allow { time }
                }
            }
            GuardrailIntent::ClarifiedTime { time } => match time.round_to_hour() {
                Some(rounded) if self.booking.contains(rounded) => GuardrailDecision::Allow { time: rounded },
                _ => GuardrailDecision::Deny {
                    reason_code: "outside_operating_hours",
                    user_message: format!(
                        "I'm sorry, but {} is only open from 9 AM to 12 midnight. Please choose a time within our operating hours.",
                        self.venue
                    ),
                },
            },
            GuardrailIntent::Cancellation { time } if self.cancellation.contains(time) => {
                GuardrailDecision::Allow { time }
            }
            GuardrailIntent::Cancellation { .. } => GuardrailDecision::Deny {
                reason_code: "cancellation_outside_hours",
                user_message: format!(
                    "Invalid cancellation time. {} is only open from 9 AM to 11 PM",
                    self.venue
                ),
            },
        }
    }

    fn booking_time(&self, date: NaiveDate, time: ClockTime) -> GuardrailDecision {
        let outside = || GuardrailDecision::Deny {
            reason_code: "outside_operating_hours",
            user_message: format!(
                "{} is only open from 9 AM to 12 midnight. You requested {time}.",
                self.venue
            ),
        };

        if time.is_on_the_hour() {
            return if self.booking.contains(time) { GuardrailDecision::Allow { time } } else { outside() };
        }
        // 23:45 would round to midnight, which is never offered
        match time.round_to_hour() {
            Some(suggested) if self.booking.contains(suggested) => GuardrailDecision::Clarify {
                reason_code: "time_not_on_hour",
                user_message: format!(
                    "I noticed you requested a reservation for {time} on {date}. {venue} only accepts reservations on the hour. \
                     Would you like me to book {suggested} instead? We're open from 9 AM to 12 midnight.",
                    venue = self.venue
                ),
                suggested,
            },
            _ => outside(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use tablebook_core::domain::time::ClockTime;

    use super::{GuardrailDecision, GuardrailIntent, OperatingHoursPolicy};

    fn policy() -> OperatingHoursPolicy {
        OperatingHoursPolicy::new("Paradise Grill")
    }

    fn time(raw: &str) -> ClockTime {
        raw.parse().expect("time")
    }

    fn booking(raw: &str) -> GuardrailIntent {
        GuardrailIntent::Booking { date: NaiveDate::from_ymd_opt(2024, 3, 8).expect("date"), time: time(raw) }
    }

    #[test]
    fn hourly_booking_inside_window_is_allowed() {
        assert_eq!(policy().evaluate(&booking("09:00")), GuardrailDecision::Allow { time: time("09:00") });
        assert_eq!(policy().evaluate(&booking("23:00")), GuardrailDecision::Allow { time: time("23:00") });
    }

    #[test]
    fn off_hour_booking_suggests_rounding_up_from_half_past() {
        let decision = policy().evaluate(&booking("19:45"));
        let GuardrailDecision::Clarify { suggested, user_message, reason_code } = decision else {
            panic!("expected a clarification, got {decision:?}");
        };
        assert_eq!(suggested, time("20:00"));
        assert_eq!(reason_code, "time_not_on_hour");
        assert_eq!(
            user_message,
            "I noticed you requested a reservation for 19:45 on 2024-03-08. Paradise Grill only accepts reservations \
             on the hour. Would you like me to book 20:00 instead? We're open from 9 AM to 12 midnight."
        );

        assert!(matches!(
            policy().evaluate(&booking("19:10")),
            GuardrailDecision::Clarify { suggested, .. } if suggested == time("19:00")
        ));
    }

    #[test]
    fn rounding_past_midnight_or_before_opening_is_outside_hours() {
        for raw in ["23:45", "08:10", "07:00"] {
            let decision = policy().evaluate(&booking(raw));
            assert!(
                matches!(decision, GuardrailDecision::Deny { reason_code: "outside_operating_hours", .. }),
                "{raw}: {decision:?}"
            );
        }
        // 08:30 rounds to opening time
        assert!(matches!(policy().evaluate(&booking("08:30")), GuardrailDecision::Clarify { .. }));
    }

    #[test]
    fn cancellation_window_stops_before_eleven_pm() {
        assert_eq!(
            policy().evaluate(&GuardrailIntent::Cancellation { time: time("22:00") }),
            GuardrailDecision::Allow { time: time("22:00") }
        );
        assert_eq!(
            policy().evaluate(&GuardrailIntent::Cancellation { time: time("23:00") }),
            GuardrailDecision::Deny {
                reason_code: "cancellation_outside_hours",
                user_message: "Invalid cancellation time. Paradise Grill is only open from 9 AM to 11 PM".to_string(),
            }
        );
    }

    #[test]
    fn hourly_reply_must_be_whole_hour_inside_window() {
        assert!(matches!(
            policy().evaluate(&GuardrailIntent::HourlyReply { time: time("18:30") }),
            GuardrailDecision::Deny { reason_code: "time_not_on_hour", .. }
        ));
        assert!(matches!(
            policy().evaluate(&GuardrailIntent::HourlyReply { time: time("08:00") }),
            GuardrailDecision::Deny { reason_code: "outside_operating_hours", .. }
        ));
        assert_eq!(
            policy().evaluate(&GuardrailIntent::HourlyReply { time: time("18:00") }),
            GuardrailDecision::Allow { time: time("18:00") }
        );
    }

    #[test]
    fn clarified_time_is_rounded_then_checked() {
        assert_eq!(
            policy().evaluate(&GuardrailIntent::ClarifiedTime { time: time("19:30") }),
            GuardrailDecision::Allow { time: time("20:00") }
        );
        assert!(matches!(
            policy().evaluate(&GuardrailIntent::ClarifiedTime { time: time("06:00") }),
            GuardrailDecision::Deny { .. }
        ));
        assert_eq!(GuardrailIntent::ClarifiedTime { time: time("06:00") }.action_key(), "booking.clarified_time");
    }
}
