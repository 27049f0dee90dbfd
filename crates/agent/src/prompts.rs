//! Prompt contracts for the completion endpoint. Each extraction prompt asks
//! for one JSON object and nothing else.

use chrono::{Datelike, Days, NaiveDate};

use tablebook_core::domain::session::LastBooking;
use tablebook_core::domain::time::ClockTime;

fn recent_booking_line(last_booking: Option<&LastBooking>) -> String {
    last_booking
        .map(|booking| {
            format!("The user's most recent booking was on {} at {}.", booking.date, booking.time)
        })
        .unwrap_or_default()
}

pub fn intent_prompt(venue: &str, last_booking: Option<&LastBooking>) -> String {
    format!(
        r#"You are a reservation assistant for {venue} restaurant.
{recent}
Analyze the user request and classify their intent.

If the user wants to cancel a booking, respond with: {{"intent": "cancellation"}}
If the user wants to make a new booking, respond with: {{"intent": "booking"}}
If the user wants to check available slots, respond with: {{"intent": "availability"}}
If you cannot determine the intent, respond with: {{"intent": "unknown"}}

Examples:
- "Book a table for June 15th at 7 PM" -> {{"intent": "booking"}}
- "Reserve for tomorrow at 9" -> {{"intent": "booking"}}
- "Book a table at 9PM on Christmas Eve" -> {{"intent": "booking"}}
- "Cancel my reservation" -> {{"intent": "cancellation"}}
- "What slots do you have available next Tuesday?" -> {{"intent": "availability"}}

ONLY return the JSON object with the intent. No other explanatory text."#,
        recent = recent_booking_line(last_booking),
    )
}

pub fn booking_details_prompt(venue: &str, today: NaiveDate, last_booking: Option<&LastBooking>) -> String {
    let year = today.year();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    format!(
        r#"You are an assistant for {venue} restaurant helping to understand booking requests.
Today's date is {today}. The current year is {year}.
{recent}
Your task:
1. Extract the date if explicitly mentioned (e.g. "June 15th", "tomorrow", "next Friday") as YYYY-MM-DD.
2. Extract the time as 24-hour HH:MM.
3. Extract the name of any festival or holiday mentioned (e.g. "Diwali", "Christmas Eve").
4. If the user names more than one possible time, list them all in "time_options" and set "time" to null.

Return ONLY a JSON object with this format:
{{"date": "YYYY-MM-DD or null", "time": "HH:MM or null", "time_options": [], "festival_referenced": "name or null"}}

Examples:
- "Book a table for June 15th at 7 PM" -> {{"date": "{year}-06-15", "time": "19:00", "time_options": [], "festival_referenced": null}}
- "Reserve for tomorrow at 9" -> {{"date": "{tomorrow}", "time": "09:00", "time_options": [], "festival_referenced": null}}
- "Book a table at 9PM on Diwali" -> {{"date": null, "time": "21:00", "time_options": [], "festival_referenced": "Diwali"}}
- "Tomorrow at 7 or 8 pm" -> {{"date": "{tomorrow}", "time": null, "time_options": ["19:00", "20:00"], "festival_referenced": null}}

If a festival or holiday is mentioned, set "date" to null unless a specific date was also mentioned.
Do NOT calculate the date of the festival yourself."#,
        recent = recent_booking_line(last_booking),
    )
}

pub fn cancellation_details_prompt(
    venue: &str,
    today: NaiveDate,
    last_booking: Option<&LastBooking>,
) -> String {
    let year = today.year();
    format!(
        r#"You are an assistant for {venue} restaurant helping to understand cancellation requests.
Today's date is {today}. The current year is {year}.
{recent}
Your task:
1. Extract the date if explicitly mentioned, as YYYY-MM-DD.
2. Extract the time if mentioned, as 24-hour HH:MM.
3. Extract the name of any festival or holiday mentioned.
4. Detect whether the user refers to their most recent booking (e.g. "Cancel my reservation").

Return ONLY a JSON object with this format:
{{"date": "YYYY-MM-DD or null", "time": "HH:MM or null", "festival_referenced": "name or null", "is_recent_reference": true or false}}

Examples:
- "Cancel my reservation for June 15th at 7 PM" -> {{"date": "{year}-06-15", "time": "19:00", "festival_referenced": null, "is_recent_reference": false}}
- "Cancel my booking" -> {{"date": null, "time": null, "festival_referenced": null, "is_recent_reference": true}}
- "Cancel my Diwali reservation" -> {{"date": null, "time": null, "festival_referenced": "Diwali", "is_recent_reference": false}}"#,
        recent = recent_booking_line(last_booking),
    )
}

pub fn holiday_date_prompt(year: i32) -> String {
    format!(
        "You are an assistant that knows the dates of holidays and festivals around the world.\n\
         For the given holiday or festival name, return ONLY the date in YYYY-MM-DD format for the year {year}.\n\
         No other text."
    )
}

pub fn holiday_date_question(occasion: &str, year: i32) -> String {
    format!("What is the date of {occasion} in {year}?")
}

pub fn time_clarification_prompt(venue: &str, options: &[ClockTime]) -> String {
    let options = options.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    format!(
        "The user was asked to clarify which time they meant for their {venue} reservation.\n\
         The possible options were: {options}\n\
         Based on the user's response, identify which time they have chosen.\n\
         Return ONLY the time in HH:MM format with no other text.\n\
         If you cannot determine the time, respond with \"unknown\"."
    )
}

pub fn booking_reply_prompt(venue: &str, result_json: &str, occasion: &str, date: &str, time: &str, status: &str) -> String {
    format!(
        "Generate a friendly response for a {venue} booking result:\n\n\
         Result: {result_json}\n\n\
         Information:\n\
         - This is for {venue} restaurant\n\
         - Reservation{occasion} on {date} at {time}\n\
         - Status: {status}\n\n\
         If the booking was successful, sound excited and welcoming.\n\
         If it failed, offer apologies and suggest alternatives.\n\
         Keep your response concise (2-3 sentences)."
    )
}

pub fn cancellation_reply_prompt(venue: &str, result_json: &str, date: &str, time: &str, status: &str) -> String {
    format!(
        "Generate a friendly response for a {venue} reservation cancellation:\n\n\
         Result: {result_json}\n\n\
         Information:\n\
         - This is for {venue} restaurant\n\
         - Cancellation on {date} at {time}\n\
         - Status: {status}\n\n\
         If the cancellation was successful, confirm it politely.\n\
         If it failed, explain why and offer assistance.\n\
         Keep your response concise (2-3 sentences)."
    )
}

pub fn availability_reply_prompt(venue: &str, date: &str, times: &str, count: usize) -> String {
    format!(
        "Generate a friendly response showing available reservation slots at {venue}:\n\n\
         Information:\n\
         - Date: {date}\n\
         - Available times: {times}\n\
         - Number of available slots: {count}\n\n\
         If there are available slots, list them in a friendly way.\n\
         If there are no available slots, apologize and suggest checking another date.\n\
         Keep your response concise (2-3 sentences)."
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use tablebook_core::domain::booking::BookingId;
    use tablebook_core::domain::session::LastBooking;
    use tablebook_core::domain::time::ClockTime;

    use super::{booking_details_prompt, intent_prompt, time_clarification_prompt};

    #[test]
    fn booking_prompt_anchors_today_and_recent_booking() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        let last = LastBooking {
            date: NaiveDate::from_ymd_opt(2024, 3, 2).expect("date"),
            time: "19:00".parse().expect("time"),
            booking_id: BookingId(4),
        };
        let prompt = booking_details_prompt("Paradise Grill", today, Some(&last));

        assert!(prompt.contains("Today's date is 2024-03-01"));
        assert!(prompt.contains("\"date\": \"2024-03-02\", \"time\": \"09:00\""));
        assert!(prompt.contains("most recent booking was on 2024-03-02 at 19:00"));
    }

    #[test]
    fn prompts_name_the_venue() {
        assert!(intent_prompt("Paradise Grill", None).starts_with("You are a reservation assistant for Paradise Grill"));
        let options: [ClockTime; 2] = ["19:00".parse().expect("time"), "20:00".parse().expect("time")];
        assert!(time_clarification_prompt("Paradise Grill", &options).contains("19:00, 20:00"));
    }
}
