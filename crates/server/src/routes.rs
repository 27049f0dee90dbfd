//! JSON routes over the dialogue orchestrator and the slot store.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use tablebook_agent::{CancellationRequest, DialogueOrchestrator, TurnRequest, TurnResponse};
use tablebook_core::calendar::weekday_name;
use tablebook_core::domain::booking::{Booking, BookingId};
use tablebook_core::domain::dialogue::TurnStatus;
use tablebook_core::domain::slot::Slot;
use tablebook_core::domain::time::ClockTime;
use tablebook_core::errors::{ApplicationError, InterfaceError};
use tablebook_db::SlotStoreError;

type RouteError = (StatusCode, Json<TurnResponse>);

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DialogueOrchestrator>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SlotsQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotsResponse {
    pub status: TurnStatus,
    pub available_slots: Vec<Slot>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One row of `GET /user-bookings/{user_name}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub user_name: String,
    pub date: NaiveDate,
    pub day: &'static str,
    pub time: ClockTime,
    pub booking_date: NaiveDateTime,
}

impl From<Booking> for BookingRecord {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id,
            day: weekday_name(booking.date),
            user_name: booking.user_name,
            date: booking.date,
            time: booking.time,
            booking_date: booking.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserBookingsResponse {
    pub status: TurnStatus,
    pub bookings: Vec<BookingRecord>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/booking", post(booking))
        .route("/slots", get(slots))
        .route("/user-bookings/{user_name}", get(user_bookings))
        .route("/cancel-booking", post(cancel_booking))
        .route("/reset-bookings", post(reset_bookings))
        .with_state(state)
}

pub async fn booking(
    State(state): State<AppState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, RouteError> {
    let Json(request) = payload.map_err(|rejection| malformed_body("booking", &rejection))?;
    Ok(Json(state.orchestrator.handle_turn(request).await))
}

pub async fn slots(
    State(state): State<AppState>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, RouteError> {
    let start = parse_query_date(query.start_date.as_deref())?;
    let end = parse_query_date(query.end_date.as_deref())?;

    let availability = state
        .orchestrator
        .slots()
        .list_available(start, end)
        .await
        .map_err(|error| match error {
            SlotStoreError::RangeTooLong { .. } => {
                (StatusCode::BAD_REQUEST, Json(TurnResponse::failure(error.to_string())))
            }
            error => store_failure(error, "slots"),
        })?;

    Ok(Json(SlotsResponse {
        status: TurnStatus::Success,
        available_slots: availability.slots,
        start_date: availability.start_date,
        end_date: availability.end_date,
    }))
}

pub async fn user_bookings(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<Json<UserBookingsResponse>, RouteError> {
    let bookings = state
        .orchestrator
        .slots()
        .list_by_user(&user_name)
        .await
        .map_err(|error| store_failure(error, "user_bookings"))?;

    Ok(Json(UserBookingsResponse {
        status: TurnStatus::Success,
        bookings: bookings.into_iter().map(BookingRecord::from).collect(),
    }))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    payload: Result<Json<CancellationRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, RouteError> {
    let Json(request) = payload.map_err(|rejection| malformed_body("cancel_booking", &rejection))?;
    info!(
        event_name = "http.cancel_booking.received",
        user_name = request.user_name.as_deref().unwrap_or_default(),
        booking_id = ?request.booking_id,
        "direct cancellation requested"
    );
    Ok(Json(state.orchestrator.cancel_direct(request).await))
}

pub async fn reset_bookings(State(state): State<AppState>) -> Json<TurnResponse> {
    match state.orchestrator.slots().reset().await {
        Ok(()) => Json(TurnResponse::new(TurnStatus::Success, "All bookings have been reset")),
        Err(error) => {
            error!(event_name = "http.reset_bookings.failed", error = %error, "bookings reset failed");
            Json(TurnResponse::failure("Failed to reset bookings"))
        }
    }
}

fn parse_query_date(raw: Option<&str>) -> Result<Option<NaiveDate>, RouteError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map(Some).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(TurnResponse::failure("Invalid date format. Please use YYYY-MM-DD format.")),
            )
        }),
    }
}

fn malformed_body(route: &'static str, rejection: &JsonRejection) -> RouteError {
    warn!(event_name = "http.request.malformed", route, error = %rejection, "request body rejected");
    (rejection.status(), Json(TurnResponse::failure("Request body must be a JSON object")))
}

fn store_failure(error: SlotStoreError, route: &'static str) -> RouteError {
    error!(event_name = "http.store.failed", route, error = %error, "slot store call failed");
    let interface = ApplicationError::from(error).into_interface(route);
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(TurnResponse::failure(interface.user_message())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::extract::{Path, State};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::{Json, Router};
    use chrono::NaiveDateTime;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use tablebook_agent::{DialogueOrchestrator, KeywordIntentExtractor, TemplateReplyRenderer};
    use tablebook_core::calendar::CalendarResolver;
    use tablebook_core::clock::FixedClock;
    use tablebook_core::domain::booking::{Booking, BookingId};
    use tablebook_db::{InMemoryBookingTable, InMemorySessionRepository, SessionStore, SlotStore};

    use super::{router, user_bookings, AppState};

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-01 10:00:00", "%Y-%m-%d %H:%M:%S").expect("datetime")
    }

    fn state_with(bookings: Vec<Booking>) -> AppState {
        let clock = Arc::new(FixedClock(now()));
        let orchestrator = DialogueOrchestrator::new(
            Arc::new(SlotStore::new(Arc::new(InMemoryBookingTable::with_bookings(bookings)), clock.clone())),
            Arc::new(SessionStore::new(Arc::new(InMemorySessionRepository::default()), clock.clone())),
            Arc::new(CalendarResolver::new(None, None)),
            Arc::new(KeywordIntentExtractor::new()),
            Arc::new(TemplateReplyRenderer::new("Paradise Grill").expect("templates")),
            clock,
            "Paradise Grill",
        );
        AppState { orchestrator: Arc::new(orchestrator) }
    }

    fn seeded() -> Booking {
        Booking {
            id: BookingId(1),
            user_name: "asha".to_string(),
            date: "2024-03-02".parse().expect("date"),
            time: "19:00".parse().expect("time"),
            created_at: now(),
        }
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => request.body(Body::empty()).expect("request"),
        };
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn booking_turn_returns_the_envelope_with_a_session() {
        let (status, body) = send(
            router(state_with(Vec::new())),
            Method::POST,
            "/booking",
            Some(json!({"user_name": "asha", "booking_request": "book a table tomorrow at 9"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Slot booked for 2024-03-02 at 09:00");
        assert_eq!(body["booking_id"], 1);
        assert!(body["session_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn booking_without_fields_fails_inside_the_envelope() {
        let (status, body) =
            send(router(state_with(Vec::new())), Method::POST, "/booking", Some(json!({"user_name": "asha"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "Missing user_name or booking_request");
        assert!(body.get("session_id").is_none());
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_bad_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/booking")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let response = router(state_with(Vec::new())).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["status"], "failure");
    }

    #[tokio::test]
    async fn slots_lists_free_hours_in_the_range() {
        let (status, body) = send(
            router(state_with(vec![seeded()])),
            Method::GET,
            "/slots?start_date=2024-03-02&end_date=2024-03-02",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["start_date"], "2024-03-02");
        assert_eq!(body["end_date"], "2024-03-02");
        let slots = body["available_slots"].as_array().expect("slots");
        assert_eq!(slots.len(), 14);
        assert_eq!(slots[0], json!({"date": "2024-03-02", "time": "09:00"}));
        assert!(!slots.contains(&json!({"date": "2024-03-02", "time": "19:00"})));
    }

    #[tokio::test]
    async fn slots_default_to_a_week_from_today() {
        let (status, body) = send(router(state_with(Vec::new())), Method::GET, "/slots", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start_date"], "2024-03-01");
        assert_eq!(body["end_date"], "2024-03-08");
    }

    #[tokio::test]
    async fn slots_with_a_malformed_date_is_a_bad_request() {
        let (status, body) =
            send(router(state_with(Vec::new())), Method::GET, "/slots?start_date=03/02/2024", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "Invalid date format. Please use YYYY-MM-DD format.");
    }

    #[tokio::test]
    async fn slots_over_a_month_is_a_bad_request() {
        let (status, body) = send(
            router(state_with(Vec::new())),
            Method::GET,
            "/slots?start_date=0001-01-01&end_date=9999-12-31",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "Date range too long. Please request at most 31 days.");
        assert!(body.get("available_slots").is_none());
    }

    #[tokio::test]
    async fn user_bookings_lists_only_that_user() {
        let Json(response) = user_bookings(State(state_with(vec![seeded()])), Path("asha".to_string()))
            .await
            .expect("bookings");
        assert_eq!(response.bookings.len(), 1);
        assert_eq!(response.bookings[0].day, "Saturday");

        let (status, body) = send(router(state_with(vec![seeded()])), Method::GET, "/user-bookings/ravi", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "bookings": []}));
    }

    #[tokio::test]
    async fn cancel_booking_by_id_and_rejects_bad_time_format() {
        let state = state_with(vec![seeded()]);

        let (_, body) = send(
            router(state.clone()),
            Method::POST,
            "/cancel-booking",
            Some(json!({"user_name": "asha", "time": "7pm"})),
        )
        .await;
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "Invalid time format for cancellation. Please use HH:MM format.");

        let (status, body) = send(
            router(state.clone()),
            Method::POST,
            "/cancel-booking",
            Some(json!({"user_name": "asha", "booking_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["cancelled_date"], "2024-03-02");
        assert_eq!(body["cancelled_time"], "19:00");
        assert!(state.orchestrator.slots().list_by_user("asha").await.expect("bookings").is_empty());
    }

    #[tokio::test]
    async fn reset_bookings_clears_the_table() {
        let state = state_with(vec![seeded()]);

        let (status, body) = send(router(state.clone()), Method::POST, "/reset-bookings", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "message": "All bookings have been reset"}));
        assert!(state.orchestrator.slots().list_by_user("asha").await.expect("bookings").is_empty());
    }

}
