use std::path::{Path, PathBuf};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tablebook_core::config::LlmProvider;

#[derive(Clone)]
pub struct HealthState {
    pub bookings_path: PathBuf,
    pub llm_provider: LlmProvider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub storage: HealthCheck,
    pub llm: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state.bookings_path).await;
    let ready = storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "tablebook-server runtime initialized".to_string(),
        },
        storage,
        llm: llm_check(state.llm_provider),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn storage_check(path: &Path) -> HealthCheck {
    match tokio::fs::read(path).await {
        Ok(_) => HealthCheck { status: "ready", detail: format!("{} is readable", path.display()) },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("{} could not be read: {error}", path.display()),
        },
    }
}

fn llm_check(provider: LlmProvider) -> HealthCheck {
    let detail = match provider {
        LlmProvider::Offline => "offline: keyword extraction and template replies".to_string(),
        other => format!("provider {}", other.as_str()),
    };
    HealthCheck { status: "ready", detail }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use tablebook_core::config::LlmProvider;
    use tempfile::TempDir;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_bookings_file_is_readable() {
        let dir = TempDir::new().expect("tempdir");
        let bookings_path = dir.path().join("bookings.csv");
        std::fs::write(&bookings_path, "user_name,date,time,booking_date,booking_id,day\n").expect("write");

        let (status, Json(payload)) =
            health(State(HealthState { bookings_path, llm_provider: LlmProvider::Groq })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.storage.status, "ready");
        assert_eq!(payload.llm.detail, "provider groq");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_bookings_file_is_missing() {
        let dir = TempDir::new().expect("tempdir");

        let (status, Json(payload)) = health(State(HealthState {
            bookings_path: dir.path().join("missing.csv"),
            llm_provider: LlmProvider::Offline,
        }))
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.storage.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        assert!(payload.llm.detail.starts_with("offline"));
    }
}
