use crate::api::MgmtState;
use crate::api::schemas::health::{HealthResponse, ServiceStatusResponse};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use time::OffsetDateTime;

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks that message storage answers.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (status_code, storage_status) = match state.health_service.check_storage().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, component = "storage", "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        storage: storage_status.to_string(),
    };

    (status_code, Json(response))
}

/// Public status endpoint on the API port.
pub async fn status() -> Json<ServiceStatusResponse> {
    Json(ServiceStatusResponse { status: "ok".to_string(), timestamp: OffsetDateTime::now_utc() })
}
