use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bootstrap::{ReadinessSnapshot, StartupReport};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct LiveResponse {
    status: String,
    version: String,
}

/// Liveness: answers as soon as the process can serve HTTP at all,
/// regardless of startup progress.
#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Process is alive", body = LiveResponse)
    ),
    tag = "health"
)]
pub async fn liveness() -> Json<LiveResponse> {
    Json(LiveResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness: 200 only once the startup sequence completed. Load
/// balancers route traffic on this.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready for traffic", body = ReadinessSnapshot),
        (status = 503, description = "Starting up or failed", body = ReadinessSnapshot)
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessSnapshot>) {
    let snapshot = state.startup.readiness().snapshot();
    let status = if snapshot.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(snapshot))
}

#[derive(Serialize, ToSchema)]
pub struct StartupStatusResponse {
    pub snapshot: ReadinessSnapshot,
    /// Terminal report; absent while startup is still in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<StartupReport>,
}

/// Startup: detailed progress for operators, including per-phase timings
/// once the sequence settles.
#[utoipa::path(
    get,
    path = "/health/startup",
    responses(
        (status = 200, description = "Startup progress report", body = StartupStatusResponse)
    ),
    tag = "health"
)]
pub async fn startup_status(State(state): State<AppState>) -> Json<StartupStatusResponse> {
    Json(StartupStatusResponse {
        snapshot: state.startup.readiness().snapshot(),
        report: state.startup.report(),
    })
}
