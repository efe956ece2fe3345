pub mod config;
pub mod routes;
pub mod services;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Beacon API",
        version = "0.1.0",
        description = "API for Beacon - realtime collaboration backend"
    ),
    paths(
        routes::health::liveness,
        routes::health::readiness,
        routes::health::startup_status,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::LiveResponse,
        routes::StartupStatusResponse,
        bootstrap::ReadinessSnapshot,
        bootstrap::StartupReport,
        bootstrap::StartupOutcome,
        bootstrap::PhaseTimingView,
        beacon_core::Phase,
    )),
    tags(
        (name = "health", description = "Liveness, readiness, and startup probes"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health::liveness))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .route("/health/startup", get(routes::health::startup_status))
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
