use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Extension;
use axum::Json;
use job_health::health::{
    health_router, JobAssignments, JobHealthService, MetricsProvider, ProfileStore,
};
use serde_json::json;
use std::sync::Arc;

/// Mount the job health API, or a 503 stand-in when the feature is switched off.
pub(crate) fn with_health_routes<P, M, A>(
    service: Arc<JobHealthService<P, M, A>>,
    enabled: bool,
) -> axum::Router
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
    A: JobAssignments + 'static,
{
    let router = if enabled {
        health_router(service)
    } else {
        axum::Router::new()
            .route("/api/v1/jobs/:job_id/health", any(feature_disabled))
            .route("/api/v1/jobs/health/batch", any(feature_disabled))
            .route("/api/v1/health/evaluate", any(feature_disabled))
    };

    router
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn feature_disabled() -> impl IntoResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "job health evaluation is disabled" })),
    )
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
