use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::batch::{BatchEntryView, EvaluationError};
use super::domain::{HealthProfile, JobId, MetricsSnapshot, ProfileId};
use super::repository::{JobAssignments, MetricsProvider, ProfileStore};
use super::service::JobHealthService;

#[derive(Debug, Deserialize)]
pub(crate) struct HealthQuery {
    #[serde(default)]
    pub(crate) profile_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchJob {
    pub(crate) job_id: JobId,
    pub(crate) profile_id: ProfileId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchRequest {
    pub(crate) jobs: Vec<BatchJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EvaluateRequest {
    #[serde(default)]
    pub(crate) job_id: Option<JobId>,
    pub(crate) profile: HealthProfile,
    pub(crate) snapshot: MetricsSnapshot,
}

/// Router builder exposing HTTP endpoints for job health evaluation.
pub fn health_router<P, M, A>(service: Arc<JobHealthService<P, M, A>>) -> Router
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
    A: JobAssignments + 'static,
{
    Router::new()
        .route("/api/v1/jobs/:job_id/health", get(job_health_handler::<P, M, A>))
        .route("/api/v1/jobs/health/batch", post(batch_handler::<P, M, A>))
        .route("/api/v1/health/evaluate", post(evaluate_handler::<P, M, A>))
        .with_state(service)
}

pub(crate) async fn job_health_handler<P, M, A>(
    State(service): State<Arc<JobHealthService<P, M, A>>>,
    Path(job_id): Path<String>,
    Query(query): Query<HealthQuery>,
) -> Response
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
    A: JobAssignments + 'static,
{
    let profile_id = query
        .profile_id
        .filter(|id| !id.trim().is_empty())
        .map(ProfileId);

    match service.evaluate_job_health(JobId(job_id), profile_id).await {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn batch_handler<P, M, A>(
    State(service): State<Arc<JobHealthService<P, M, A>>>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Response
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
    A: JobAssignments + 'static,
{
    let pairs = request
        .jobs
        .into_iter()
        .map(|job| (job.job_id, job.profile_id))
        .collect();

    let results: Vec<BatchEntryView> = service
        .evaluate_batch(pairs)
        .await
        .iter()
        .map(|entry| entry.view())
        .collect();

    (StatusCode::OK, axum::Json(json!({ "results": results }))).into_response()
}

pub(crate) async fn evaluate_handler<P, M, A>(
    State(service): State<Arc<JobHealthService<P, M, A>>>,
    axum::Json(request): axum::Json<EvaluateRequest>,
) -> Response
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
    A: JobAssignments + 'static,
{
    let job_id = request
        .job_id
        .unwrap_or_else(|| JobId("ad-hoc".to_string()));
    let result = service.evaluate_snapshot(&job_id, &request.profile, &request.snapshot);
    (StatusCode::OK, axum::Json(result)).into_response()
}

/// HTTP status for a per-job evaluation failure.
pub(crate) fn evaluation_status(error: &EvaluationError) -> StatusCode {
    match error {
        EvaluationError::ProfileNotFound(_) => StatusCode::NOT_FOUND,
        EvaluationError::NoProfileAssigned(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EvaluationError::Store(_) | EvaluationError::TaskFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: EvaluationError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (evaluation_status(&error), axum::Json(payload)).into_response()
}
