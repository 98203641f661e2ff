use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::domain::{HealthProfile, JobHealthResult, JobId, MetricsSnapshot, ProfileId};
use super::evaluation::RuleEngine;
use super::repository::{MetricsProvider, MetricsUnavailableError, ProfileStore, ProfileStoreError};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(2_000);
const DEFAULT_MAX_CONCURRENCY: usize = 16;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Per-job failures surfaced to callers instead of aborting a batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error("health profile '{0}' not found")]
    ProfileNotFound(ProfileId),
    #[error("job '{0}' has no health profile assigned")]
    NoProfileAssigned(JobId),
    #[error(transparent)]
    Store(#[from] ProfileStoreError),
    #[error("evaluation task for job '{job_id}' failed: {reason}")]
    TaskFailed { job_id: JobId, reason: String },
}

/// Scheduling policy for batch evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub fetch_timeout: Duration,
    pub max_concurrency: usize,
    pub metrics_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            metrics_retries: 0,
        }
    }
}

/// One job's outcome within a batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub job_id: JobId,
    pub profile_id: ProfileId,
    pub outcome: Result<JobHealthResult, EvaluationError>,
}

/// Wire view of a batch entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all_fields = "camelCase")]
pub enum BatchEntryView {
    #[serde(rename = "ok")]
    Evaluated {
        job_id: JobId,
        profile_id: ProfileId,
        result: JobHealthResult,
    },
    #[serde(rename = "error")]
    Failed {
        job_id: JobId,
        profile_id: ProfileId,
        error: String,
    },
}

impl BatchEntry {
    pub fn view(&self) -> BatchEntryView {
        match &self.outcome {
            Ok(result) => BatchEntryView::Evaluated {
                job_id: self.job_id.clone(),
                profile_id: self.profile_id.clone(),
                result: result.clone(),
            },
            Err(error) => BatchEntryView::Failed {
                job_id: self.job_id.clone(),
                profile_id: self.profile_id.clone(),
                error: error.to_string(),
            },
        }
    }
}

/// Fans out one independent evaluation task per job.
///
/// Provider calls share one semaphore across every evaluation made through this
/// evaluator, so at most `max_concurrency` fetches run at once. A call that outlives its
/// timeout keeps its permit until the provider actually returns.
pub struct BatchEvaluator<P, M> {
    profiles: Arc<P>,
    metrics: Arc<M>,
    engine: RuleEngine,
    config: BatchConfig,
    permits: Arc<Semaphore>,
}

impl<P, M> BatchEvaluator<P, M>
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
{
    pub fn new(profiles: Arc<P>, metrics: Arc<M>, config: BatchConfig) -> Self {
        let permits = config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(permits));
        Self {
            profiles,
            metrics,
            engine: RuleEngine::new(),
            config,
            permits,
        }
    }

    /// Resolve a profile snapshot, treating a missing profile as a hard error.
    pub fn resolve_profile(
        &self,
        profile_id: &ProfileId,
    ) -> Result<Arc<HealthProfile>, EvaluationError> {
        self.profiles
            .fetch(profile_id)?
            .ok_or_else(|| EvaluationError::ProfileNotFound(profile_id.clone()))
    }

    /// Evaluate a single job against an already resolved profile snapshot.
    ///
    /// Metrics failures and timeouts fail closed to a gray result.
    pub async fn evaluate_one(
        &self,
        job_id: JobId,
        profile: Arc<HealthProfile>,
    ) -> JobHealthResult {
        let fetcher = self.fetcher();
        evaluate_job(fetcher, self.engine, job_id, profile).await
    }

    /// Evaluate every `(job, profile)` pair independently.
    ///
    /// Each distinct profile is read once before any task starts, so every job that
    /// names the same profile is evaluated against the same rule set.
    pub async fn evaluate_all(&self, pairs: Vec<(JobId, ProfileId)>) -> Vec<BatchEntry> {
        let mut profiles: HashMap<ProfileId, Result<Arc<HealthProfile>, EvaluationError>> =
            HashMap::new();
        for (_, profile_id) in &pairs {
            if !profiles.contains_key(profile_id) {
                profiles.insert(profile_id.clone(), self.resolve_profile(profile_id));
            }
        }

        debug!(jobs = pairs.len(), profiles = profiles.len(), "starting health batch");

        let tasks = pairs.into_iter().map(|(job_id, profile_id)| {
            let resolved = profiles
                .get(&profile_id)
                .cloned()
                .unwrap_or_else(|| Err(EvaluationError::ProfileNotFound(profile_id.clone())));
            let fetcher = self.fetcher();
            let engine = self.engine;

            async move {
                let outcome = match resolved {
                    Err(error) => Err(error),
                    Ok(profile) => {
                        let task_job = job_id.clone();
                        let handle =
                            tokio::spawn(evaluate_job(fetcher, engine, task_job, profile));
                        handle.await.map_err(|err| {
                            warn!(job_id = %job_id, error = %err, "health evaluation task failed");
                            EvaluationError::TaskFailed {
                                job_id: job_id.clone(),
                                reason: err.to_string(),
                            }
                        })
                    }
                };

                BatchEntry {
                    job_id,
                    profile_id,
                    outcome,
                }
            }
        });

        join_all(tasks).await
    }

    fn fetcher(&self) -> Fetcher<M> {
        Fetcher {
            metrics: Arc::clone(&self.metrics),
            permits: Arc::clone(&self.permits),
            config: self.config.clone(),
        }
    }
}

/// Everything a task needs to pull one snapshot from the provider.
struct Fetcher<M> {
    metrics: Arc<M>,
    permits: Arc<Semaphore>,
    config: BatchConfig,
}

async fn evaluate_job<M>(
    fetcher: Fetcher<M>,
    engine: RuleEngine,
    job_id: JobId,
    profile: Arc<HealthProfile>,
) -> JobHealthResult
where
    M: MetricsProvider + 'static,
{
    match fetcher.fetch_snapshot(&job_id).await {
        Ok(snapshot) => engine.evaluate(&job_id, &profile, &snapshot),
        Err(error) => {
            warn!(job_id = %job_id, profile_id = %profile.id, "{error}");
            JobHealthResult::metrics_unavailable(job_id, profile.id.clone(), error.to_string())
        }
    }
}

impl<M> Fetcher<M>
where
    M: MetricsProvider + 'static,
{
    /// Fetch with bounded retries.
    ///
    /// Only calls that returned (an error or a panic) are retried. A timed-out call may
    /// still be running, so it ends the fetch instead of stacking another attempt on top.
    async fn fetch_snapshot(
        &self,
        job_id: &JobId,
    ) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        let mut attempt = 0u32;

        loop {
            let error = match timeout(self.config.fetch_timeout, self.attempt(job_id)).await {
                Ok(Ok(snapshot)) => return Ok(snapshot),
                Ok(Err(error)) => error,
                Err(_) => {
                    return Err(MetricsUnavailableError::new(
                        job_id.clone(),
                        format!(
                            "metrics fetch timed out after {}ms",
                            self.config.fetch_timeout.as_millis()
                        ),
                    ))
                }
            };

            if attempt >= self.config.metrics_retries {
                return Err(error);
            }
            attempt += 1;
            debug!(job_id = %job_id, attempt, "retrying metrics fetch");
            sleep(RETRY_BACKOFF * attempt).await;
        }
    }

    /// One provider call. The permit moves into the blocking closure and is released
    /// only when the provider returns.
    async fn attempt(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|err| MetricsUnavailableError::new(job_id.clone(), err.to_string()))?;
        let provider = Arc::clone(&self.metrics);
        let id = job_id.clone();

        let fetch = tokio::task::spawn_blocking(move || {
            let snapshot = provider.fetch_snapshot(&id);
            drop(permit);
            snapshot
        });

        match fetch.await {
            Ok(result) => result,
            Err(join_error) => Err(MetricsUnavailableError::new(
                job_id.clone(),
                format!("metrics fetch aborted: {join_error}"),
            )),
        }
    }
}
