use std::sync::Arc;

use tracing::info;

use super::batch::{BatchConfig, BatchEntry, BatchEvaluator, EvaluationError};
use super::domain::{HealthProfile, JobHealthResult, JobId, MetricsSnapshot, ProfileId};
use super::evaluation::RuleEngine;
use super::repository::{JobAssignments, MetricsProvider, ProfileStore};

/// Service composing the profile store, job assignments, metrics provider, and engine.
pub struct JobHealthService<P, M, A> {
    assignments: Arc<A>,
    batch: BatchEvaluator<P, M>,
    engine: RuleEngine,
}

impl<P, M, A> JobHealthService<P, M, A>
where
    P: ProfileStore + 'static,
    M: MetricsProvider + 'static,
    A: JobAssignments + 'static,
{
    pub fn new(
        profiles: Arc<P>,
        metrics: Arc<M>,
        assignments: Arc<A>,
        config: BatchConfig,
    ) -> Self {
        let batch = BatchEvaluator::new(profiles, metrics, config);
        Self {
            assignments,
            batch,
            engine: RuleEngine::new(),
        }
    }

    /// Evaluate one job. Without an explicit profile the job's assignment is used.
    pub async fn evaluate_job_health(
        &self,
        job_id: JobId,
        profile_id: Option<ProfileId>,
    ) -> Result<JobHealthResult, EvaluationError> {
        let profile_id = match profile_id {
            Some(profile_id) => profile_id,
            None => self
                .assignments
                .profile_for(&job_id)
                .ok_or_else(|| EvaluationError::NoProfileAssigned(job_id.clone()))?,
        };

        let profile = self.batch.resolve_profile(&profile_id)?;
        Ok(self.batch.evaluate_one(job_id, profile).await)
    }

    /// Evaluate many jobs; each entry carries its own result or error.
    pub async fn evaluate_batch(&self, pairs: Vec<(JobId, ProfileId)>) -> Vec<BatchEntry> {
        let total = pairs.len();
        let entries = self.batch.evaluate_all(pairs).await;
        let failed = entries.iter().filter(|entry| entry.outcome.is_err()).count();
        info!(total, failed, "health batch evaluated");
        entries
    }

    /// Evaluate a caller-supplied profile and snapshot without touching collaborators.
    pub fn evaluate_snapshot(
        &self,
        job_id: &JobId,
        profile: &HealthProfile,
        snapshot: &MetricsSnapshot,
    ) -> JobHealthResult {
        self.engine.evaluate(job_id, profile, snapshot)
    }
}
