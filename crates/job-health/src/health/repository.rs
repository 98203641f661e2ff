use std::sync::Arc;

use super::domain::{HealthProfile, JobId, MetricsSnapshot, ProfileId};
use super::validation::ProfileValidationError;

/// Read access to health profiles.
///
/// Implementations hand out immutable `Arc` snapshots; an edit must replace the stored
/// `Arc` rather than mutate the profile in place, so in-flight evaluations keep reading
/// the rule set they started with.
pub trait ProfileStore: Send + Sync {
    fn fetch(&self, id: &ProfileId) -> Result<Option<Arc<HealthProfile>>, ProfileStoreError>;
    fn list(&self) -> Result<Vec<Arc<HealthProfile>>, ProfileStoreError>;
}

/// Error enumeration for profile store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile rejected: {0}")]
    Invalid(#[from] ProfileValidationError),
    #[error("profile document could not be parsed: {0}")]
    Parse(String),
}

/// Supplies live metrics for a job. The engine never talks to a database or API directly.
pub trait MetricsProvider: Send + Sync {
    fn fetch_snapshot(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError>;
}

/// Raised when no snapshot can be produced for a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("metrics unavailable for job '{job_id}': {reason}")]
pub struct MetricsUnavailableError {
    pub job_id: JobId,
    pub reason: String,
}

impl MetricsUnavailableError {
    pub fn new(job_id: JobId, reason: impl Into<String>) -> Self {
        Self {
            job_id,
            reason: reason.into(),
        }
    }
}

/// Lookup of the default profile assigned to a job.
pub trait JobAssignments: Send + Sync {
    fn profile_for(&self, job_id: &JobId) -> Option<ProfileId>;
}
