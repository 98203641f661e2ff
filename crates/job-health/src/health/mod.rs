//! Job requisition health evaluation.
//!
//! A health profile is an ordered list of user-authored rules. Each rule compares one
//! metric from a job's snapshot against a threshold and, when it matches, proposes a
//! color. The most severe proposed color wins; jobs whose metrics cannot be fetched are
//! reported gray rather than green.

pub mod batch;
pub mod domain;
pub mod evaluation;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use batch::{BatchConfig, BatchEntry, BatchEntryView, BatchEvaluator, EvaluationError};
pub use domain::{
    ConditionType, HealthColor, HealthProfile, HealthRule, JobHealthResult, JobId,
    MetricsSnapshot, Operator, ProfileId, RuleId,
};
pub use evaluation::{
    evaluate_condition, resolve_priority, ConditionOutcome, RuleConfigError, RuleEngine,
};
pub use repository::{
    JobAssignments, MetricsProvider, MetricsUnavailableError, ProfileStore, ProfileStoreError,
};
pub use router::health_router;
pub(crate) use router::evaluation_status;
pub use service::JobHealthService;
pub use store::{load_profiles, parse_profiles, InMemoryJobAssignments, InMemoryProfileStore};
pub use validation::{validate_profile, validate_rule, ProfileValidationError};
