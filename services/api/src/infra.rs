use job_health::error::AppError;
use job_health::health::{
    ConditionType, HealthColor, HealthProfile, HealthRule, InMemoryJobAssignments, JobId,
    MetricsProvider, MetricsSnapshot, MetricsUnavailableError, Operator, ProfileId, RuleId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Snapshots and assignments loaded from a JSON fixture file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Fixtures {
    #[serde(default)]
    pub(crate) snapshots: HashMap<JobId, MetricsSnapshot>,
    #[serde(default)]
    pub(crate) assignments: HashMap<JobId, ProfileId>,
}

impl Fixtures {
    pub(crate) fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Metrics provider backed by fixture snapshots, standing in for the ATS integration.
#[derive(Default)]
pub(crate) struct FixtureMetricsProvider {
    snapshots: HashMap<JobId, MetricsSnapshot>,
}

impl FixtureMetricsProvider {
    pub(crate) fn new(snapshots: HashMap<JobId, MetricsSnapshot>) -> Self {
        Self { snapshots }
    }
}

impl MetricsProvider for FixtureMetricsProvider {
    fn fetch_snapshot(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        self.snapshots
            .get(job_id)
            .cloned()
            .ok_or_else(|| MetricsUnavailableError::new(job_id.clone(), "no snapshot recorded"))
    }
}

pub(crate) fn assignments_from(fixtures: HashMap<JobId, ProfileId>) -> InMemoryJobAssignments {
    let assignments = InMemoryJobAssignments::new();
    for (job_id, profile_id) in fixtures {
        assignments.assign(job_id, profile_id);
    }
    assignments
}

/// Profile installed when no profile file is configured.
pub(crate) fn default_profile() -> HealthProfile {
    let rule = |id: &str, color, condition, operator, value, stage: Option<&str>| HealthRule {
        id: RuleId(id.to_string()),
        color,
        condition,
        operator,
        value,
        max_value: None,
        stage: stage.map(str::to_string),
        enabled: true,
    };

    HealthProfile {
        id: ProfileId("standard".to_string()),
        name: "Standard".to_string(),
        description: "Default requisition health rules".to_string(),
        rules: vec![
            rule(
                "stuck-with-manager",
                HealthColor::Red,
                ConditionType::TimeInStage,
                Operator::Gt,
                4.0,
                Some("הועבר למנהל"),
            ),
            rule(
                "client-silent",
                HealthColor::Orange,
                ConditionType::DaysSinceContact,
                Operator::Gt,
                7.0,
                None,
            ),
            rule(
                "thin-pipeline",
                HealthColor::Yellow,
                ConditionType::CandidatesTotal,
                Operator::Lt,
                5.0,
                None,
            ),
            rule(
                "high-disqualification",
                HealthColor::Purple,
                ConditionType::DisqualificationRate,
                Operator::Gt,
                70.0,
                None,
            ),
            rule(
                "long-open",
                HealthColor::Blue,
                ConditionType::DaysOpen,
                Operator::Gt,
                60.0,
                None,
            ),
        ],
    }
}
