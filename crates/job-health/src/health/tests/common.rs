use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::health::domain::{
    ConditionType, HealthColor, HealthProfile, HealthRule, JobId, MetricsSnapshot, Operator,
    ProfileId, RuleId,
};
use crate::health::repository::{MetricsProvider, MetricsUnavailableError};
use crate::health::store::{InMemoryJobAssignments, InMemoryProfileStore};
use crate::health::{BatchConfig, JobHealthService};

pub(super) const MANAGER_STAGE: &str = "הועבר למנהל";
pub(super) const HR_INTERVIEW_STAGE: &str = "ראיון HR";

pub(super) fn rule(
    id: &str,
    color: HealthColor,
    condition: ConditionType,
    operator: Operator,
    value: f64,
) -> HealthRule {
    HealthRule {
        id: RuleId(id.to_string()),
        color,
        condition,
        operator,
        value,
        max_value: None,
        stage: None,
        enabled: true,
    }
}

pub(super) fn staged_rule(
    id: &str,
    color: HealthColor,
    condition: ConditionType,
    stage: &str,
    operator: Operator,
    value: f64,
) -> HealthRule {
    HealthRule {
        stage: Some(stage.to_string()),
        ..rule(id, color, condition, operator, value)
    }
}

pub(super) fn between_rule(
    id: &str,
    color: HealthColor,
    value: f64,
    max_value: Option<f64>,
) -> HealthRule {
    HealthRule {
        max_value,
        ..rule(id, color, ConditionType::CandidatesTotal, Operator::Between, value)
    }
}

pub(super) fn profile(id: &str, rules: Vec<HealthRule>) -> HealthProfile {
    HealthProfile {
        id: ProfileId(id.to_string()),
        name: format!("{id} profile"),
        description: String::new(),
        rules,
    }
}

/// Profile used across scenarios: a job stuck with the hiring manager is red.
pub(super) fn standard_profile() -> HealthProfile {
    HealthProfile {
        id: ProfileId("standard".to_string()),
        name: "Standard".to_string(),
        description: "High-volume hiring".to_string(),
        rules: vec![
            staged_rule(
                "manager-stuck",
                HealthColor::Red,
                ConditionType::TimeInStage,
                MANAGER_STAGE,
                Operator::Gt,
                4.0,
            ),
            rule(
                "client-silent",
                HealthColor::Orange,
                ConditionType::DaysSinceContact,
                Operator::Gt,
                7.0,
            ),
            rule(
                "thin-pipeline",
                HealthColor::Yellow,
                ConditionType::CandidatesTotal,
                Operator::Lt,
                5.0,
            ),
        ],
    }
}

pub(super) fn snapshot() -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot {
        candidates_total: 12,
        days_since_last_client_contact: 2,
        disqualification_rate_percent: 35.0,
        days_open: 20,
        ..MetricsSnapshot::default()
    };
    snapshot
        .candidates_by_stage
        .insert(HR_INTERVIEW_STAGE.to_string(), 3);
    snapshot.time_in_stage_days.insert(MANAGER_STAGE.to_string(), 2);
    snapshot
}

pub(super) fn job(id: &str) -> JobId {
    JobId(id.to_string())
}

#[derive(Default)]
pub(super) struct MemoryMetrics {
    snapshots: Mutex<HashMap<JobId, MetricsSnapshot>>,
    calls: AtomicUsize,
}

impl MemoryMetrics {
    pub(super) fn with(entries: Vec<(&str, MetricsSnapshot)>) -> Self {
        let metrics = Self::default();
        {
            let mut guard = metrics.snapshots.lock().expect("metrics mutex poisoned");
            for (id, snapshot) in entries {
                guard.insert(job(id), snapshot);
            }
        }
        metrics
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetricsProvider for MemoryMetrics {
    fn fetch_snapshot(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .expect("metrics mutex poisoned")
            .get(job_id)
            .cloned()
            .ok_or_else(|| MetricsUnavailableError::new(job_id.clone(), "no metrics recorded"))
    }
}

/// Sleeps for one job, panics for another, and serves the rest from memory.
pub(super) struct UnreliableMetrics {
    pub(super) inner: MemoryMetrics,
    pub(super) slow_job: JobId,
    pub(super) panicking_job: JobId,
    pub(super) delay: Duration,
}

impl MetricsProvider for UnreliableMetrics {
    fn fetch_snapshot(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        if job_id == &self.slow_job {
            std::thread::sleep(self.delay);
        }
        if job_id == &self.panicking_job {
            panic!("metrics backend crashed");
        }
        self.inner.fetch_snapshot(job_id)
    }
}

/// Fails a fixed number of times before serving a snapshot.
pub(super) struct FlakyMetrics {
    pub(super) failures_left: AtomicUsize,
    pub(super) snapshot: MetricsSnapshot,
}

impl MetricsProvider for FlakyMetrics {
    fn fetch_snapshot(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(MetricsUnavailableError::new(job_id.clone(), "ats timeout"));
        }
        Ok(self.snapshot.clone())
    }
}

/// Hangs on every call and records how many calls overlap.
#[derive(Default)]
pub(super) struct HangingMetrics {
    pub(super) delay: Duration,
    pub(super) in_flight: AtomicUsize,
    pub(super) peak: AtomicUsize,
}

impl MetricsProvider for HangingMetrics {
    fn fetch_snapshot(&self, job_id: &JobId) -> Result<MetricsSnapshot, MetricsUnavailableError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Err(MetricsUnavailableError::new(job_id.clone(), "ats hung"))
    }
}

pub(super) fn batch_config() -> BatchConfig {
    BatchConfig {
        fetch_timeout: Duration::from_millis(500),
        max_concurrency: 4,
        metrics_retries: 0,
    }
}

pub(super) type TestService =
    JobHealthService<InMemoryProfileStore, MemoryMetrics, InMemoryJobAssignments>;

pub(super) fn build_service(
    metrics: MemoryMetrics,
) -> (
    TestService,
    Arc<InMemoryProfileStore>,
    Arc<InMemoryJobAssignments>,
) {
    let store = Arc::new(
        InMemoryProfileStore::with_profiles(vec![standard_profile()]).expect("profiles valid"),
    );
    let assignments = Arc::new(InMemoryJobAssignments::new());
    let service = JobHealthService::new(
        store.clone(),
        Arc::new(metrics),
        assignments.clone(),
        batch_config(),
    );
    (service, store, assignments)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
