use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::health::batch::{BatchConfig, BatchEntryView, BatchEvaluator, EvaluationError};
use crate::health::domain::{HealthColor, ProfileId};
use crate::health::store::InMemoryProfileStore;

fn store() -> Arc<InMemoryProfileStore> {
    let store = InMemoryProfileStore::with_profiles(vec![standard_profile()]);
    Arc::new(store.expect("valid profiles"))
}

fn store_profile<M>(
    evaluator: &BatchEvaluator<InMemoryProfileStore, M>,
) -> Arc<crate::health::domain::HealthProfile>
where
    M: crate::health::repository::MetricsProvider + 'static,
{
    evaluator
        .resolve_profile(&ProfileId("standard".to_string()))
        .expect("profile exists")
}

fn stuck_snapshot() -> crate::health::domain::MetricsSnapshot {
    let mut snapshot = snapshot();
    snapshot
        .time_in_stage_days
        .insert(MANAGER_STAGE.to_string(), 9);
    snapshot
}

#[tokio::test]
async fn failing_fetch_does_not_affect_other_jobs() {
    let metrics = MemoryMetrics::with(vec![("job-ok", snapshot()), ("job-red", stuck_snapshot())]);
    let evaluator = BatchEvaluator::new(store(), Arc::new(metrics), batch_config());
    let standard = ProfileId("standard".to_string());

    let entries = evaluator
        .evaluate_all(vec![
            (job("job-ok"), standard.clone()),
            (job("job-missing"), standard.clone()),
            (job("job-red"), standard),
        ])
        .await;

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].job_id, job("job-ok"));
    assert_eq!(entries[1].job_id, job("job-missing"));
    assert_eq!(entries[2].job_id, job("job-red"));

    let ok = entries[0].outcome.as_ref().expect("job-ok evaluated");
    assert_eq!(ok.color, HealthColor::Green);
    assert!(ok.metrics_available);

    let missing = entries[1].outcome.as_ref().expect("fails closed, not an error");
    assert_eq!(missing.color, HealthColor::Gray);
    assert!(!missing.metrics_available);
    assert!(missing.matched_rule_id.is_none());
    assert!(missing.warnings[0].contains("job-missing"));

    let red = entries[2].outcome.as_ref().expect("job-red evaluated");
    assert_eq!(red.color, HealthColor::Red);
}

#[tokio::test]
async fn unknown_profile_is_a_per_job_error() {
    let metrics = MemoryMetrics::with(vec![("job-1", snapshot()), ("job-2", snapshot())]);
    let metrics = Arc::new(metrics);
    let evaluator = BatchEvaluator::new(store(), metrics.clone(), batch_config());

    let entries = evaluator
        .evaluate_all(vec![
            (job("job-1"), ProfileId("executive".to_string())),
            (job("job-2"), ProfileId("standard".to_string())),
        ])
        .await;

    match &entries[0].outcome {
        Err(EvaluationError::ProfileNotFound(id)) => assert_eq!(id.0, "executive"),
        other => panic!("expected profile not found, got {other:?}"),
    }
    assert!(entries[1].outcome.is_ok());
    assert_eq!(metrics.calls(), 1, "no fetch for jobs without a profile");
}

#[tokio::test]
async fn slow_and_panicking_fetches_fail_closed_without_stalling_siblings() {
    let metrics = UnreliableMetrics {
        inner: MemoryMetrics::with(vec![
            ("job-slow", snapshot()),
            ("job-fast", stuck_snapshot()),
        ]),
        slow_job: job("job-slow"),
        panicking_job: job("job-crash"),
        delay: Duration::from_millis(400),
    };
    let config = BatchConfig {
        fetch_timeout: Duration::from_millis(50),
        ..batch_config()
    };
    let evaluator = BatchEvaluator::new(store(), Arc::new(metrics), config);
    let standard = ProfileId("standard".to_string());

    let entries = evaluator
        .evaluate_all(vec![
            (job("job-slow"), standard.clone()),
            (job("job-crash"), standard.clone()),
            (job("job-fast"), standard),
        ])
        .await;

    let slow = entries[0].outcome.as_ref().expect("slow job fails closed");
    assert_eq!(slow.color, HealthColor::Gray);
    assert!(slow.warnings[0].contains("timed out"));

    let crashed = entries[1].outcome.as_ref().expect("crash fails closed");
    assert_eq!(crashed.color, HealthColor::Gray);

    let fast = entries[2].outcome.as_ref().expect("fast job evaluated");
    assert_eq!(fast.color, HealthColor::Red);
}

#[tokio::test]
async fn retries_recover_transient_fetch_failures() {
    let metrics = FlakyMetrics {
        failures_left: AtomicUsize::new(2),
        snapshot: stuck_snapshot(),
    };
    let config = BatchConfig {
        metrics_retries: 2,
        ..batch_config()
    };
    let evaluator = BatchEvaluator::new(store(), Arc::new(metrics), config);

    let entries = evaluator
        .evaluate_all(vec![(job("job-1"), ProfileId("standard".to_string()))])
        .await;

    let result = entries[0].outcome.as_ref().expect("evaluated");
    assert_eq!(result.color, HealthColor::Red);
    assert!(result.metrics_available);
}

#[tokio::test]
async fn retries_back_off_between_attempts() {
    let metrics = FlakyMetrics {
        failures_left: AtomicUsize::new(2),
        snapshot: stuck_snapshot(),
    };
    let config = BatchConfig {
        metrics_retries: 2,
        ..batch_config()
    };
    let evaluator = BatchEvaluator::new(store(), Arc::new(metrics), config);
    let started = std::time::Instant::now();

    let result = evaluator
        .evaluate_one(job("job-1"), store_profile(&evaluator))
        .await;

    assert_eq!(result.color, HealthColor::Red);
    assert!(started.elapsed() >= Duration::from_millis(75));
}

#[tokio::test]
async fn without_retries_a_transient_failure_is_gray() {
    let metrics = FlakyMetrics {
        failures_left: AtomicUsize::new(1),
        snapshot: stuck_snapshot(),
    };
    let evaluator = BatchEvaluator::new(store(), Arc::new(metrics), batch_config());

    let entries = evaluator
        .evaluate_all(vec![(job("job-1"), ProfileId("standard".to_string()))])
        .await;

    let result = entries[0].outcome.as_ref().expect("evaluated");
    assert_eq!(result.color, HealthColor::Gray);
}

#[tokio::test]
async fn profile_edit_after_batch_start_does_not_mix_rule_sets() {
    let store = store();
    let evaluator = BatchEvaluator::new(
        store.clone(),
        Arc::new(MemoryMetrics::with(vec![("job-1", stuck_snapshot())])),
        batch_config(),
    );

    let snapshot = evaluator
        .resolve_profile(&ProfileId("standard".to_string()))
        .expect("profile exists");

    let mut edited = standard_profile();
    edited.rules.clear();
    store.save(edited).expect("edit saved");

    let result = evaluator.evaluate_one(job("job-1"), snapshot).await;
    assert_eq!(result.color, HealthColor::Red);

    let entries = evaluator
        .evaluate_all(vec![(job("job-1"), ProfileId("standard".to_string()))])
        .await;
    let after_edit = entries[0].outcome.as_ref().expect("evaluated");
    assert_eq!(after_edit.color, HealthColor::Green);
}

#[tokio::test]
async fn entry_view_tags_status() {
    let evaluator = BatchEvaluator::new(
        store(),
        Arc::new(MemoryMetrics::with(vec![("job-1", snapshot())])),
        batch_config(),
    );

    let entries = evaluator
        .evaluate_all(vec![
            (job("job-1"), ProfileId("standard".to_string())),
            (job("job-2"), ProfileId("ghost".to_string())),
        ])
        .await;

    assert!(matches!(entries[0].view(), BatchEntryView::Evaluated { .. }));
    let failed = serde_json::to_value(entries[1].view()).expect("serializes");
    assert_eq!(failed["status"], "error");
    assert_eq!(failed["jobId"], "job-2");
    assert!(failed["error"]
        .as_str()
        .expect("error string")
        .contains("ghost"));
}

#[tokio::test]
async fn hung_provider_calls_stay_within_concurrency_limit() {
    let metrics = Arc::new(HangingMetrics {
        delay: Duration::from_millis(300),
        ..HangingMetrics::default()
    });
    let config = BatchConfig {
        fetch_timeout: Duration::from_millis(30),
        max_concurrency: 1,
        metrics_retries: 2,
    };
    let evaluator = BatchEvaluator::new(store(), metrics.clone(), config);
    let standard = ProfileId("standard".to_string());

    let entries = evaluator
        .evaluate_all(
            ["job-1", "job-2", "job-3", "job-4"]
                .into_iter()
                .map(|id| (job(id), standard.clone()))
                .collect(),
        )
        .await;

    for entry in &entries {
        let result = entry.outcome.as_ref().expect("fails closed");
        assert_eq!(result.color, HealthColor::Gray);
        assert!(result.warnings[0].contains("timed out"));
    }
    assert!(metrics.in_flight.load(Ordering::SeqCst) <= 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(metrics.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_evaluations_share_the_batch_limit() {
    let metrics = Arc::new(HangingMetrics {
        delay: Duration::from_millis(200),
        ..HangingMetrics::default()
    });
    let config = BatchConfig {
        fetch_timeout: Duration::from_millis(20),
        max_concurrency: 1,
        metrics_retries: 0,
    };
    let evaluator = BatchEvaluator::new(store(), metrics.clone(), config);
    let profile = evaluator
        .resolve_profile(&ProfileId("standard".to_string()))
        .expect("profile exists");

    for id in ["job-1", "job-2", "job-3"] {
        let result = evaluator.evaluate_one(job(id), profile.clone()).await;
        assert_eq!(result.color, HealthColor::Gray);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(metrics.peak.load(Ordering::SeqCst), 1);
}
