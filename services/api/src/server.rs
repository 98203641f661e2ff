use crate::cli::ServeArgs;
use crate::infra::{assignments_from, default_profile, AppState, FixtureMetricsProvider, Fixtures};
use crate::routes::with_health_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use job_health::config::AppConfig;
use job_health::error::AppError;
use job_health::health::{load_profiles, InMemoryProfileStore, JobHealthService};
use job_health::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let settings = &config.evaluation;
    let profiles = match &settings.profiles_path {
        Some(path) => load_profiles(path)?,
        None => {
            warn!("no profile file configured; installing the standard profile");
            vec![default_profile()]
        }
    };
    let (store, rejected) = InMemoryProfileStore::with_valid_profiles(profiles);
    if !rejected.is_empty() {
        warn!(rejected = rejected.len(), "some health profiles failed validation and were skipped");
    }
    let store = Arc::new(store);

    let fixtures = match &settings.fixtures_path {
        Some(path) => Fixtures::load(path)?,
        None => Fixtures::default(),
    };
    info!(
        snapshots = fixtures.snapshots.len(),
        assignments = fixtures.assignments.len(),
        "metrics fixtures loaded"
    );
    let metrics = Arc::new(FixtureMetricsProvider::new(fixtures.snapshots));
    let assignments = Arc::new(assignments_from(fixtures.assignments));

    let service = Arc::new(JobHealthService::new(
        store,
        metrics,
        assignments,
        settings.batch_config(),
    ));

    let app = with_health_routes(service, settings.enabled)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        enabled = config.evaluation.enabled,
        "job health service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
