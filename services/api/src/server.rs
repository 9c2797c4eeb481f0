use crate::cli::ServeArgs;
use crate::infra::{seeded_service, AppState};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use partner_cabinet::clock::SystemClock;
use partner_cabinet::config::AppConfig;
use partner_cabinet::error::AppError;
use partner_cabinet::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed) = args.seed {
        config.portal.rng_seed = Some(seed);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = seeded_service(
        Arc::new(SystemClock),
        config.portal.clone(),
        config.crm.clone(),
    );

    let app = with_portal_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        crm_mode = config.crm.mode.label(),
        seeded = config.portal.rng_seed.is_some(),
        "partner cabinet ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
