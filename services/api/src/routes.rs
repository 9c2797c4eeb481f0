use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use partner_cabinet::audit::AuditSink;
use partner_cabinet::workflows::contract::{
    contract_router, ContractRepository, ContractWorkflowService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_portal_routes<R, A>(service: Arc<ContractWorkflowService<R, A>>) -> axum::Router
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    contract_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::seeded_service;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use partner_cabinet::clock::FixedClock;
    use partner_cabinet::config::PortalConfig;
    use partner_cabinet::integrations::crm::{CrmSettings, ResponseMode};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    fn app(ready: bool) -> axum::Router {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        let portal = PortalConfig {
            consent_latency: Duration::ZERO,
            rng_seed: Some(11),
            ..PortalConfig::default()
        };
        let crm = CrmSettings {
            mode: ResponseMode::ForcedSuccess,
            latency_ms: 0,
            ..CrmSettings::default()
        };
        with_portal_routes(seeded_service(Arc::new(FixedClock::new(today)), portal, crm))
            .layer(Extension(app_state(ready)))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let response = app(false).oneshot(get("/ready")).await.expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "initializing");

        let response = app(true).oneshot(get("/ready")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_render_as_prometheus_text() {
        let response = app(true).oneshot(get("/metrics")).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|value| value.as_bytes()),
            Some("text/plain; version=0.0.4".as_bytes())
        );
    }

    #[tokio::test]
    async fn contract_routes_are_mounted_next_to_health_checks() {
        let app = app(true);

        let login = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/session/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"owner@insurance.kz"}"#))
                    .expect("request"),
            )
            .await
            .expect("login response");
        assert_eq!(login.status(), StatusCode::OK);

        let contracts = app
            .oneshot(get("/api/v1/contracts"))
            .await
            .expect("contracts response");
        assert_eq!(contracts.status(), StatusCode::OK);
        assert_eq!(
            json_body(contracts).await.as_array().map(Vec::len),
            Some(10)
        );
    }
}
