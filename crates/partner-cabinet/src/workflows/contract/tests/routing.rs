use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

use crate::integrations::crm::ResponseMode;
use crate::random::ScriptedRandom;
use crate::workflows::contract::router::{
    contracts_handler, current_draft_handler, login_handler, LoginRequest,
};

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn bare(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn login_handler_returns_the_session() {
    let (service, _, _) = build_service();

    let response = login_handler::<MemoryRepository, MemoryAudit>(
        State(Arc::new(service)),
        axum::Json(LoginRequest {
            email: OPERATOR_EMAIL.to_string(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["user"]["email"], OPERATOR_EMAIL);
    assert_eq!(body["role"], "operator_partner");
    assert_eq!(body["capabilities"]["create"], true);
    assert_eq!(body["capabilities"]["reports"], false);
}

#[tokio::test]
async fn draft_access_without_session_conflicts() {
    let (service, _, _) = build_service();

    let response =
        current_draft_handler::<MemoryRepository, MemoryAudit>(State(Arc::new(service))).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn storage_outage_maps_to_server_error() {
    let service = service_over(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryAudit::default()),
        quiet_crm(ResponseMode::ForcedSuccess),
        ScriptedRandom::new(),
        ScriptedRandom::new(),
    );
    service.login(OPERATOR_EMAIL).expect("operator signs in");

    let response =
        contracts_handler::<UnavailableRepository, MemoryAudit>(State(Arc::new(service))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("database offline")));
}

#[tokio::test]
async fn draft_is_edited_through_json_commands() {
    let (service, _, _) = build_service();
    let app = router_with_service(service);

    let login = app
        .clone()
        .oneshot(post_json(
            "/api/v1/session/login",
            json!({ "email": OPERATOR_EMAIL }),
        ))
        .await
        .expect("login response");
    assert_eq!(login.status(), StatusCode::OK);

    let started = app
        .clone()
        .oneshot(bare("POST", "/api/v1/drafts"))
        .await
        .expect("draft response");
    assert_eq!(started.status(), StatusCode::CREATED);

    let selected = app
        .clone()
        .oneshot(post_json(
            "/api/v1/drafts/current/commands",
            json!({ "op": "select_product", "product": "travel" }),
        ))
        .await
        .expect("command response");
    assert_eq!(selected.status(), StatusCode::OK);
    let body = read_json_body(selected).await;
    assert_eq!(body["draft"]["product"], "travel");
    assert_eq!(body["draft"]["general_contract_id"], "gc-1");
    assert_eq!(body["can_activate"], false);

    let unknown = app
        .clone()
        .oneshot(post_json(
            "/api/v1/drafts/current/commands",
            json!({ "op": "add_territory", "code": "XX" }),
        ))
        .await
        .expect("command response");
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let activation = app
        .clone()
        .oneshot(bare("POST", "/api/v1/drafts/current/activate"))
        .await
        .expect("activation response");
    assert_eq!(activation.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(activation).await;
    let blockers = body["blockers"].as_array().expect("blocker list");
    assert!(blockers
        .iter()
        .any(|blocker| blocker["blocker"] == "no_territory"));
}

#[tokio::test]
async fn iin_intake_and_activation_over_http() {
    let (service, _, _) = build_service();
    travel_draft(&service);
    let app = router_with_service(service);

    let added = app
        .clone()
        .oneshot(post_json(
            "/api/v1/drafts/current/persons/iin",
            json!({ "iin": SEEDED_IIN }),
        ))
        .await
        .expect("intake response");
    assert_eq!(added.status(), StatusCode::OK);
    let body = read_json_body(added).await;
    assert_eq!(body["view"]["draft"]["persons"][0]["iin"], SEEDED_IIN);

    let activated = app
        .clone()
        .oneshot(bare("POST", "/api/v1/drafts/current/activate"))
        .await
        .expect("activation response");
    assert_eq!(activated.status(), StatusCode::OK);
    let body = read_json_body(activated).await;
    assert_eq!(body["record"]["status"], "active");
    assert_eq!(body["outcome"]["outcome"], "activated");
    assert_eq!(body["registry"], "submitted");

    let listed = app
        .clone()
        .oneshot(bare("GET", "/api/v1/contracts"))
        .await
        .expect("contracts response");
    let body = read_json_body(listed).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn missing_capability_is_forbidden() {
    let (service, _, _) = build_service();
    service.login(OPERATOR_EMAIL).expect("operator signs in");
    let app = router_with_service(service);

    let report = app
        .clone()
        .oneshot(bare("GET", "/api/v1/reports/summary"))
        .await
        .expect("report response");
    assert_eq!(report.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(report).await;
    assert_eq!(body["capability"], "reports");

    let cleared = app
        .oneshot(bare("DELETE", "/api/v1/crm/log"))
        .await
        .expect("clear response");
    assert_eq!(cleared.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_contract_is_not_found() {
    let (service, _, _) = build_service();
    service.login(OPERATOR_EMAIL).expect("operator signs in");
    let app = router_with_service(service);

    let response = app
        .oneshot(post_json(
            "/api/v1/contracts/cnt-missing/void",
            json!({ "reason": "duplicate" }),
        ))
        .await
        .expect("void response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_clears_the_session() {
    let (service, _, _) = build_service();
    service.login(OPERATOR_EMAIL).expect("operator signs in");
    let app = router_with_service(service);

    let logout = app
        .clone()
        .oneshot(bare("POST", "/api/v1/session/logout"))
        .await
        .expect("logout response");
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let session = app
        .oneshot(bare("GET", "/api/v1/session/capabilities"))
        .await
        .expect("session response");
    assert_eq!(session.status(), StatusCode::OK);
    let body = read_json_body(session).await;
    assert!(body["user"].is_null());
}
