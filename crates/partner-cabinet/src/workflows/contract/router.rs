use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::ContractId;
use super::editor::DraftCommand;
use super::report::ReportFilter;
use super::repository::ContractRepository;
use super::service::{ContractWorkflowService, LimitsUpdate, ServiceError};
use crate::audit::AuditSink;
use crate::integrations::crm::CrmSettings;
use crate::reference::RoleId;

const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RoleRequest {
    pub role: RoleId,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IinRequest {
    pub iin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CloseRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AuditQuery {
    pub limit: Option<usize>,
}

/// Router exposing the partner cabinet workflow over JSON.
pub fn contract_router<R, A>(service: Arc<ContractWorkflowService<R, A>>) -> Router
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/session/login", post(login_handler::<R, A>))
        .route("/api/v1/session/logout", post(logout_handler::<R, A>))
        .route("/api/v1/session/role", post(role_handler::<R, A>))
        .route("/api/v1/session/capabilities", get(session_handler::<R, A>))
        .route("/api/v1/reference", get(reference_handler::<R, A>))
        .route("/api/v1/products", get(products_handler::<R, A>))
        .route("/api/v1/drafts", post(start_draft_handler::<R, A>))
        .route("/api/v1/drafts/current", get(current_draft_handler::<R, A>))
        .route(
            "/api/v1/drafts/current/commands",
            post(command_handler::<R, A>),
        )
        .route(
            "/api/v1/drafts/current/persons/iin",
            post(iin_person_handler::<R, A>),
        )
        .route(
            "/api/v1/drafts/current/consents",
            post(consents_handler::<R, A>),
        )
        .route("/api/v1/drafts/current/save", post(save_handler::<R, A>))
        .route(
            "/api/v1/drafts/current/activate",
            post(activate_handler::<R, A>),
        )
        .route("/api/v1/contracts", get(contracts_handler::<R, A>))
        .route(
            "/api/v1/contracts/:contract_id/reopen",
            post(reopen_handler::<R, A>),
        )
        .route(
            "/api/v1/contracts/:contract_id/void",
            post(void_handler::<R, A>),
        )
        .route(
            "/api/v1/contracts/:contract_id/cancel",
            post(cancel_handler::<R, A>),
        )
        .route(
            "/api/v1/reports/summary",
            get(report_summary_handler::<R, A>),
        )
        .route(
            "/api/v1/reports/export",
            get(report_export_handler::<R, A>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<R, A>))
        .route("/api/v1/admin/users", get(admin_users_handler::<R, A>))
        .route("/api/v1/admin/blanks", get(admin_blanks_handler::<R, A>))
        .route(
            "/api/v1/admin/settings",
            put(admin_settings_handler::<R, A>),
        )
        .route(
            "/api/v1/crm/settings",
            get(crm_settings_handler::<R, A>).put(update_crm_settings_handler::<R, A>),
        )
        .route(
            "/api/v1/crm/log",
            get(crm_log_handler::<R, A>).delete(clear_crm_log_handler::<R, A>),
        )
        .route("/api/v1/audit", get(audit_handler::<R, A>))
        .with_state(service)
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ServiceError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "contract workflow failed");
    }

    let payload = match &err {
        ServiceError::NotReady(blockers) => json!({
            "error": err.to_string(),
            "blockers": blockers,
        }),
        ServiceError::Forbidden(capability) => json!({
            "error": err.to_string(),
            "capability": capability,
        }),
        _ => json!({
            "error": err.to_string(),
        }),
    };
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn login_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    axum::Json(request): axum::Json<LoginRequest>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.login(&request.email))
}

pub(crate) async fn logout_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    match service.logout() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn role_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    axum::Json(request): axum::Json<RoleRequest>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.switch_role(request.role))
}

pub(crate) async fn session_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    (StatusCode::OK, axum::Json(service.session_info())).into_response()
}

pub(crate) async fn reference_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    (StatusCode::OK, axum::Json(service.catalog())).into_response()
}

pub(crate) async fn products_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.products())
}

pub(crate) async fn start_draft_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::CREATED, service.start_draft())
}

pub(crate) async fn current_draft_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.current_draft())
}

pub(crate) async fn command_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    axum::Json(command): axum::Json<DraftCommand>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.apply(command))
}

pub(crate) async fn iin_person_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    axum::Json(request): axum::Json<IinRequest>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.add_iin_person(&request.iin).await)
}

pub(crate) async fn consents_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.confirm_pending_consents().await)
}

pub(crate) async fn save_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.save_draft())
}

pub(crate) async fn activate_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.activate().await)
}

pub(crate) async fn contracts_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.contracts())
}

pub(crate) async fn reopen_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    Path(contract_id): Path<String>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.reopen(&ContractId(contract_id)))
}

pub(crate) async fn void_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    Path(contract_id): Path<String>,
    request: Option<axum::Json<CloseRequest>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    let reason = request.and_then(|axum::Json(body)| body.reason);
    respond(
        StatusCode::OK,
        service.void_contract(&ContractId(contract_id), reason),
    )
}

pub(crate) async fn cancel_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    Path(contract_id): Path<String>,
    request: Option<axum::Json<CloseRequest>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    let reason = request.and_then(|axum::Json(body)| body.reason);
    respond(
        StatusCode::OK,
        service.cancel_contract(&ContractId(contract_id), reason),
    )
}

pub(crate) async fn report_summary_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    Query(filter): Query<ReportFilter>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.report_summary(&filter))
}

pub(crate) async fn report_export_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    Query(filter): Query<ReportFilter>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.export_report(&filter))
}

pub(crate) async fn dashboard_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.dashboard())
}

pub(crate) async fn admin_users_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.admin_users())
}

pub(crate) async fn admin_blanks_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.admin_blanks())
}

pub(crate) async fn admin_settings_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    axum::Json(update): axum::Json<LimitsUpdate>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.update_limits(update))
}

pub(crate) async fn crm_settings_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.crm_settings())
}

pub(crate) async fn update_crm_settings_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    axum::Json(settings): axum::Json<CrmSettings>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.update_crm_settings(settings))
}

pub(crate) async fn crm_log_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    respond(StatusCode::OK, service.crm_log())
}

pub(crate) async fn clear_crm_log_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    match service.clear_crm_log() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn audit_handler<R, A>(
    State(service): State<Arc<ContractWorkflowService<R, A>>>,
    Query(query): Query<AuditQuery>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    respond(StatusCode::OK, service.recent_audit(limit))
}
