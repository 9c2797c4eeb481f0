//! Business audit trail. Separate from tracing: these events are shown to users.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    Logout,
    RoleSwitch,
    SelectProduct,
    CreateDraft,
    SaveDraft,
    ReopenDraft,
    RequestKdp,
    KdpConfirmed,
    KdpDeclined,
    EsbdLookup,
    PersonAdded,
    PersonRemoved,
    ActivateRequest,
    CrmResponseOk,
    CrmResponseFail,
    RegistrySubmitted,
    RegistrySubmissionSkipped,
    ExportPerformed,
    VoidContract,
    CancelContract,
    SaveSettings,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::RoleSwitch => "role_switch",
            Self::SelectProduct => "select_product",
            Self::CreateDraft => "create_draft",
            Self::SaveDraft => "save_draft",
            Self::ReopenDraft => "reopen_draft",
            Self::RequestKdp => "request_kdp",
            Self::KdpConfirmed => "kdp_confirmed",
            Self::KdpDeclined => "kdp_declined",
            Self::EsbdLookup => "esbd_lookup",
            Self::PersonAdded => "person_added",
            Self::PersonRemoved => "person_removed",
            Self::ActivateRequest => "activate_request",
            Self::CrmResponseOk => "crm_response_ok",
            Self::CrmResponseFail => "crm_response_fail",
            Self::RegistrySubmitted => "registry_submitted",
            Self::RegistrySubmissionSkipped => "registry_submission_skipped",
            Self::ExportPerformed => "export_performed",
            Self::VoidContract => "void_contract",
            Self::CancelContract => "cancel_contract",
            Self::SaveSettings => "save_settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditObject {
    Session,
    Contract,
    Person,
    Report,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub object_type: AuditObject,
    pub object_id: Option<String>,
    pub detail: String,
}

/// Append-only destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
    /// Most recent events first.
    fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

fn at(day: NaiveDate, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    day.and_hms_opt(hour, minute, second)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now)
}

/// History shown on a fresh start, dated relative to `today`.
pub fn seed_events(today: NaiveDate) -> Vec<AuditEvent> {
    let yesterday = today - Duration::days(1);
    let rows = [
        ("ae-1", at(yesterday, 9, 15, 32), "u-1", AuditAction::Login, AuditObject::Session, "sess-001", "Signed in"),
        ("ae-2", at(yesterday, 9, 20, 45), "u-1", AuditAction::CreateDraft, AuditObject::Contract, "cnt-5", "Travel draft created"),
        ("ae-3", at(yesterday, 9, 25, 10), "u-1", AuditAction::EsbdLookup, AuditObject::Person, "iin-123", "Registry data requested"),
        ("ae-4", at(today, 8, 30, 0), "u-2", AuditAction::Login, AuditObject::Session, "sess-002", "Signed in"),
        ("ae-5", at(today, 8, 35, 22), "u-2", AuditAction::RequestKdp, AuditObject::Contract, "cnt-10", "Consent requested by SMS"),
        ("ae-6", at(today, 8, 36, 5), "u-2", AuditAction::KdpConfirmed, AuditObject::Contract, "cnt-10", "Consent confirmed"),
        ("ae-7", at(today, 8, 40, 15), "u-2", AuditAction::ActivateRequest, AuditObject::Contract, "cnt-10", "Sent to CRM for activation"),
    ];

    rows.into_iter()
        .map(|(id, timestamp, user, action, object_type, object_id, detail)| AuditEvent {
            id: id.to_string(),
            timestamp,
            user_id: Some(UserId::new(user)),
            action,
            object_type,
            object_id: Some(object_id.to_string()),
            detail: detail.to_string(),
        })
        .collect()
}
