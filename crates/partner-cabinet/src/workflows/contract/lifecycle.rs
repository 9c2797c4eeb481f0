use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ContractId, ContractRecord, ContractStatus, DraftContract};
use crate::integrations::crm::{ActivationReceipt, Rejection};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("a draft cannot be committed without {0}")]
    IncompleteDraft(&'static str),
    #[error("contract {id} is {state} and cannot be edited", state = .status.label())]
    NotEditable {
        id: ContractId,
        status: ContractStatus,
    },
    #[error("contract {id} is {state}, only active contracts can be closed", state = .status.label())]
    NotActive {
        id: ContractId,
        status: ContractStatus,
    },
    #[error("coverage of contract {id} started on {start_date}")]
    CoverageStarted {
        id: ContractId,
        start_date: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingAction {
    Void,
    Cancel,
}

impl ClosingAction {
    pub const fn target(self) -> ContractStatus {
        match self {
            Self::Void => ContractStatus::Voided,
            Self::Cancel => ContractStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusInfo {
    pub status: ContractStatus,
    pub name: &'static str,
    pub editable: bool,
}

pub fn status_catalog() -> Vec<StatusInfo> {
    ContractStatus::all()
        .into_iter()
        .map(|status| StatusInfo {
            status,
            name: status.display_name(),
            editable: status.is_editable(),
        })
        .collect()
}

/// Snapshot of the draft under `status`.
pub fn commit_draft(
    draft: &DraftContract,
    status: ContractStatus,
    created_at: DateTime<Utc>,
) -> Result<ContractRecord, LifecycleError> {
    let product = draft
        .product
        .clone()
        .ok_or(LifecycleError::IncompleteDraft("a product"))?;
    let general_contract_id = draft
        .general_contract_id
        .clone()
        .ok_or(LifecycleError::IncompleteDraft("a general contract"))?;
    let company_id = draft
        .company_id
        .clone()
        .ok_or(LifecycleError::IncompleteDraft("an owning company"))?;
    let created_by = draft
        .created_by
        .clone()
        .ok_or(LifecycleError::IncompleteDraft("an author"))?;

    Ok(ContractRecord {
        id: draft.id.clone(),
        external_id: draft.external_id.clone(),
        product,
        status,
        company_id,
        created_by,
        created_at,
        activated_at: None,
        rejected_at: None,
        voided_at: None,
        cancelled_at: None,
        general_contract_id,
        blank_type: draft.blank_type,
        blank_id: draft.blank_id.clone(),
        policy_number: None,
        crm_id: None,
        territories: draft.territories.clone(),
        travel: Some(draft.travel.clone()),
        start_date: draft.start_date,
        end_date: draft.end_date,
        persons: draft.persons.clone(),
        corporate: draft.corporate.is_touched().then(|| draft.corporate.clone()),
        kdp_confirmed: draft.kdp_confirmed,
        premium: draft.premium,
        rejection: None,
        cancellation_reason: None,
    })
}

pub fn ensure_reopenable(record: &ContractRecord) -> Result<(), LifecycleError> {
    if record.status.is_editable() {
        Ok(())
    } else {
        Err(LifecycleError::NotEditable {
            id: record.id.clone(),
            status: record.status,
        })
    }
}

pub fn mark_activated(record: &mut ContractRecord, receipt: &ActivationReceipt, at: DateTime<Utc>) {
    record.status = ContractStatus::Active;
    record.activated_at = Some(at);
    record.crm_id = Some(receipt.crm_id.clone());
    record.policy_number = Some(receipt.policy_number.clone());
    record.rejection = None;
}

pub fn mark_rejected(record: &mut ContractRecord, rejection: &Rejection, at: DateTime<Utc>) {
    record.status = ContractStatus::Rejected;
    record.rejected_at = Some(at);
    record.rejection = Some(rejection.clone());
}

/// `active -> voided | cancelled`, only while coverage has not started.
pub fn close(
    record: &ContractRecord,
    action: ClosingAction,
    reason: Option<String>,
    today: NaiveDate,
    at: DateTime<Utc>,
) -> Result<ContractRecord, LifecycleError> {
    if record.status != ContractStatus::Active {
        return Err(LifecycleError::NotActive {
            id: record.id.clone(),
            status: record.status,
        });
    }
    if !record.coverage_not_started(today) {
        return Err(LifecycleError::CoverageStarted {
            id: record.id.clone(),
            start_date: record.start_date,
        });
    }

    let mut closed = record.clone();
    closed.status = action.target();
    match action {
        ClosingAction::Void => closed.voided_at = Some(at),
        ClosingAction::Cancel => closed.cancelled_at = Some(at),
    }
    closed.cancellation_reason = reason.filter(|reason| !reason.trim().is_empty());
    Ok(closed)
}
