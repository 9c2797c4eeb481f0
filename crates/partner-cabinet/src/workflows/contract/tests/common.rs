use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::audit::{AuditAction, AuditError, AuditEvent, AuditSink};
use crate::clock::FixedClock;
use crate::config::PortalConfig;
use crate::integrations::crm::{CrmSettings, ResponseMode};
use crate::random::{RandomSource, ScriptedRandom};
use crate::reference::{CompanyId, ReferenceData, UserId};
use crate::workflows::contract::domain::{
    ContractId, ContractRecord, ContractStatus, CorporateTerms, DraftContract,
};
use crate::workflows::contract::editor::{DraftCommand, DraftEditor, DraftEnvironment, DraftLimits};
use crate::workflows::contract::intake::ManualPerson;
use crate::workflows::contract::pricing::PremiumCalculator;
use crate::workflows::contract::repository::{ContractRepository, RepositoryError};
use crate::workflows::contract::{contract_router, ContractWorkflowService};

pub(super) const OPERATOR_EMAIL: &str = "operator1@silkroad.kz";
pub(super) const SEEDED_IIN: &str = "850315300123";
pub(super) const SECOND_SEEDED_IIN: &str = "900722400234";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn reference() -> Arc<ReferenceData> {
    Arc::new(ReferenceData::standard())
}

pub(super) fn environment() -> DraftEnvironment {
    DraftEnvironment::new(today(), DraftLimits::default())
}

/// Fresh draft owned by `u-1` of `tc-1`, whose travel general contract offers corporate benefits.
pub(super) fn editor() -> DraftEditor {
    editor_for("tc-1", "u-1")
}

pub(super) fn editor_for(company: &str, user: &str) -> DraftEditor {
    let draft = DraftContract::fresh(
        ContractId::new("cnt-test"),
        "ext-test".to_string(),
        today(),
        Some(CompanyId::new(company)),
        Some(UserId::new(user)),
    );
    DraftEditor::new(draft, reference(), PremiumCalculator::default(), today())
}

pub(super) fn run(editor: &mut DraftEditor, command: DraftCommand) {
    editor
        .apply(command, &environment(), &mut ScriptedRandom::new())
        .expect("command applies");
}

pub(super) fn travel_to_turkey(editor: &mut DraftEditor) {
    run(
        editor,
        DraftCommand::SelectProduct {
            product: "travel".to_string(),
        },
    );
    run(
        editor,
        DraftCommand::AddTerritory {
            code: "TR".to_string(),
        },
    );
}

pub(super) fn manual(last: &str, first: &str, birth_date: NaiveDate) -> ManualPerson {
    ManualPerson {
        last_name: last.to_string(),
        first_name: first.to_string(),
        birth_date: Some(birth_date),
        document_type: "passport".to_string(),
        document_number: "N0000001".to_string(),
        ..ManualPerson::default()
    }
}

pub(super) fn full_discount() -> CorporateTerms {
    CorporateTerms {
        client_company: "KazMunayGas".to_string(),
        discount_percent: Some(100.0),
        dms_number: "DMS-2026-0042".to_string(),
        ..CorporateTerms::default()
    }
}

pub(super) fn quiet_crm(mode: ResponseMode) -> CrmSettings {
    CrmSettings {
        mode,
        latency_ms: 0,
        timeout_probability: 0.0,
        ..CrmSettings::default()
    }
}

pub(super) fn portal() -> PortalConfig {
    PortalConfig {
        consent_latency: Duration::ZERO,
        rng_seed: Some(7),
        ..PortalConfig::default()
    }
}

pub(super) type TestService = ContractWorkflowService<MemoryRepository, MemoryAudit>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryAudit>) {
    build_service_with(
        quiet_crm(ResponseMode::ForcedSuccess),
        ScriptedRandom::new(),
        ScriptedRandom::new(),
    )
}

pub(super) fn build_service_with(
    crm: CrmSettings,
    crm_random: ScriptedRandom,
    consent_random: ScriptedRandom,
) -> (TestService, Arc<MemoryRepository>, Arc<MemoryAudit>) {
    let repository = Arc::new(MemoryRepository::default());
    let audit = Arc::new(MemoryAudit::default());
    let service = service_over(repository.clone(), audit.clone(), crm, crm_random, consent_random);
    (service, repository, audit)
}

pub(super) fn service_over<R>(
    repository: Arc<R>,
    audit: Arc<MemoryAudit>,
    crm: CrmSettings,
    crm_random: ScriptedRandom,
    consent_random: ScriptedRandom,
) -> ContractWorkflowService<R, MemoryAudit>
where
    R: ContractRepository + 'static,
{
    let crm_random: Box<dyn RandomSource> = Box::new(crm_random);
    let consent_random: Box<dyn RandomSource> = Box::new(consent_random);
    ContractWorkflowService::builder(repository, audit)
        .reference(reference())
        .clock(Arc::new(FixedClock::new(today())))
        .portal(portal())
        .crm_settings(crm)
        .crm_random(crm_random)
        .consent_random(consent_random)
        .intake_random(Box::new(ScriptedRandom::new()))
        .build()
}

/// Signs in the `tc-1` operator and opens a travel draft to Turkey.
pub(super) fn travel_draft(service: &TestService) {
    service.login(OPERATOR_EMAIL).expect("operator signs in");
    service.start_draft().expect("draft opens");
    service
        .apply(DraftCommand::SelectProduct {
            product: "travel".to_string(),
        })
        .expect("travel selected");
    service
        .apply(DraftCommand::AddTerritory {
            code: "TR".to_string(),
        })
        .expect("territory added");
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<Vec<ContractRecord>>>,
    failing_upsert: Arc<Mutex<Option<ContractStatus>>>,
}

impl MemoryRepository {
    pub(super) fn seeded(records: Vec<ContractRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            ..Self::default()
        }
    }

    /// The next upsert of a record in `status` fails once.
    pub(super) fn fail_next_upsert(&self, status: ContractStatus) {
        *self.failing_upsert.lock().expect("repository mutex poisoned") = Some(status);
    }

    pub(super) fn statuses(&self) -> Vec<ContractStatus> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .iter()
            .map(|record| record.status)
            .collect()
    }
}

impl ContractRepository for MemoryRepository {
    fn upsert(&self, record: ContractRecord) -> Result<(), RepositoryError> {
        {
            let mut failing = self.failing_upsert.lock().expect("repository mutex poisoned");
            if *failing == Some(record.status) {
                *failing = None;
                return Err(RepositoryError::Unavailable("write rejected".to_string()));
            }
        }
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => guard.push(record),
        }
        Ok(())
    }

    fn remove(&self, id: &ContractId) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .retain(|record| &record.id != id);
        Ok(())
    }

    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.iter().find(|record| &record.id == id).cloned())
    }

    fn all(&self) -> Result<Vec<ContractRecord>, RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned").clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

pub(super) struct UnavailableRepository;

impl ContractRepository for UnavailableRepository {
    fn upsert(&self, _record: ContractRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &ContractId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<ContractRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn used_blanks(&self) -> Result<HashSet<String>, RepositoryError> {
        Ok(HashSet::new())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
    failing_action: Arc<Mutex<Option<AuditAction>>>,
}

impl MemoryAudit {
    /// The next write of `action` fails once.
    pub(super) fn fail_next(&self, action: AuditAction) {
        *self.failing_action.lock().expect("audit mutex poisoned") = Some(action);
    }

    pub(super) fn actions(&self) -> Vec<AuditAction> {
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .map(|event| event.action)
            .collect()
    }

    pub(super) fn contains(&self, action: AuditAction) -> bool {
        self.actions().contains(&action)
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        {
            let mut failing = self.failing_action.lock().expect("audit mutex poisoned");
            if *failing == Some(event.action) {
                *failing = None;
                return Err(AuditError::Unavailable("sink offline".to_string()));
            }
        }
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .push(event);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let guard = self.events.lock().expect("audit mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    contract_router(Arc::new(service))
}
