use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use partner_cabinet::audit::{AuditAction, AuditError, AuditEvent, AuditSink};
use partner_cabinet::clock::FixedClock;
use partner_cabinet::config::PortalConfig;
use partner_cabinet::integrations::crm::{ActivationOutcome, CrmSettings, ResponseMode};
use partner_cabinet::random::ScriptedRandom;
use partner_cabinet::workflows::contract::{
    ActivationBlocker, ContractId, ContractRecord, ContractRepository, ContractStatus,
    ContractWorkflowService, CorporateTerms, DraftCommand, KdpStatus, ReportFilter,
    RepositoryError, ServiceError,
};

const OPERATOR: &str = "operator1@silkroad.kz";
const IIN: &str = "850315300123";

#[derive(Default)]
struct VecRepository {
    records: Mutex<Vec<ContractRecord>>,
}

impl VecRepository {
    fn snapshot(&self) -> Vec<ContractRecord> {
        self.records.lock().expect("repository mutex poisoned").clone()
    }
}

impl ContractRepository for VecRepository {
    fn upsert(&self, record: ContractRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.retain(|existing| existing.id != record.id);
        guard.push(record);
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
        let mut records = self.snapshot();
        records.reverse();
        Ok(records)
    }
}

#[derive(Default)]
struct VecAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl VecAudit {
    fn actions(&self) -> Vec<AuditAction> {
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .map(|event| event.action)
            .collect()
    }
}

impl AuditSink for VecAudit {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("audit mutex poisoned").push(event);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let guard = self.events.lock().expect("audit mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

type Service = ContractWorkflowService<VecRepository, VecAudit>;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

fn service(mode: ResponseMode, crm_chances: Vec<bool>) -> (Service, Arc<VecRepository>, Arc<VecAudit>) {
    let repository = Arc::new(VecRepository::default());
    let audit = Arc::new(VecAudit::default());
    let service = ContractWorkflowService::builder(repository.clone(), audit.clone())
        .clock(Arc::new(FixedClock::new(today())))
        .portal(PortalConfig {
            consent_latency: Duration::ZERO,
            ..PortalConfig::default()
        })
        .crm_settings(CrmSettings {
            mode,
            latency_ms: 0,
            timeout_probability: 0.5,
            ..CrmSettings::default()
        })
        .crm_random(Box::new(ScriptedRandom::new().with_chances(crm_chances)))
        .consent_random(Box::new(ScriptedRandom::new()))
        .intake_random(Box::new(ScriptedRandom::new()))
        .build();
    (service, repository, audit)
}

fn open_turkey_draft(service: &Service) {
    service.login(OPERATOR).expect("operator signs in");
    service.start_draft().expect("draft opens");
    for command in [
        DraftCommand::SelectProduct {
            product: "travel".to_string(),
        },
        DraftCommand::AddTerritory {
            code: "TR".to_string(),
        },
    ] {
        service.apply(command).expect("command applies");
    }
}

fn corporate_terms() -> CorporateTerms {
    CorporateTerms {
        client_company: "Air Astana".to_string(),
        discount_percent: Some(100.0),
        dms_number: "DMS-2026-0007".to_string(),
        ..CorporateTerms::default()
    }
}

#[tokio::test]
async fn waived_consent_is_requested_after_corporate_terms_are_cleared() {
    let (service, repository, audit) = service(ResponseMode::ForcedSuccess, Vec::new());
    open_turkey_draft(&service);
    service
        .apply(DraftCommand::SetCorporateTerms {
            terms: corporate_terms(),
        })
        .expect("corporate terms set");
    let intake = service.add_iin_person(IIN).await.expect("person added");
    let person = &intake.view.expect("draft view").draft.persons[0];
    assert_eq!(person.kdp_status, KdpStatus::NotRequired);

    let view = service
        .apply(DraftCommand::SetCorporateTerms {
            terms: CorporateTerms::default(),
        })
        .expect("corporate terms cleared");
    assert!(!view.can_activate);
    assert!(view
        .blockers
        .contains(&ActivationBlocker::PersonNotReady { index: 0 }));

    let saved = service.save_draft().expect("draft saved");
    assert_eq!(saved.status, ContractStatus::Draft);
    assert!(matches!(service.current_draft(), Err(ServiceError::NoDraft)));

    service.reopen(&saved.id).expect("draft reopens");
    let view = service
        .confirm_pending_consents()
        .await
        .expect("consents requested");
    assert_eq!(view.draft.persons[0].kdp_status, KdpStatus::Confirmed);
    assert!(view.can_activate);
    assert_eq!(view.premium.total, 15_466);

    let result = service.activate().await.expect("activation runs");
    assert_eq!(result.record.id, saved.id);
    assert_eq!(result.record.status, ContractStatus::Active);
    assert!(result
        .record
        .policy_number
        .as_deref()
        .is_some_and(|number| number.starts_with("SRT-VZR-2026-")));

    let stored = repository.snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, ContractStatus::Active);

    let actions = audit.actions();
    for expected in [
        AuditAction::SaveDraft,
        AuditAction::ReopenDraft,
        AuditAction::RequestKdp,
        AuditAction::KdpConfirmed,
        AuditAction::RegistrySubmitted,
    ] {
        assert!(actions.contains(&expected), "missing {expected:?}");
    }
}

#[tokio::test]
async fn timed_out_activation_can_be_retried_under_the_same_id() {
    let (service, repository, _) = service(ResponseMode::Automatic, vec![true]);
    open_turkey_draft(&service);
    service.add_iin_person(IIN).await.expect("person added");

    let first = service.activate().await.expect("timeout is not an error");
    match &first.outcome {
        ActivationOutcome::Rejected(rejection) => assert!(rejection.is_timeout()),
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(first.record.status, ContractStatus::Rejected);

    let second = service.activate().await.expect("retry runs");
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.record.status, ContractStatus::Active);
    assert!(second.record.rejection.is_none());
    assert_eq!(second.record.crm_id.as_deref(), Some("CRM-100000"));

    let stored = repository.snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(service.crm_log().expect("log readable").len(), 2);
}

#[tokio::test]
async fn owner_reports_cover_contracts_of_every_company() {
    let (service, _, audit) = service(ResponseMode::ForcedSuccess, Vec::new());
    open_turkey_draft(&service);
    service.add_iin_person(IIN).await.expect("person added");
    service.activate().await.expect("activation runs");

    service.login("owner@insurance.kz").expect("owner signs in");
    let summary = service
        .report_summary(&ReportFilter::default())
        .expect("owner reports");
    assert_eq!(summary.total_contracts, 1);
    assert_eq!(summary.total_premium, 15_466);
    assert_eq!(summary.rejected, 0);

    let dashboard = service.dashboard().expect("dashboard builds");
    assert_eq!(dashboard.active, 1);
    assert_eq!(dashboard.active_premium, 15_466);

    let rows = service
        .export_report(&ReportFilter::default())
        .expect("owner exports");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].author_email, OPERATOR);
    assert!(audit.actions().contains(&AuditAction::ExportPerformed));
}
