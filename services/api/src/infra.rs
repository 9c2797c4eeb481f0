use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use partner_cabinet::audit::{seed_events, AuditError, AuditEvent, AuditSink};
use partner_cabinet::clock::Clock;
use partner_cabinet::config::PortalConfig;
use partner_cabinet::integrations::crm::{seed_entries, CrmSettings};
use partner_cabinet::reference::ReferenceData;
use partner_cabinet::workflows::contract::{
    seed_contracts, ContractId, ContractRecord, ContractRepository, ContractWorkflowService,
    RepositoryError,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub(crate) type PortalService = ContractWorkflowService<InMemoryContractRepository, InMemoryAuditSink>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryContractRepository {
    records: Arc<Mutex<HashMap<ContractId, ContractRecord>>>,
}

impl InMemoryContractRepository {
    pub(crate) fn seeded(records: Vec<ContractRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
}

impl ContractRepository for InMemoryContractRepository {
    fn upsert(&self, record: ContractRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove(&self, id: &ContractId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id);
        Ok(())
    }

    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<ContractRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<ContractRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub(crate) fn seeded(events: Vec<AuditEvent>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut guard = self.events.lock().expect("audit mutex poisoned");
        guard.push(event);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let guard = self.events.lock().expect("audit mutex poisoned");
        let mut events = guard.clone();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }
}

/// Service over in-memory stores holding the seed contracts, audit trail and CRM log.
pub(crate) fn seeded_service(
    clock: Arc<dyn Clock>,
    portal: PortalConfig,
    crm: CrmSettings,
) -> Arc<PortalService> {
    let today = clock.today();
    let reference = Arc::new(ReferenceData::standard());
    let repository = Arc::new(InMemoryContractRepository::seeded(seed_contracts(
        &reference, today,
    )));
    let audit = Arc::new(InMemoryAuditSink::seeded(seed_events(today)));

    Arc::new(
        ContractWorkflowService::builder(repository, audit)
            .reference(reference)
            .clock(clock)
            .portal(portal)
            .crm_settings(crm)
            .crm_log(seed_entries(today))
            .build(),
    )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use partner_cabinet::clock::FixedClock;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    #[test]
    fn seeded_repository_lists_newest_first() {
        let reference = ReferenceData::standard();
        let repository = InMemoryContractRepository::seeded(seed_contracts(&reference, today()));

        let records = repository.all().expect("records listed");
        assert_eq!(records.len(), 10);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[test]
    fn remove_forgets_the_record_and_ignores_unknown_ids() {
        let reference = ReferenceData::standard();
        let records = seed_contracts(&reference, today());
        let repository = InMemoryContractRepository::seeded(records.clone());

        repository.remove(&records[0].id).expect("record removed");
        repository
            .remove(&ContractId::new("cnt-missing"))
            .expect("unknown id ignored");

        assert!(repository.fetch(&records[0].id).expect("fetch").is_none());
        assert_eq!(repository.all().expect("records listed").len(), 9);
    }

    #[test]
    fn audit_sink_returns_latest_events_first() {
        let sink = InMemoryAuditSink::seeded(seed_events(today()));
        let recent = sink.recent(3).expect("events listed");

        assert_eq!(recent.len(), 3);
        assert!(recent
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }

    #[test]
    fn seeded_service_starts_with_seed_data() {
        let service = seeded_service(
            Arc::new(FixedClock::new(today())),
            PortalConfig::default(),
            CrmSettings::default(),
        );

        service
            .login("owner@insurance.kz")
            .expect("owner signs in");
        assert_eq!(service.contracts().expect("contracts listed").len(), 10);
        assert!(!service.crm_log().expect("log readable").is_empty());
        assert!(!service.recent_audit(5).expect("audit readable").is_empty());
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert_eq!(parse_date(" 2026-03-02 "), Ok(today()));
        assert!(parse_date("02.03.2026").is_err());
    }
}
