use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use axum::http::StatusCode;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::consent::{CancelReason, ConsentError, ConsentFlow};
use super::domain::{
    BlankType, ContractId, ContractRecord, ContractStatus, DraftContract, DraftError, KdpStatus,
};
use super::editor::{ActivationBlocker, DraftCommand, DraftEditor, DraftEnvironment, DraftEvent, DraftLimits, DraftView};
use super::lifecycle::{self, status_catalog, ClosingAction, LifecycleError, StatusInfo};
use super::pricing::{PremiumCalculator, PricingConfig};
use super::report::{self, DashboardStats, ReportFilter, ReportRow, ReportSummary};
use super::repository::{ContractRepository, RepositoryError};
use crate::access::{Actor, Capability, PermissionEngine, Scope};
use crate::audit::{AuditAction, AuditError, AuditEvent, AuditObject, AuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::PortalConfig;
use crate::integrations::crm::{
    ActivationOutcome, ActivationRequest, CrmSettings, CrmSimulator, IntegrationLogEntry,
    SettingsError,
};
use crate::integrations::registry::{LookupSource, PersonRegistry};
use crate::integrations::sms::SmsConsentGateway;
use crate::random::{RandomSource, SeededRandom};
use crate::reference::{
    AmountPreset, BlankStatus, Country, ProductOffer, Program, ProgramVariant, ReasonInfo,
    ReferenceData, Region, RoleId, SportType, TripPurpose, User,
};

static CONTRACT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_contract_ids() -> (ContractId, String) {
    let id = CONTRACT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (ContractId(format!("cnt-{id:06}")), format!("ext-{id:06}"))
}

fn next_event_id() -> String {
    let id = EVENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("ev-{id:06}")
}

#[derive(Default)]
struct Session {
    actor: Actor,
    editor: Option<DraftEditor>,
}

/// Clears the activation latch when the activation call finishes, however it finishes.
struct InFlightLatch<'a>(&'a AtomicBool);

impl<'a> InFlightLatch<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightLatch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub user: Option<User>,
    pub role: Option<RoleId>,
    pub role_name: Option<String>,
    pub scope: Scope,
    pub capabilities: BTreeMap<Capability, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IinIntakeOutcome {
    pub flow: ConsentFlow,
    pub view: Option<DraftView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryStep {
    Submitted,
    Skipped,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationResult {
    pub record: ContractRecord,
    pub outcome: ActivationOutcome,
    pub registry: RegistryStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlankInventoryRow {
    pub company_id: String,
    pub company_name: String,
    pub blank_id: String,
    pub series: String,
    pub number: String,
    pub status: BlankStatus,
    pub used_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsUpdate {
    pub max_persons: Option<usize>,
    pub max_territories: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlankTypeInfo {
    pub blank_type: BlankType,
    pub name: &'static str,
}

/// Reference lookups the shell renders its pickers from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogView {
    pub regions: Vec<Region>,
    pub countries: Vec<Country>,
    pub programs: Vec<Program>,
    pub variants: Vec<ProgramVariant>,
    pub purposes: Vec<TripPurpose>,
    pub sports: Vec<SportType>,
    pub amounts: Vec<AmountPreset>,
    pub blank_types: Vec<BlankTypeInfo>,
    pub statuses: Vec<StatusInfo>,
    pub reasons: Vec<ReasonInfo>,
}

/// Builder for [`ContractWorkflowService`]; every collaborator not set falls back to
/// the production default.
pub struct ContractWorkflowServiceBuilder<R, A> {
    repository: Arc<R>,
    audit: Arc<A>,
    reference: Option<Arc<ReferenceData>>,
    clock: Option<Arc<dyn Clock>>,
    portal: PortalConfig,
    crm: CrmSettings,
    crm_random: Option<Box<dyn RandomSource>>,
    consent_random: Option<Box<dyn RandomSource>>,
    intake_random: Option<Box<dyn RandomSource>>,
    crm_log: Vec<IntegrationLogEntry>,
}

impl<R, A> ContractWorkflowServiceBuilder<R, A>
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    pub fn reference(mut self, reference: Arc<ReferenceData>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn portal(mut self, portal: PortalConfig) -> Self {
        self.portal = portal;
        self
    }

    pub fn crm_settings(mut self, crm: CrmSettings) -> Self {
        self.crm = crm;
        self
    }

    pub fn crm_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.crm_random = Some(rng);
        self
    }

    pub fn consent_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.consent_random = Some(rng);
        self
    }

    pub fn intake_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.intake_random = Some(rng);
        self
    }

    pub fn crm_log(mut self, entries: Vec<IntegrationLogEntry>) -> Self {
        self.crm_log = entries;
        self
    }

    pub fn build(self) -> ContractWorkflowService<R, A> {
        let reference = self
            .reference
            .unwrap_or_else(|| Arc::new(ReferenceData::standard()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let seed = self.portal.rng_seed;
        let derived = |offset: u64| -> Box<dyn RandomSource> {
            Box::new(SeededRandom::new(seed.map(|seed| seed.wrapping_add(offset))))
        };

        let crm = CrmSimulator::new(
            reference.clone(),
            clock.clone(),
            self.crm,
            self.crm_random.unwrap_or_else(|| derived(0)),
        )
        .with_log(self.crm_log);
        let sms = SmsConsentGateway::new(
            self.portal.consent_latency,
            self.portal.consent_decline_probability,
            self.consent_random.unwrap_or_else(|| derived(1)),
        );
        let calculator =
            PremiumCalculator::new(PricingConfig::default().with_usd_rate(self.portal.usd_rate));

        ContractWorkflowService {
            engine: PermissionEngine::new(reference.clone()),
            registry: PersonRegistry::new(reference.clone()),
            reference,
            repository: self.repository,
            audit: self.audit,
            crm: Arc::new(crm),
            sms: Arc::new(sms),
            clock,
            calculator,
            limits: RwLock::new(DraftLimits::from(&self.portal)),
            session: Mutex::new(Session::default()),
            intake_random: Mutex::new(self.intake_random.unwrap_or_else(|| derived(2))),
            activation_in_flight: AtomicBool::new(false),
        }
    }
}

/// Session-scoped facade over the drafting workflow: one signed-in actor, at most one
/// open draft, at most one activation in flight.
pub struct ContractWorkflowService<R, A> {
    reference: Arc<ReferenceData>,
    engine: PermissionEngine,
    repository: Arc<R>,
    audit: Arc<A>,
    crm: Arc<CrmSimulator>,
    sms: Arc<SmsConsentGateway>,
    registry: PersonRegistry,
    clock: Arc<dyn Clock>,
    calculator: PremiumCalculator,
    limits: RwLock<DraftLimits>,
    session: Mutex<Session>,
    intake_random: Mutex<Box<dyn RandomSource>>,
    activation_in_flight: AtomicBool,
}

impl<R, A> ContractWorkflowService<R, A>
where
    R: ContractRepository + 'static,
    A: AuditSink + 'static,
{
    pub fn new(repository: Arc<R>, audit: Arc<A>, portal: PortalConfig, crm: CrmSettings) -> Self {
        Self::builder(repository, audit)
            .portal(portal)
            .crm_settings(crm)
            .build()
    }

    pub fn builder(repository: Arc<R>, audit: Arc<A>) -> ContractWorkflowServiceBuilder<R, A> {
        ContractWorkflowServiceBuilder {
            repository,
            audit,
            reference: None,
            clock: None,
            portal: PortalConfig::default(),
            crm: CrmSettings::default(),
            crm_random: None,
            consent_random: None,
            intake_random: None,
            crm_log: Vec::new(),
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn limits(&self) -> DraftLimits {
        *self.limits.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn login(&self, email: &str) -> Result<SessionView, ServiceError> {
        let user = self
            .reference
            .user_by_email(email)
            .or_else(|| self.reference.first_operator())
            .cloned()
            .ok_or(ServiceError::NotSignedIn)?;
        let actor = Actor::for_user(user.clone());
        {
            let mut session = self.session();
            session.actor = actor.clone();
            session.editor = None;
        }

        info!(user_id = user.id.as_str(), "user signed in");
        self.record(
            &actor,
            AuditAction::Login,
            AuditObject::Session,
            None,
            format!("Signed in as {}", user.email),
        )?;
        Ok(self.session_view(&actor))
    }

    pub fn logout(&self) -> Result<(), ServiceError> {
        let actor = self.actor()?;
        self.record(&actor, AuditAction::Logout, AuditObject::Session, None, "Signed out")?;
        *self.session() = Session::default();
        Ok(())
    }

    /// Simulates another role for the signed-in user.
    pub fn switch_role(&self, role: RoleId) -> Result<SessionView, ServiceError> {
        let actor = self.actor()?;
        let name = self
            .reference
            .role(&role)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| ServiceError::UnknownRole(role.clone()))?;
        let actor = actor.with_role(role);
        self.session().actor = actor.clone();

        self.record(
            &actor,
            AuditAction::RoleSwitch,
            AuditObject::Session,
            None,
            format!("Role switched to {name}"),
        )?;
        Ok(self.session_view(&actor))
    }

    pub fn session_info(&self) -> SessionView {
        let actor = self.session().actor.clone();
        self.session_view(&actor)
    }

    pub fn catalog(&self) -> CatalogView {
        let reference = &self.reference;
        CatalogView {
            regions: reference.regions.clone(),
            countries: reference.countries.clone(),
            programs: reference.programs.clone(),
            variants: reference.variants.clone(),
            purposes: reference.purposes.clone(),
            sports: reference.sports.clone(),
            amounts: reference.amounts.clone(),
            blank_types: [BlankType::Electronic, BlankType::Paper]
                .into_iter()
                .map(|blank_type| BlankTypeInfo {
                    blank_type,
                    name: blank_type.display_name(),
                })
                .collect(),
            statuses: status_catalog(),
            reasons: reference.reasons.values().cloned().collect(),
        }
    }

    pub fn products(&self) -> Result<Vec<ProductOffer>, ServiceError> {
        let actor = self.actor()?;
        let company = actor.user.as_ref().and_then(|user| user.company_id.as_ref());
        Ok(self.reference.products_for_company(company))
    }

    /// Opens a fresh draft, discarding any draft that was open.
    pub fn start_draft(&self) -> Result<DraftView, ServiceError> {
        let actor = self.require(Capability::Create)?;
        let today = self.clock.today();
        let (id, external_id) = next_contract_ids();
        let user = actor.user.as_ref();
        let draft = DraftContract::fresh(
            id.clone(),
            external_id,
            today,
            user.and_then(|user| user.company_id.clone()),
            user.map(|user| user.id.clone()),
        );
        self.open_editor(&actor, draft, AuditAction::CreateDraft, "Draft created")
    }

    pub fn current_draft(&self) -> Result<DraftView, ServiceError> {
        self.actor()?;
        let env = self.environment()?;
        self.with_editor(|editor| Ok(editor.view(&env)))
    }

    pub fn apply(&self, command: DraftCommand) -> Result<DraftView, ServiceError> {
        let actor = self.require(Capability::Create)?;
        let env = self.environment()?;
        let (draft_id, events, view) = {
            let mut rng = self.intake_random();
            self.with_editor(|editor| {
                let events = editor.apply(command, &env, &mut **rng)?;
                Ok((editor.draft().id.clone(), events, editor.view(&env)))
            })?
        };
        self.record_draft_events(&actor, &draft_id, &events)?;
        Ok(view)
    }

    /// Consent-gated IIN intake: SMS consent (skipped under the corporate bypass), then
    /// the registry lookup, then the person is added. A declined consent is returned as a
    /// cancelled flow and leaves the draft unchanged.
    pub async fn add_iin_person(&self, iin: &str) -> Result<IinIntakeOutcome, ServiceError> {
        let actor = self.require(Capability::Create)?;
        let limits = self.limits();
        let (draft_id, bypass) = self.with_editor(|editor| {
            editor.check_iin_intake(iin, &limits)?;
            Ok((editor.draft().id.clone(), editor.consent_bypass()))
        })?;

        let flow = if bypass {
            debug!(contract_id = %draft_id, "corporate consent bypass applied");
            ConsentFlow::bypassed(iin)
        } else {
            self.record(
                &actor,
                AuditAction::RequestKdp,
                AuditObject::Person,
                Some(iin.to_string()),
                "Consent SMS sent",
            )?;
            let reply = self.sms.request_consent(iin).await;
            ConsentFlow::start(iin).receive_reply(reply)?
        };

        if matches!(flow, ConsentFlow::Cancelled { .. }) {
            self.record(
                &actor,
                AuditAction::KdpDeclined,
                AuditObject::Person,
                Some(iin.to_string()),
                "Consent declined",
            )?;
            return Ok(IinIntakeOutcome {
                flow,
                view: self.current_draft().ok(),
            });
        }
        if !bypass {
            self.record(
                &actor,
                AuditAction::KdpConfirmed,
                AuditObject::Person,
                Some(iin.to_string()),
                "Consent confirmed",
            )?;
        }

        let lookup = {
            let mut rng = self.intake_random();
            self.registry.lookup(iin, self.clock.today(), &mut **rng)
        };
        if lookup.source == LookupSource::Seeded {
            self.record(
                &actor,
                AuditAction::EsbdLookup,
                AuditObject::Person,
                Some(iin.to_string()),
                "Registry data requested",
            )?;
        }
        let flow = flow.complete_lookup(lookup.clone())?;
        let kdp_status = flow.kdp_status().unwrap_or(KdpStatus::Pending);

        let env = self.environment()?;
        let added = self.with_editor(|editor| {
            if editor.draft().id != draft_id {
                return Ok(None);
            }
            let events = editor.add_registry_person(iin, &lookup, kdp_status, &env)?;
            Ok(Some((events, editor.view(&env))))
        });

        match added {
            Ok(Some((events, view))) => {
                self.record_draft_events(&actor, &draft_id, &events)?;
                Ok(IinIntakeOutcome {
                    flow,
                    view: Some(view),
                })
            }
            Ok(None) | Err(ServiceError::NoDraft) => {
                warn!(contract_id = %draft_id, "draft changed while consent was pending");
                Ok(IinIntakeOutcome {
                    flow: flow.cancel(CancelReason::DraftChanged),
                    view: self.current_draft().ok(),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Requests consent for every IIN person still waiting for it.
    pub async fn confirm_pending_consents(&self) -> Result<DraftView, ServiceError> {
        let actor = self.require(Capability::Create)?;
        let (draft_id, pending) =
            self.with_editor(|editor| Ok((editor.draft().id.clone(), editor.pending_consents())))?;

        for iin in pending {
            self.record(
                &actor,
                AuditAction::RequestKdp,
                AuditObject::Person,
                Some(iin.clone()),
                "Consent SMS sent",
            )?;
            let reply = self.sms.request_consent(&iin).await;
            match ConsentFlow::start(iin.as_str()).receive_reply(reply)? {
                ConsentFlow::ConsentConfirmed { .. } => {
                    let today = self.clock.today();
                    let confirmed = self.with_editor(|editor| {
                        Ok(editor.draft().id == draft_id && editor.confirm_consent(&iin, today))
                    })?;
                    if confirmed {
                        self.record(
                            &actor,
                            AuditAction::KdpConfirmed,
                            AuditObject::Person,
                            Some(iin.clone()),
                            "Consent confirmed",
                        )?;
                    }
                }
                _ => {
                    self.record(
                        &actor,
                        AuditAction::KdpDeclined,
                        AuditObject::Person,
                        Some(iin.clone()),
                        "Consent declined",
                    )?;
                }
            }
        }

        self.current_draft()
    }

    /// Persists the open draft with status `draft` and closes the editor.
    pub fn save_draft(&self) -> Result<ContractRecord, ServiceError> {
        let actor = self.require(Capability::Create)?;
        let draft = self.with_editor(|editor| Ok(editor.draft().clone()))?;
        let today = self.clock.today();
        if draft.start_date <= today {
            return Err(DraftError::StartDateNotAfterToday {
                start: draft.start_date,
                today,
            }
            .into());
        }
        let created_at = self.created_at(&draft.id)?;
        let record = lifecycle::commit_draft(&draft, ContractStatus::Draft, created_at)?;
        self.repository.upsert(record.clone())?;
        self.close_editor(&record.id);

        info!(contract_id = %record.id, "draft saved");
        self.record(
            &actor,
            AuditAction::SaveDraft,
            AuditObject::Contract,
            Some(record.id.to_string()),
            "Draft saved",
        )?;
        Ok(record)
    }

    /// Runs the activation protocol for the open draft. Business rejections and timeouts
    /// come back as a `rejected` record, not as errors.
    pub async fn activate(&self) -> Result<ActivationResult, ServiceError> {
        let actor = self.require(Capability::Activate)?;
        let _latch = InFlightLatch::acquire(&self.activation_in_flight)
            .ok_or(ServiceError::ActivationInFlight)?;

        let env = self.environment()?;
        let draft = self.with_editor(|editor| {
            let blockers = editor.blockers(&env);
            if !blockers.is_empty() {
                return Err(ServiceError::NotReady(blockers));
            }
            Ok(editor.draft().clone())
        })?;

        let previous = self.repository.fetch(&draft.id)?;
        let created_at = match &previous {
            Some(existing) => {
                lifecycle::ensure_reopenable(existing)?;
                existing.created_at
            }
            None => self.clock.now(),
        };
        let mut record = lifecycle::commit_draft(&draft, ContractStatus::Pending, created_at)?;
        let sequence = self.repository.all()?.len() as u64 + 1;
        let request = self.activation_request(&record, sequence);

        self.record(
            &actor,
            AuditAction::ActivateRequest,
            AuditObject::Contract,
            Some(record.id.to_string()),
            format!("Activation requested, premium {}", record.premium),
        )?;
        self.repository.upsert(record.clone())?;

        let outcome = self.crm.activate(request).await;
        let now = self.clock.now();
        match &outcome {
            ActivationOutcome::Activated(receipt) => lifecycle::mark_activated(&mut record, receipt, now),
            ActivationOutcome::Rejected(rejection) => lifecycle::mark_rejected(&mut record, rejection, now),
        }
        if let Err(err) = self.repository.upsert(record.clone()) {
            self.restore(&record.id, previous);
            return Err(err.into());
        }

        let registry = match &outcome {
            ActivationOutcome::Activated(receipt) => {
                self.close_editor(&record.id);
                self.record(
                    &actor,
                    AuditAction::CrmResponseOk,
                    AuditObject::Contract,
                    Some(record.id.to_string()),
                    format!("Policy {} issued", receipt.policy_number),
                )?;

                if record.premium == 0 {
                    self.record(
                        &actor,
                        AuditAction::RegistrySubmissionSkipped,
                        AuditObject::Contract,
                        Some(record.id.to_string()),
                        "Zero premium, registry submission skipped",
                    )?;
                    RegistryStep::Skipped
                } else {
                    self.record(
                        &actor,
                        AuditAction::RegistrySubmitted,
                        AuditObject::Contract,
                        Some(record.id.to_string()),
                        "Contract data submitted to the national registry",
                    )?;
                    RegistryStep::Submitted
                }
            }
            ActivationOutcome::Rejected(rejection) => {
                self.record(
                    &actor,
                    AuditAction::CrmResponseFail,
                    AuditObject::Contract,
                    Some(record.id.to_string()),
                    format!("{}: {}", rejection.code, rejection.title),
                )?;
                RegistryStep::NotApplicable
            }
        };

        Ok(ActivationResult {
            record,
            outcome,
            registry,
        })
    }

    /// Contracts visible to the active role, newest first.
    pub fn contracts(&self) -> Result<Vec<ContractRecord>, ServiceError> {
        let actor = self.actor()?;
        self.scoped_contracts(&actor)
    }

    pub fn reopen(&self, id: &ContractId) -> Result<DraftView, ServiceError> {
        let actor = self.require(Capability::Create)?;
        let record = self.visible_contract(&actor, id)?;
        lifecycle::ensure_reopenable(&record)?;
        let draft = DraftContract::from_record(&record, self.clock.today());
        self.open_editor(&actor, draft, AuditAction::ReopenDraft, "Draft reopened")
    }

    pub fn void_contract(
        &self,
        id: &ContractId,
        reason: Option<String>,
    ) -> Result<ContractRecord, ServiceError> {
        self.close_contract(id, ClosingAction::Void, reason)
    }

    pub fn cancel_contract(
        &self,
        id: &ContractId,
        reason: Option<String>,
    ) -> Result<ContractRecord, ServiceError> {
        self.close_contract(id, ClosingAction::Cancel, reason)
    }

    pub fn report_summary(&self, filter: &ReportFilter) -> Result<ReportSummary, ServiceError> {
        let actor = self.require(Capability::Reports)?;
        let records = self.scoped_contracts(&actor)?;
        Ok(report::summarize(
            records.iter().filter(|record| filter.matches(record)),
        ))
    }

    pub fn export_report(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>, ServiceError> {
        let actor = self.require(Capability::ReportsExport)?;
        let rows: Vec<ReportRow> = self
            .scoped_contracts(&actor)?
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| ReportRow::from_record(record, &self.reference))
            .map(|row| self.engine.mask_sensitive_data(&actor, &row))
            .collect();

        self.record(
            &actor,
            AuditAction::ExportPerformed,
            AuditObject::Report,
            None,
            format!("{} rows exported", rows.len()),
        )?;
        Ok(rows)
    }

    pub fn dashboard(&self) -> Result<DashboardStats, ServiceError> {
        let actor = self.actor()?;
        Ok(report::dashboard(&self.scoped_contracts(&actor)?))
    }

    pub fn admin_users(&self) -> Result<Vec<User>, ServiceError> {
        let actor = self.require(Capability::AdminUsers)?;
        Ok(self
            .engine
            .filter_users_by_scope(&actor, self.reference.users.clone())
            .iter()
            .map(|user| self.engine.mask_sensitive_data(&actor, user))
            .collect())
    }

    /// Paper blank inventory of the companies in scope, with the effective status.
    pub fn admin_blanks(&self) -> Result<Vec<BlankInventoryRow>, ServiceError> {
        let actor = self.require(Capability::AdminBlanks)?;
        let holders: HashMap<String, String> = self
            .repository
            .all()?
            .into_iter()
            .filter(ContractRecord::consumes_blank)
            .filter_map(|record| record.blank_id.map(|blank| (blank, record.id.to_string())))
            .collect();

        let companies = self
            .engine
            .filter_by_scope(&actor, self.reference.companies.clone());
        Ok(companies
            .iter()
            .flat_map(|company| {
                company.paper_blanks.iter().map(|blank| {
                    let used_by = holders
                        .get(&blank.id)
                        .cloned()
                        .or_else(|| blank.used_by.clone());
                    BlankInventoryRow {
                        company_id: company.id.to_string(),
                        company_name: company.name.clone(),
                        blank_id: blank.id.clone(),
                        series: blank.series.clone(),
                        number: blank.number.clone(),
                        status: if used_by.is_some() {
                            BlankStatus::Used
                        } else {
                            blank.status
                        },
                        used_by,
                    }
                })
            })
            .collect())
    }

    pub fn update_limits(&self, update: LimitsUpdate) -> Result<DraftLimits, ServiceError> {
        let actor = self.require(Capability::AdminSettings)?;
        if update.max_persons == Some(0) {
            return Err(ServiceError::InvalidSettings(
                "max_persons must be positive".to_string(),
            ));
        }
        if update.max_territories == Some(0) {
            return Err(ServiceError::InvalidSettings(
                "max_territories must be positive".to_string(),
            ));
        }

        let limits = {
            let mut guard = self
                .limits
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(max_persons) = update.max_persons {
                guard.max_persons = max_persons;
            }
            if let Some(max_territories) = update.max_territories {
                guard.max_territories = max_territories;
            }
            *guard
        };

        info!(
            max_persons = limits.max_persons,
            max_territories = limits.max_territories,
            "portal limits updated"
        );
        self.record(
            &actor,
            AuditAction::SaveSettings,
            AuditObject::Settings,
            None,
            format!(
                "Limits set to {} persons and {} territories",
                limits.max_persons, limits.max_territories
            ),
        )?;
        Ok(limits)
    }

    pub fn crm_settings(&self) -> Result<CrmSettings, ServiceError> {
        self.actor()?;
        Ok(self.crm.settings())
    }

    pub fn update_crm_settings(&self, settings: CrmSettings) -> Result<CrmSettings, ServiceError> {
        let actor = self.require(Capability::AdminSettings)?;
        let settings = self.crm.update_settings(settings)?;
        self.record(
            &actor,
            AuditAction::SaveSettings,
            AuditObject::Settings,
            None,
            format!("CRM simulator mode set to {}", settings.mode.label()),
        )?;
        Ok(settings)
    }

    pub fn crm_log(&self) -> Result<Vec<IntegrationLogEntry>, ServiceError> {
        self.actor()?;
        Ok(self.crm.log_entries())
    }

    pub fn clear_crm_log(&self) -> Result<(), ServiceError> {
        self.require(Capability::AdminSettings)?;
        self.crm.clear_log();
        Ok(())
    }

    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEvent>, ServiceError> {
        self.actor()?;
        Ok(self.audit.recent(limit)?)
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn intake_random(&self) -> MutexGuard<'_, Box<dyn RandomSource>> {
        self.intake_random
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn actor(&self) -> Result<Actor, ServiceError> {
        let actor = self.session().actor.clone();
        if actor.user.is_none() {
            return Err(ServiceError::NotSignedIn);
        }
        Ok(actor)
    }

    fn require(&self, capability: Capability) -> Result<Actor, ServiceError> {
        let actor = self.actor()?;
        if !self.engine.can(&actor, capability) {
            return Err(ServiceError::Forbidden(capability));
        }
        Ok(actor)
    }

    fn session_view(&self, actor: &Actor) -> SessionView {
        SessionView {
            user: actor.user.clone(),
            role: actor.effective_role().cloned(),
            role_name: self.engine.role(actor).map(|role| role.name.clone()),
            scope: self.engine.scope(actor),
            capabilities: self.engine.capabilities(actor),
        }
    }

    fn environment(&self) -> Result<DraftEnvironment, ServiceError> {
        Ok(DraftEnvironment::new(self.clock.today(), self.limits())
            .with_used_blanks(self.repository.used_blanks()?))
    }

    fn with_editor<T>(
        &self,
        action: impl FnOnce(&mut DraftEditor) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut session = self.session();
        let editor = session.editor.as_mut().ok_or(ServiceError::NoDraft)?;
        action(editor)
    }

    fn open_editor(
        &self,
        actor: &Actor,
        draft: DraftContract,
        action: AuditAction,
        detail: &str,
    ) -> Result<DraftView, ServiceError> {
        let env = self.environment()?;
        let id = draft.id.clone();
        let editor = DraftEditor::new(
            draft,
            self.reference.clone(),
            self.calculator.clone(),
            env.today,
        );
        let view = editor.view(&env);
        self.session().editor = Some(editor);

        info!(contract_id = %id, action = action.label(), "draft opened");
        self.record(actor, action, AuditObject::Contract, Some(id.to_string()), detail)?;
        Ok(view)
    }

    fn close_editor(&self, id: &ContractId) {
        let mut session = self.session();
        if session
            .editor
            .as_ref()
            .is_some_and(|editor| &editor.draft().id == id)
        {
            session.editor = None;
        }
    }

    /// Puts back what was stored before a failed activation replaced it with `pending`.
    fn restore(&self, id: &ContractId, previous: Option<ContractRecord>) {
        let restored = match previous {
            Some(record) => self.repository.upsert(record),
            None => self.repository.remove(id),
        };
        if let Err(err) = restored {
            warn!(contract_id = %id, error = %err, "pending contract could not be restored");
        }
    }

    /// Creation time of the stored record being replaced, or now for a new one.
    fn created_at(&self, id: &ContractId) -> Result<DateTime<Utc>, ServiceError> {
        match self.repository.fetch(id)? {
            Some(existing) => {
                lifecycle::ensure_reopenable(&existing)?;
                Ok(existing.created_at)
            }
            None => Ok(self.clock.now()),
        }
    }

    fn activation_request(&self, record: &ContractRecord, sequence: u64) -> ActivationRequest {
        let product = self.reference.product(&record.product);
        ActivationRequest {
            contract_id: record.id.to_string(),
            external_id: record.external_id.clone(),
            product: record.product.clone(),
            policy_code: product.map_or_else(
                || record.product.to_uppercase(),
                |product| product.policy_code.clone(),
            ),
            company_prefix: self
                .reference
                .company(&record.company_id)
                .map(|company| company.prefix.clone()),
            person_count: record.persons.len(),
            territories: record.territories.clone(),
            kdp_confirmed: record.kdp_confirmed,
            year: self.clock.today().year(),
            sequence,
        }
    }

    fn scoped_contracts(&self, actor: &Actor) -> Result<Vec<ContractRecord>, ServiceError> {
        Ok(self.engine.filter_by_scope(actor, self.repository.all()?))
    }

    fn visible_contract(&self, actor: &Actor, id: &ContractId) -> Result<ContractRecord, ServiceError> {
        self.scoped_contracts(actor)?
            .into_iter()
            .find(|record| &record.id == id)
            .ok_or_else(|| ServiceError::ContractNotFound(id.to_string()))
    }

    fn close_contract(
        &self,
        id: &ContractId,
        action: ClosingAction,
        reason: Option<String>,
    ) -> Result<ContractRecord, ServiceError> {
        let capability = match action {
            ClosingAction::Void => Capability::VoidBeforeStart,
            ClosingAction::Cancel => Capability::CancelBeforeStart,
        };
        let actor = self.require(capability)?;
        let record = self.visible_contract(&actor, id)?;
        let today = self.clock.today();

        let allowed = match action {
            ClosingAction::Void => self.engine.can_void_contract(&actor, &record, today),
            ClosingAction::Cancel => self.engine.can_cancel_contract(&actor, &record, today),
        };
        if !allowed {
            return Err(LifecycleError::CoverageStarted {
                id: record.id.clone(),
                start_date: record.start_date,
            }
            .into());
        }

        let closed = lifecycle::close(&record, action, reason, today, self.clock.now())?;
        self.repository.upsert(closed.clone())?;

        let (audit_action, detail) = match action {
            ClosingAction::Void => (AuditAction::VoidContract, "Contract voided"),
            ClosingAction::Cancel => (AuditAction::CancelContract, "Contract cancelled"),
        };
        info!(contract_id = %closed.id, status = closed.status.label(), "contract closed");
        self.record(
            &actor,
            audit_action,
            AuditObject::Contract,
            Some(closed.id.to_string()),
            detail,
        )?;
        Ok(closed)
    }

    fn record_draft_events(
        &self,
        actor: &Actor,
        draft_id: &ContractId,
        events: &[DraftEvent],
    ) -> Result<(), ServiceError> {
        for event in events {
            let (action, object, detail) = match event {
                DraftEvent::ProductSelected { product } => (
                    AuditAction::SelectProduct,
                    AuditObject::Contract,
                    format!("Product selected: {product}"),
                ),
                DraftEvent::PersonAdded { name, mode, .. } => (
                    AuditAction::PersonAdded,
                    AuditObject::Person,
                    format!("{name} added ({})", mode.label()),
                ),
                DraftEvent::PersonRemoved { name, .. } => (
                    AuditAction::PersonRemoved,
                    AuditObject::Person,
                    format!("{name} removed"),
                ),
                DraftEvent::AmountCorrected { .. } | DraftEvent::CorporateTermsCleared => continue,
            };
            self.record(actor, action, object, Some(draft_id.to_string()), detail)?;
        }
        Ok(())
    }

    fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        object_type: AuditObject,
        object_id: Option<String>,
        detail: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let event = AuditEvent {
            id: next_event_id(),
            timestamp: self.clock.now(),
            user_id: actor.user.as_ref().map(|user| user.id.clone()),
            action,
            object_type,
            object_id,
            detail: detail.into(),
        };
        debug!(action = action.label(), event_id = %event.id, "audit event recorded");
        self.audit.record(event)?;
        Ok(())
    }
}

fn describe(blockers: &[ActivationBlocker]) -> String {
    blockers
        .iter()
        .map(ActivationBlocker::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error raised by the contract workflow service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("the active role lacks the '{0}' capability")]
    Forbidden(Capability),
    #[error("unknown role '{0}'")]
    UnknownRole(RoleId),
    #[error("no draft is open")]
    NoDraft,
    #[error("draft is not ready for activation: {}", describe(.0))]
    NotReady(Vec<ActivationBlocker>),
    #[error("an activation is already in flight")]
    ActivationInFlight,
    #[error("contract '{0}' not found")]
    ContractNotFound(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Consent(#[from] ConsentError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotSignedIn | Self::NoDraft | Self::ActivationInFlight | Self::Lifecycle(_) => {
                StatusCode::CONFLICT
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ContractNotFound(_) => StatusCode::NOT_FOUND,
            Self::UnknownRole(_)
            | Self::NotReady(_)
            | Self::InvalidSettings(_)
            | Self::Draft(_)
            | Self::Consent(_)
            | Self::Settings(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Repository(_) | Self::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
