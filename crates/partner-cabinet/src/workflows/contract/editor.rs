//! Single-writer draft editor. Every command runs against a copy of the draft; the copy
//! replaces the draft only when the command succeeds, so a rejected command changes nothing.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::country_rules::{
    apply_country_rules, resolve_country_rules, AmountCorrection, ResolvedCountryRules,
};
use super::domain::{
    BlankType, ConsentFile, CorporateTerms, DraftContract, DraftError, InsuredAmount,
    InsuredPerson, KdpStatus, VerificationMode,
};
use super::intake::{
    self, calculator_persons, is_person_ready, kdp_aggregate, CalculatorBand, ManualPerson,
};
use super::pricing::{PremiumBreakdown, PremiumCalculator};
use crate::config::PortalConfig;
use crate::integrations::registry::RegistryLookup;
use crate::random::RandomSource;
use crate::reference::{BlankStatus, Company, Currency, PaperBlank, ReferenceData, SPORT_PURPOSE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLimits {
    pub max_persons: usize,
    pub max_territories: usize,
    pub consent_file_max_bytes: u64,
}

impl Default for DraftLimits {
    fn default() -> Self {
        Self::from(&PortalConfig::default())
    }
}

impl From<&PortalConfig> for DraftLimits {
    fn from(config: &PortalConfig) -> Self {
        Self {
            max_persons: config.max_persons,
            max_territories: config.max_territories,
            consent_file_max_bytes: config.consent_file_max_bytes,
        }
    }
}

/// Values outside the draft that validation depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftEnvironment {
    pub today: NaiveDate,
    pub limits: DraftLimits,
    /// Paper blanks held by committed contracts.
    pub used_blanks: HashSet<String>,
}

impl DraftEnvironment {
    pub fn new(today: NaiveDate, limits: DraftLimits) -> Self {
        Self {
            today,
            limits,
            used_blanks: HashSet::new(),
        }
    }

    pub fn with_used_blanks(mut self, used_blanks: HashSet<String>) -> Self {
        self.used_blanks = used_blanks;
        self
    }
}

pub fn is_blank_free(blank: &PaperBlank, used_blanks: &HashSet<String>) -> bool {
    blank.status == BlankStatus::Free && !used_blanks.contains(&blank.id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DraftCommand {
    SelectProduct { product: String },
    SelectGeneralContract { general_contract_id: String },
    SetBlankType { blank_type: BlankType },
    SelectPaperBlank { blank_id: Option<String> },
    AddTerritory { code: String },
    RemoveTerritory { code: String },
    SetProgram { program: String },
    SetVariant { variant: String },
    SetPurpose { purpose: String },
    SetSport { sport: Option<String> },
    SetAmount { value: u32, currency: Currency },
    SetStartDate { date: NaiveDate },
    SetEndDate { date: NaiveDate },
    SetDays { days: i64 },
    AddResidentWithoutIin { person: ManualPerson },
    AttachConsentFile { file_name: String, size_bytes: u64 },
    AddNonresident { person: ManualPerson },
    AddCalculatorPersons { band: CalculatorBand, count: usize },
    RemovePerson { index: usize },
    SetCorporateTerms { terms: CorporateTerms },
    ClearCorporateTerms,
}

/// Domain events emitted by a successful command, consumed by the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DraftEvent {
    ProductSelected {
        product: String,
    },
    PersonAdded {
        index: usize,
        mode: VerificationMode,
        name: String,
    },
    PersonRemoved {
        index: usize,
        name: String,
    },
    AmountCorrected {
        correction: AmountCorrection,
    },
    CorporateTermsCleared,
}

impl DraftEvent {
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::AmountCorrected { correction } => Some(correction.notice()),
            Self::CorporateTermsCleared => Some(
                "Corporate benefits are not offered under the selected general contract; the corporate block was cleared"
                    .to_string(),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "blocker", rename_all = "snake_case")]
pub enum ActivationBlocker {
    NoProduct,
    NoGeneralContract,
    NoTerritory,
    NoPersons,
    PersonNotReady { index: usize },
    StartDateNotAfterToday,
    NonPositiveDayCount,
    PaperBlankMissing,
    PaperBlankUnavailable,
    CorporateTermsIncomplete,
    PersonLimitExceeded,
    TerritoryLimitExceeded,
}

impl ActivationBlocker {
    pub fn message(&self) -> String {
        match self {
            Self::NoProduct => "select a product".to_string(),
            Self::NoGeneralContract => "select a general contract".to_string(),
            Self::NoTerritory => "select at least one territory".to_string(),
            Self::NoPersons => "add at least one insured person".to_string(),
            Self::PersonNotReady { index } => format!("insured person {} is not ready", index + 1),
            Self::StartDateNotAfterToday => "start date must be after today".to_string(),
            Self::NonPositiveDayCount => "insurance period must be at least one day".to_string(),
            Self::PaperBlankMissing => "select a paper blank".to_string(),
            Self::PaperBlankUnavailable => "the selected paper blank is no longer free".to_string(),
            Self::CorporateTermsIncomplete => {
                "complete or clear the corporate benefit fields".to_string()
            }
            Self::PersonLimitExceeded => "too many insured persons for the current limit".to_string(),
            Self::TerritoryLimitExceeded => "too many territories for the current limit".to_string(),
        }
    }
}

/// Everything the shell renders for the current draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftView {
    pub draft: DraftContract,
    pub day_count: i64,
    pub premium: PremiumBreakdown,
    pub readiness: Vec<bool>,
    pub country_rules: ResolvedCountryRules,
    pub country_rule_hint: Option<String>,
    pub corporate_benefits_available: bool,
    pub consent_bypass: bool,
    pub free_blanks: Vec<String>,
    pub blockers: Vec<ActivationBlocker>,
    pub can_activate: bool,
    pub notices: Vec<String>,
}

pub struct DraftEditor {
    draft: DraftContract,
    reference: Arc<ReferenceData>,
    calculator: PremiumCalculator,
    notices: Vec<String>,
}

impl DraftEditor {
    pub fn new(
        draft: DraftContract,
        reference: Arc<ReferenceData>,
        calculator: PremiumCalculator,
        today: NaiveDate,
    ) -> Self {
        let mut editor = Self {
            draft: draft.clone(),
            reference,
            calculator,
            notices: Vec::new(),
        };
        editor.settle(draft, Vec::new(), today);
        editor
    }

    pub fn draft(&self) -> &DraftContract {
        &self.draft
    }

    pub fn into_draft(self) -> DraftContract {
        self.draft
    }

    pub fn consent_bypass(&self) -> bool {
        self.draft.corporate_discount_active(&self.reference)
    }

    pub fn apply(
        &mut self,
        command: DraftCommand,
        env: &DraftEnvironment,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<DraftEvent>, DraftError> {
        let mut next = self.draft.clone();
        let events = self.execute(&mut next, command, env, rng)?;
        Ok(self.settle(next, events, env.today))
    }

    /// Entry checks for the consent-gated IIN path, run before the SMS is sent.
    pub fn check_iin_intake(&self, iin: &str, limits: &DraftLimits) -> Result<(), DraftError> {
        intake::validate_iin(iin)?;
        if self.draft.contains_iin(iin) {
            return Err(DraftError::DuplicatePerson(iin.to_string()));
        }
        if self.draft.persons.len() >= limits.max_persons {
            return Err(DraftError::PersonLimit {
                max: limits.max_persons,
            });
        }
        Ok(())
    }

    /// Adds the person found by the registry once consent has been settled.
    pub fn add_registry_person(
        &mut self,
        iin: &str,
        lookup: &RegistryLookup,
        kdp_status: KdpStatus,
        env: &DraftEnvironment,
    ) -> Result<Vec<DraftEvent>, DraftError> {
        self.check_iin_intake(iin, &env.limits)?;
        let mut next = self.draft.clone();
        let person = intake::registry_person(iin, lookup, kdp_status);
        let event = DraftEvent::PersonAdded {
            index: next.persons.len(),
            mode: person.verification,
            name: person.full_name(),
        };
        next.persons.push(person);
        Ok(self.settle(next, vec![event], env.today))
    }

    /// IINs of persons still waiting for their own consent.
    pub fn pending_consents(&self) -> Vec<String> {
        self.draft
            .persons
            .iter()
            .filter(|person| {
                person.verification == VerificationMode::IinKdp
                    && person.kdp_status != KdpStatus::Confirmed
            })
            .map(|person| person.iin.clone())
            .collect()
    }

    pub fn confirm_consent(&mut self, iin: &str, today: NaiveDate) -> bool {
        let mut next = self.draft.clone();
        let Some(person) = next
            .persons
            .iter_mut()
            .find(|person| person.verification == VerificationMode::IinKdp && person.iin == iin)
        else {
            return false;
        };
        person.kdp_status = KdpStatus::Confirmed;
        self.settle(next, Vec::new(), today);
        true
    }

    pub fn blockers(&self, env: &DraftEnvironment) -> Vec<ActivationBlocker> {
        let draft = &self.draft;
        let mut blockers = Vec::new();

        if draft.product.is_none() {
            blockers.push(ActivationBlocker::NoProduct);
        }
        if draft.general_contract_id.is_none() {
            blockers.push(ActivationBlocker::NoGeneralContract);
        }
        if draft.territories.is_empty() {
            blockers.push(ActivationBlocker::NoTerritory);
        }
        if draft.persons.is_empty() {
            blockers.push(ActivationBlocker::NoPersons);
        }

        let bypass = self.consent_bypass();
        blockers.extend(
            draft
                .persons
                .iter()
                .enumerate()
                .filter(|(_, person)| !is_person_ready(person, bypass, env.today))
                .map(|(index, _)| ActivationBlocker::PersonNotReady { index }),
        );

        if draft.start_date <= env.today {
            blockers.push(ActivationBlocker::StartDateNotAfterToday);
        }
        if draft.day_count() < 1 {
            blockers.push(ActivationBlocker::NonPositiveDayCount);
        }

        if draft.blank_type == BlankType::Paper {
            match draft.blank_id.as_deref() {
                None => blockers.push(ActivationBlocker::PaperBlankMissing),
                Some(blank_id) => {
                    let free = self
                        .company()
                        .and_then(|company| company.paper_blanks.iter().find(|b| b.id == blank_id))
                        .is_some_and(|blank| is_blank_free(blank, &env.used_blanks));
                    if !free {
                        blockers.push(ActivationBlocker::PaperBlankUnavailable);
                    }
                }
            }
        }

        if draft.corporate.is_touched() && !self.consent_bypass() {
            blockers.push(ActivationBlocker::CorporateTermsIncomplete);
        }
        if draft.persons.len() > env.limits.max_persons {
            blockers.push(ActivationBlocker::PersonLimitExceeded);
        }
        if draft.territories.len() > env.limits.max_territories {
            blockers.push(ActivationBlocker::TerritoryLimitExceeded);
        }

        blockers
    }

    pub fn can_activate(&self, env: &DraftEnvironment) -> bool {
        self.blockers(env).is_empty()
    }

    pub fn view(&self, env: &DraftEnvironment) -> DraftView {
        let draft = &self.draft;
        let bypass = self.consent_bypass();
        let blockers = self.blockers(env);
        let country_rules = resolve_country_rules(&draft.territories, &self.reference);
        let free_blanks = self
            .company()
            .map(|company| {
                company
                    .paper_blanks
                    .iter()
                    .filter(|blank| is_blank_free(blank, &env.used_blanks))
                    .map(|blank| blank.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        DraftView {
            draft: draft.clone(),
            day_count: draft.day_count(),
            premium: self.calculator.calculate(draft, &self.reference, env.today),
            readiness: draft
                .persons
                .iter()
                .map(|person| is_person_ready(person, bypass, env.today))
                .collect(),
            country_rule_hint: (!draft.territories.is_empty()).then(|| country_rules.hint()),
            country_rules,
            corporate_benefits_available: draft.corporate_benefits_enabled(&self.reference),
            consent_bypass: bypass,
            free_blanks,
            can_activate: blockers.is_empty(),
            blockers,
            notices: self.notices.clone(),
        }
    }

    fn company(&self) -> Option<&Company> {
        self.draft
            .company_id
            .as_ref()
            .and_then(|id| self.reference.company(id))
    }

    fn execute(
        &self,
        draft: &mut DraftContract,
        command: DraftCommand,
        env: &DraftEnvironment,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<DraftEvent>, DraftError> {
        let reference = &self.reference;
        let limits = &env.limits;
        let mut events = Vec::new();

        match command {
            DraftCommand::SelectProduct { product } => {
                let entry = reference
                    .product(&product)
                    .ok_or_else(|| DraftError::UnknownProduct(product.clone()))?;
                let general_contract = self
                    .company()
                    .and_then(|company| company.general_contracts_for(&product).next())
                    .ok_or_else(|| DraftError::ProductUnavailable(product.clone()))?;

                draft.general_contract_id = Some(general_contract.id.clone());
                draft.travel.amount = InsuredAmount {
                    value: entry.default_amount,
                    currency: Currency::Usd,
                };
                if !entry.is_travel() {
                    draft.travel.sport = None;
                }
                draft.product = Some(product.clone());
                events.push(DraftEvent::ProductSelected { product });
            }
            DraftCommand::SelectGeneralContract { general_contract_id } => {
                let product = draft.product.clone().ok_or(DraftError::NoProductSelected)?;
                let matches = self
                    .company()
                    .and_then(|company| company.general_contract(&general_contract_id))
                    .is_some_and(|gc| gc.product == product);
                if !matches {
                    return Err(DraftError::GeneralContractMismatch(general_contract_id));
                }
                draft.general_contract_id = Some(general_contract_id);
            }
            DraftCommand::SetBlankType { blank_type } => {
                draft.blank_type = blank_type;
                if blank_type == BlankType::Electronic {
                    draft.blank_id = None;
                }
            }
            DraftCommand::SelectPaperBlank { blank_id } => {
                if draft.blank_type != BlankType::Paper {
                    return Err(DraftError::BlankTypeNotPaper);
                }
                if let Some(id) = &blank_id {
                    let free = self
                        .company()
                        .and_then(|company| company.paper_blanks.iter().find(|blank| &blank.id == id))
                        .is_some_and(|blank| is_blank_free(blank, &env.used_blanks));
                    if !free {
                        return Err(DraftError::BlankNotFree(id.clone()));
                    }
                }
                draft.blank_id = blank_id;
            }
            DraftCommand::AddTerritory { code } => {
                if reference.country(&code).is_none() {
                    return Err(DraftError::UnknownCatalogEntry {
                        catalog: "territory",
                        id: code,
                    });
                }
                if draft.territories.contains(&code) {
                    return Err(DraftError::DuplicateTerritory(code));
                }
                if draft.territories.len() >= limits.max_territories {
                    return Err(DraftError::TerritoryLimit {
                        max: limits.max_territories,
                    });
                }
                draft.territories.push(code);
            }
            DraftCommand::RemoveTerritory { code } => {
                let position = draft
                    .territories
                    .iter()
                    .position(|selected| *selected == code)
                    .ok_or(DraftError::TerritoryNotSelected(code))?;
                draft.territories.remove(position);
            }
            DraftCommand::SetProgram { program } => {
                self.require_travel(draft)?;
                if reference.program(&program).is_none() {
                    return Err(unknown("program", program));
                }
                draft.travel.program = program;
            }
            DraftCommand::SetVariant { variant } => {
                self.require_travel(draft)?;
                if reference.variant(&variant).is_none() {
                    return Err(unknown("variant", variant));
                }
                draft.travel.variant = variant;
            }
            DraftCommand::SetPurpose { purpose } => {
                self.require_travel(draft)?;
                if reference.purpose(&purpose).is_none() {
                    return Err(unknown("purpose", purpose));
                }
                if purpose != SPORT_PURPOSE {
                    draft.travel.sport = None;
                }
                draft.travel.purpose = purpose;
            }
            DraftCommand::SetSport { sport } => {
                self.require_travel(draft)?;
                if let Some(id) = &sport {
                    if draft.travel.purpose != SPORT_PURPOSE {
                        return Err(DraftError::SportRequiresSportPurpose);
                    }
                    if reference.sport(id).is_none() {
                        return Err(unknown("sport", id.clone()));
                    }
                }
                draft.travel.sport = sport;
            }
            DraftCommand::SetAmount { value, currency } => {
                if value == 0 {
                    return Err(DraftError::InvalidAmount);
                }
                draft.travel.amount = InsuredAmount { value, currency };
            }
            DraftCommand::SetStartDate { date } => {
                if date <= env.today {
                    return Err(DraftError::StartDateNotAfterToday {
                        start: date,
                        today: env.today,
                    });
                }
                if date > draft.end_date {
                    let days = draft.day_count().max(1);
                    draft.end_date = period_end(date, days)?;
                }
                draft.start_date = date;
            }
            DraftCommand::SetEndDate { date } => {
                if date < draft.start_date {
                    return Err(DraftError::EndBeforeStart);
                }
                draft.end_date = date;
            }
            DraftCommand::SetDays { days } => {
                if days < 1 {
                    return Err(DraftError::NonPositiveDayCount);
                }
                draft.end_date = period_end(draft.start_date, days)?;
            }
            DraftCommand::AddResidentWithoutIin { person } => {
                ensure_slot(draft, limits)?;
                let person = intake::resident_without_iin(person, env.today)?;
                events.push(added(draft, &person));
                draft.persons.push(person);
            }
            DraftCommand::AttachConsentFile {
                file_name,
                size_bytes,
            } => {
                let file = ConsentFile {
                    file_name,
                    size_bytes,
                };
                intake::validate_consent_file(&file, limits.consent_file_max_bytes)?;
                draft.pending_consent_file = Some(file);
            }
            DraftCommand::AddNonresident { person } => {
                ensure_slot(draft, limits)?;
                let consent_file = draft.pending_consent_file.take();
                let person = intake::nonresident(person, consent_file, env.today)?;
                events.push(added(draft, &person));
                draft.persons.push(person);
            }
            DraftCommand::AddCalculatorPersons { band, count } => {
                let persons = calculator_persons(
                    band,
                    count,
                    draft.persons.len(),
                    limits.max_persons,
                    env.today,
                    rng,
                )?;
                for person in persons {
                    events.push(added(draft, &person));
                    draft.persons.push(person);
                }
            }
            DraftCommand::RemovePerson { index } => {
                if index >= draft.persons.len() {
                    return Err(DraftError::PersonIndexOutOfRange(index));
                }
                let removed = draft.persons.remove(index);
                events.push(DraftEvent::PersonRemoved {
                    index,
                    name: removed.full_name(),
                });
            }
            DraftCommand::SetCorporateTerms { terms } => {
                if !draft.corporate_benefits_enabled(reference) {
                    return Err(DraftError::CorporateBenefitsUnavailable);
                }
                if let Some(discount) = terms.discount_percent {
                    if !discount.is_finite() || !(0.0..=100.0).contains(&discount) {
                        return Err(DraftError::InvalidDiscount);
                    }
                }
                draft.corporate = terms;
            }
            DraftCommand::ClearCorporateTerms => {
                draft.corporate = CorporateTerms::default();
            }
        }

        Ok(events)
    }

    fn require_travel(&self, draft: &DraftContract) -> Result<(), DraftError> {
        if draft.product.is_none() {
            return Err(DraftError::NoProductSelected);
        }
        if !draft.is_travel(&self.reference) {
            return Err(DraftError::TravelFieldsUnavailable);
        }
        Ok(())
    }

    /// Recomputes derived fields, installs `next` and returns the full event list.
    fn settle(
        &mut self,
        mut next: DraftContract,
        mut events: Vec<DraftEvent>,
        today: NaiveDate,
    ) -> Vec<DraftEvent> {
        if next.corporate.is_touched() && !next.corporate_benefits_enabled(&self.reference) {
            next.corporate = CorporateTerms::default();
            events.push(DraftEvent::CorporateTermsCleared);
        }
        if let Some(correction) =
            apply_country_rules(&mut next.travel, &next.territories, &self.reference)
        {
            events.push(DraftEvent::AmountCorrected { correction });
        }

        let bypass = next.corporate_discount_active(&self.reference);
        next.kdp_confirmed = kdp_aggregate(&next.persons, bypass);

        let breakdown = self.calculator.calculate(&next, &self.reference, today);
        for (person, share) in next.persons.iter_mut().zip(&breakdown.per_person) {
            person.premium = *share;
        }
        next.premium = breakdown.total;

        self.notices = events.iter().filter_map(DraftEvent::notice).collect();
        self.draft = next;
        events
    }
}

/// Last day of an inclusive period of `days` days starting on `start`.
fn period_end(start: NaiveDate, days: i64) -> Result<NaiveDate, DraftError> {
    let extra = u64::try_from(days - 1).map_err(|_| DraftError::NonPositiveDayCount)?;
    start
        .checked_add_days(Days::new(extra))
        .ok_or(DraftError::PeriodOutOfRange)
}

fn unknown(catalog: &'static str, id: String) -> DraftError {
    DraftError::UnknownCatalogEntry { catalog, id }
}

fn ensure_slot(draft: &DraftContract, limits: &DraftLimits) -> Result<(), DraftError> {
    if draft.persons.len() >= limits.max_persons {
        return Err(DraftError::PersonLimit {
            max: limits.max_persons,
        });
    }
    Ok(())
}

fn added(draft: &DraftContract, person: &InsuredPerson) -> DraftEvent {
    DraftEvent::PersonAdded {
        index: draft.persons.len(),
        mode: person.verification,
        name: person.full_name(),
    }
}
