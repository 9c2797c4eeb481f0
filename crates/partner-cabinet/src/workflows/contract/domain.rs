use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::integrations::crm::Rejection;
use crate::reference::{CompanyId, Currency, ReferenceData, UserId};

/// Identifier shared by a draft and the contract record it is committed into.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankType {
    Paper,
    Electronic,
}

impl BlankType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Electronic => "electronic",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Paper => "Paper blank",
            Self::Electronic => "Electronic policy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Residency {
    Resident,
    Nonresident,
}

/// How an insured person entered the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    IinKdp,
    ResidentNoIin,
    NonresidentMin,
    Calculator,
}

impl VerificationMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::IinKdp => "iin_kdp",
            Self::ResidentNoIin => "resident_no_iin",
            Self::NonresidentMin => "nonresident_min",
            Self::Calculator => "calculator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KdpStatus {
    Pending,
    Confirmed,
    NotRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuredAmount {
    pub value: u32,
    pub currency: Currency,
}

impl fmt::Display for InsuredAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Fields that only matter for travel-layout products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelTerms {
    pub program: String,
    pub variant: String,
    pub purpose: String,
    pub sport: Option<String>,
    pub amount: InsuredAmount,
}

impl Default for TravelTerms {
    fn default() -> Self {
        Self {
            program: "base".to_string(),
            variant: "standard".to_string(),
            purpose: "tourism".to_string(),
            sport: None,
            amount: InsuredAmount {
                value: 30_000,
                currency: Currency::Usd,
            },
        }
    }
}

/// Corporate-benefit block. Either untouched or complete before activation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorporateTerms {
    #[serde(default)]
    pub client_company: String,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub dms_number: String,
    #[serde(default)]
    pub loyalty_card: String,
    #[serde(default)]
    pub alliance: bool,
}

impl CorporateTerms {
    pub fn is_touched(&self) -> bool {
        !self.client_company.trim().is_empty()
            || self.discount_percent.is_some()
            || !self.dms_number.trim().is_empty()
            || !self.loyalty_card.trim().is_empty()
            || self.alliance
    }

    pub fn is_complete(&self) -> bool {
        !self.client_company.trim().is_empty()
            && !self.dms_number.trim().is_empty()
            && self
                .discount_percent
                .is_some_and(|discount| discount.is_finite() && (0.0..=100.0).contains(&discount))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentFile {
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuredPerson {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub iin: String,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub document_number: String,
    pub residency: Residency,
    pub verification: VerificationMode,
    pub kdp_status: KdpStatus,
    #[serde(default)]
    pub consent_file: Option<ConsentFile>,
    #[serde(default)]
    pub calculation_only: bool,
    #[serde(default)]
    pub premium: u64,
}

impl InsuredPerson {
    pub fn has_name(&self) -> bool {
        !self.last_name.trim().is_empty() && !self.first_name.trim().is_empty()
    }

    pub fn full_name(&self) -> String {
        [&self.last_name, &self.first_name, &self.middle_name]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The in-progress contract form. Premium fields are derived and rewritten on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContract {
    pub id: ContractId,
    pub external_id: String,
    pub issue_date: NaiveDate,
    pub company_id: Option<CompanyId>,
    pub created_by: Option<UserId>,
    pub product: Option<String>,
    pub general_contract_id: Option<String>,
    pub blank_type: BlankType,
    pub blank_id: Option<String>,
    pub territories: Vec<String>,
    pub travel: TravelTerms,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub persons: Vec<InsuredPerson>,
    pub pending_consent_file: Option<ConsentFile>,
    pub corporate: CorporateTerms,
    pub kdp_confirmed: bool,
    pub premium: u64,
}

impl DraftContract {
    /// Empty form: no product, electronic blank, a seven day period starting tomorrow.
    pub fn fresh(
        id: ContractId,
        external_id: String,
        today: NaiveDate,
        company_id: Option<CompanyId>,
        created_by: Option<UserId>,
    ) -> Self {
        let start_date = today + Duration::days(1);
        Self {
            id,
            external_id,
            issue_date: today,
            company_id,
            created_by,
            product: None,
            general_contract_id: None,
            blank_type: BlankType::Electronic,
            blank_id: None,
            territories: Vec::new(),
            travel: TravelTerms::default(),
            start_date,
            end_date: start_date + Duration::days(6),
            persons: Vec::new(),
            pending_consent_file: None,
            corporate: CorporateTerms::default(),
            kdp_confirmed: false,
            premium: 0,
        }
    }

    /// Rebuilds an editable form from a committed `draft` or `rejected` record.
    pub fn from_record(record: &ContractRecord, today: NaiveDate) -> Self {
        Self {
            id: record.id.clone(),
            external_id: record.external_id.clone(),
            issue_date: today,
            company_id: Some(record.company_id.clone()),
            created_by: Some(record.created_by.clone()),
            product: Some(record.product.clone()),
            general_contract_id: Some(record.general_contract_id.clone()),
            blank_type: record.blank_type,
            blank_id: record.blank_id.clone(),
            territories: record.territories.clone(),
            travel: record.travel.clone().unwrap_or_default(),
            start_date: record.start_date,
            end_date: record.end_date,
            persons: record.persons.clone(),
            pending_consent_file: None,
            corporate: record.corporate.clone().unwrap_or_default(),
            kdp_confirmed: record.kdp_confirmed,
            premium: record.premium,
        }
    }

    /// Inclusive number of insured days; zero when the end precedes the start.
    pub fn day_count(&self) -> i64 {
        ((self.end_date - self.start_date).num_days() + 1).max(0)
    }

    pub fn is_travel(&self, reference: &ReferenceData) -> bool {
        self.product
            .as_deref()
            .and_then(|id| reference.product(id))
            .is_some_and(|product| product.is_travel())
    }

    /// Corporate fields apply to travel products under a general contract that enables them.
    pub fn corporate_benefits_enabled(&self, reference: &ReferenceData) -> bool {
        if !self.is_travel(reference) {
            return false;
        }
        let (Some(company_id), Some(gc_id)) = (&self.company_id, &self.general_contract_id) else {
            return false;
        };
        reference
            .company(company_id)
            .and_then(|company| company.general_contract(gc_id))
            .is_some_and(|gc| gc.corporate_benefits)
    }

    /// Enabled and completely filled in; waives per-person consent and applies the discount.
    pub fn corporate_discount_active(&self, reference: &ReferenceData) -> bool {
        self.corporate_benefits_enabled(reference) && self.corporate.is_complete()
    }

    pub fn contains_iin(&self, iin: &str) -> bool {
        self.persons.iter().any(|person| person.iin == iin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Pending,
    Active,
    Rejected,
    Voided,
    Cancelled,
}

impl ContractStatus {
    pub const fn all() -> [Self; 6] {
        [
            Self::Draft,
            Self::Pending,
            Self::Active,
            Self::Rejected,
            Self::Voided,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Voided => "voided",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Draft => "Created",
            Self::Pending => "Issued",
            Self::Active => "Concluded",
            Self::Rejected => "Rejected",
            Self::Voided => "Spoiled",
            Self::Cancelled => "Terminated",
        }
    }

    /// `draft` and `rejected` records may be reopened and resubmitted.
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

/// Committed contract. Only the status-transition fields change after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: ContractId,
    pub external_id: String,
    pub product: String,
    pub status: ContractStatus,
    pub company_id: CompanyId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub general_contract_id: String,
    pub blank_type: BlankType,
    pub blank_id: Option<String>,
    pub policy_number: Option<String>,
    pub crm_id: Option<String>,
    pub territories: Vec<String>,
    pub travel: Option<TravelTerms>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub persons: Vec<InsuredPerson>,
    pub corporate: Option<CorporateTerms>,
    pub kdp_confirmed: bool,
    pub premium: u64,
    pub rejection: Option<Rejection>,
    pub cancellation_reason: Option<String>,
}

impl ContractRecord {
    pub fn coverage_not_started(&self, today: NaiveDate) -> bool {
        self.start_date > today
    }

    /// Whether this record holds its paper blank out of the free inventory.
    pub fn consumes_blank(&self) -> bool {
        self.blank_type == BlankType::Paper && self.status != ContractStatus::Draft
    }
}

/// User-correctable validation failures. A failing command leaves the draft unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DraftError {
    #[error("select a product first")]
    NoProductSelected,
    #[error("unknown product '{0}'")]
    UnknownProduct(String),
    #[error("product '{0}' has no general contract for this company")]
    ProductUnavailable(String),
    #[error("general contract '{0}' does not belong to this company and product")]
    GeneralContractMismatch(String),
    #[error("this field only applies to travel products")]
    TravelFieldsUnavailable,
    #[error("unknown {catalog} '{id}'")]
    UnknownCatalogEntry { catalog: &'static str, id: String },
    #[error("territory '{0}' is already selected")]
    DuplicateTerritory(String),
    #[error("territory '{0}' is not selected")]
    TerritoryNotSelected(String),
    #[error("at most {max} territories may be selected")]
    TerritoryLimit { max: usize },
    #[error("a sport type requires the 'sport' trip purpose")]
    SportRequiresSportPurpose,
    #[error("insured amount must be positive")]
    InvalidAmount,
    #[error("start date {start} must be after {today}")]
    StartDateNotAfterToday { start: NaiveDate, today: NaiveDate },
    #[error("end date must not be before the start date")]
    EndBeforeStart,
    #[error("insurance period must be at least one day")]
    NonPositiveDayCount,
    #[error("insurance period does not fit the calendar")]
    PeriodOutOfRange,
    #[error("paper blanks can only be chosen for the paper blank type")]
    BlankTypeNotPaper,
    #[error("paper blank '{0}' is not free")]
    BlankNotFree(String),
    #[error("IIN '{0}' must be exactly 12 digits")]
    InvalidIin(String),
    #[error("person with IIN '{0}' is already insured in this draft")]
    DuplicatePerson(String),
    #[error("at most {max} insured persons are allowed")]
    PersonLimit { max: usize },
    #[error("last and first name are required")]
    MissingName,
    #[error("birth date is required")]
    MissingBirthDate,
    #[error("birth date cannot be in the future")]
    BirthDateInFuture,
    #[error("manual entry without IIN is only allowed for persons under 1 or over 64, got age {age}")]
    AgeBandNotEligible { age: i32 },
    #[error("attach the signed paper consent first")]
    ConsentFileMissing,
    #[error("consent file must have a name")]
    ConsentFileUnnamed,
    #[error("consent file is {size} bytes, the limit is {max}")]
    ConsentFileTooLarge { size: u64, max: u64 },
    #[error("calculator count must be at least 1")]
    InvalidCount,
    #[error("no insured person at position {0}")]
    PersonIndexOutOfRange(usize),
    #[error("the selected general contract does not enable corporate benefits")]
    CorporateBenefitsUnavailable,
    #[error("discount must be between 0 and 100")]
    InvalidDiscount,
}
