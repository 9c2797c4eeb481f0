use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::access::{Capability, PermissionGrant, Scope};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl RoleId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CompanyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RegionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub code: String,
}

/// Static role definition. Never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub scope: Option<Scope>,
    pub permissions: BTreeMap<Capability, PermissionGrant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: RoleId,
    pub company_id: Option<CompanyId>,
    pub region_id: Option<RegionId>,
}

/// Umbrella agreement between the insurer and a partner company for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralContract {
    pub id: String,
    pub number: String,
    pub product: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub corporate_benefits: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankStatus {
    Free,
    Used,
}

/// Pre-numbered physical policy form held by a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperBlank {
    pub id: String,
    pub series: String,
    pub number: String,
    pub status: BlankStatus,
    pub used_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub region_id: RegionId,
    pub prefix: String,
    pub general_contracts: Vec<GeneralContract>,
    pub paper_blanks: Vec<PaperBlank>,
    pub allow_local_user_admin: bool,
}

impl Company {
    pub fn general_contract(&self, id: &str) -> Option<&GeneralContract> {
        self.general_contracts.iter().find(|gc| gc.id == id)
    }

    pub fn general_contracts_for(&self, product: &str) -> impl Iterator<Item = &GeneralContract> {
        let product = product.to_string();
        self.general_contracts
            .iter()
            .filter(move |gc| gc.product == product)
    }

    pub fn offers(&self, product: &str) -> bool {
        self.general_contracts.iter().any(|gc| gc.product == product)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductLayout {
    Travel,
    Basic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub code: String,
    pub policy_code: String,
    pub name: String,
    pub layout: ProductLayout,
    pub default_amount: u32,
    pub recommended: bool,
}

impl Product {
    pub fn is_travel(&self) -> bool {
        self.layout == ProductLayout::Travel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    pub popular: bool,
}

/// Minimum insured amount and rate loading required to cover a territory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountryRule {
    pub min_amount: u32,
    pub currency: Currency,
    pub rate_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripPurpose {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportType {
    pub id: String,
    pub name: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub multi_trip: bool,
    pub max_days_per_trip: Option<u16>,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramVariant {
    pub id: String,
    pub name: String,
    pub includes_covid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountPreset {
    pub value: u32,
    pub currency: Currency,
    pub label: String,
}

/// Stable CRM rejection taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    AmlHit,
    SanctionMatch,
    KdpMissing,
    InvalidIin,
    Duplicate,
    DateInvalid,
    LimitExceeded,
    CrmValidationError,
    IntegrationTimeout,
}

impl ReasonCode {
    pub const fn all() -> [Self; 9] {
        [
            Self::AmlHit,
            Self::SanctionMatch,
            Self::KdpMissing,
            Self::InvalidIin,
            Self::Duplicate,
            Self::DateInvalid,
            Self::LimitExceeded,
            Self::CrmValidationError,
            Self::IntegrationTimeout,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AmlHit => "AML_HIT",
            Self::SanctionMatch => "SANCTION_MATCH",
            Self::KdpMissing => "KDP_MISSING",
            Self::InvalidIin => "INVALID_IIN",
            Self::Duplicate => "DUPLICATE",
            Self::DateInvalid => "DATE_INVALID",
            Self::LimitExceeded => "LIMIT_EXCEEDED",
            Self::CrmValidationError => "CRM_VALIDATION_ERROR",
            Self::IntegrationTimeout => "INTEGRATION_TIMEOUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::all()
            .into_iter()
            .find(|code| code.as_str() == normalized)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonInfo {
    pub code: ReasonCode,
    pub title: String,
    pub description: String,
}

/// Entry of the simulated national person registry, keyed by IIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPerson {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub doc_type: String,
    pub doc_number: String,
}
