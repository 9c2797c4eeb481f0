//! Read-only reference data: roles, companies, users, products, territory rules,
//! travel catalogs, reason codes and the simulated person registry.

mod domain;
pub mod seed;

use std::collections::BTreeMap;

use serde::Serialize;

pub use domain::{
    AmountPreset, BlankStatus, Company, CompanyId, Country, CountryRule, Currency,
    GeneralContract, PaperBlank, Product, ProductLayout, Program, ProgramVariant, ReasonCode,
    ReasonInfo, Region, RegionId, RegistryPerson, Role, RoleId, SportType, TripPurpose, User,
    UserId,
};

pub const SPORT_PURPOSE: &str = "sport";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceData {
    pub regions: Vec<Region>,
    pub companies: Vec<Company>,
    pub roles: BTreeMap<RoleId, Role>,
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub countries: Vec<Country>,
    pub country_rules: BTreeMap<String, CountryRule>,
    pub default_country_rule: CountryRule,
    pub purposes: Vec<TripPurpose>,
    pub sports: Vec<SportType>,
    pub programs: Vec<Program>,
    pub variants: Vec<ProgramVariant>,
    pub amounts: Vec<AmountPreset>,
    pub reasons: BTreeMap<ReasonCode, ReasonInfo>,
    pub registry: BTreeMap<String, RegistryPerson>,
}

/// Product entry annotated with whether the company holds a general contract for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductOffer {
    pub product: Product,
    pub available: bool,
}

impl ReferenceData {
    /// Catalogs shipped with the portal.
    pub fn standard() -> Self {
        Self {
            regions: seed::regions(),
            companies: seed::companies(),
            roles: seed::roles(),
            users: seed::users(),
            products: seed::products(),
            countries: seed::countries(),
            country_rules: seed::country_rules(),
            default_country_rule: seed::default_country_rule(),
            purposes: seed::purposes(),
            sports: seed::sports(),
            programs: seed::programs(),
            variants: seed::variants(),
            amounts: seed::amounts(),
            reasons: seed::reasons(),
            registry: seed::registry(),
        }
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn company(&self, id: &CompanyId) -> Option<&Company> {
        self.companies.iter().find(|company| &company.id == id)
    }

    pub fn region(&self, id: &RegionId) -> Option<&Region> {
        self.regions.iter().find(|region| &region.id == id)
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|user| &user.id == id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        self.users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    /// First user holding the operator role; used when a login email is unknown.
    pub fn first_operator(&self) -> Option<&User> {
        self.users
            .iter()
            .find(|user| user.role.as_str() == seed::ROLE_OPERATOR)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }

    pub fn products_for_company(&self, company: Option<&CompanyId>) -> Vec<ProductOffer> {
        let company = company.and_then(|id| self.company(id));
        self.products
            .iter()
            .map(|product| ProductOffer {
                product: product.clone(),
                available: company.is_some_and(|company| company.offers(&product.id)),
            })
            .collect()
    }

    pub fn country(&self, code: &str) -> Option<&Country> {
        self.countries.iter().find(|country| country.code == code)
    }

    /// Territory rule, or the default rule for territories without one.
    pub fn country_rule(&self, code: &str) -> CountryRule {
        self.country_rules
            .get(code)
            .copied()
            .unwrap_or(self.default_country_rule)
    }

    pub fn purpose(&self, id: &str) -> Option<&TripPurpose> {
        self.purposes.iter().find(|purpose| purpose.id == id)
    }

    pub fn sport(&self, id: &str) -> Option<&SportType> {
        self.sports.iter().find(|sport| sport.id == id)
    }

    pub fn program(&self, id: &str) -> Option<&Program> {
        self.programs.iter().find(|program| program.id == id)
    }

    pub fn variant(&self, id: &str) -> Option<&ProgramVariant> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    /// Catalog entry for a reason code, falling back to the generic validation error.
    pub fn reason(&self, code: &str) -> ReasonInfo {
        ReasonCode::parse(code)
            .and_then(|code| self.reasons.get(&code))
            .or_else(|| self.reasons.get(&ReasonCode::CrmValidationError))
            .cloned()
            .unwrap_or_else(|| ReasonInfo {
                code: ReasonCode::CrmValidationError,
                title: "CRM validation error".to_string(),
                description: "The CRM rejected the request.".to_string(),
            })
    }

    pub fn registry_person(&self, iin: &str) -> Option<&RegistryPerson> {
        self.registry.get(iin)
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::standard()
    }
}
