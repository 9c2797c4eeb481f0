//! Seeded catalogs for the portal.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::domain::*;
use crate::access::{Capability, PermissionGrant, PredicateId, Scope};

pub const ROLE_OPERATOR: &str = "operator_partner";
pub const ROLE_PARTNER_ADMIN: &str = "partner_admin";
pub const ROLE_REGION_CURATOR: &str = "region_curator";
pub const ROLE_REGION_ADMIN: &str = "region_admin";
pub const ROLE_OWNER: &str = "owner";
pub const ROLE_OBSERVER: &str = "observer_assistance";

pub const PRODUCT_TRAVEL: &str = "travel";
pub const PRODUCT_MANDATORY: &str = "mandatory";

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

pub fn regions() -> Vec<Region> {
    [
        ("reg-1", "Almaty region", "ALM"),
        ("reg-2", "Astana", "AST"),
        ("reg-3", "Shymkent", "SHY"),
    ]
    .into_iter()
    .map(|(id, name, code)| Region {
        id: RegionId::new(id),
        name: name.to_string(),
        code: code.to_string(),
    })
    .collect()
}

fn general_contract(id: &str, number: &str, product: &str, corporate_benefits: bool) -> GeneralContract {
    GeneralContract {
        id: id.to_string(),
        number: number.to_string(),
        product: product.to_string(),
        valid_from: date(2024, 1, 1),
        valid_to: date(2027, 12, 31),
        corporate_benefits,
    }
}

fn blanks(series: &str, first_id: usize, used: &[(usize, &str)], count: usize) -> Vec<PaperBlank> {
    (0..count)
        .map(|offset| {
            let number = offset + 1;
            let used_by = used
                .iter()
                .find(|(slot, _)| *slot == number)
                .map(|(_, contract)| contract.to_string());
            PaperBlank {
                id: format!("pb-{}", first_id + offset),
                series: series.to_string(),
                number: format!("{number:06}"),
                status: if used_by.is_some() {
                    BlankStatus::Used
                } else {
                    BlankStatus::Free
                },
                used_by,
            }
        })
        .collect()
}

pub fn companies() -> Vec<Company> {
    vec![
        Company {
            id: CompanyId::new("tc-1"),
            name: "Silk Road Travel".to_string(),
            region_id: RegionId::new("reg-1"),
            prefix: "SRT".to_string(),
            general_contracts: vec![
                general_contract("gc-1", "GD-2024/001", PRODUCT_TRAVEL, true),
                general_contract("gc-2", "GD-2024/002", PRODUCT_MANDATORY, false),
            ],
            paper_blanks: blanks("A", 1, &[(3, "cnt-1"), (5, "cnt-2")], 5),
            allow_local_user_admin: true,
        },
        Company {
            id: CompanyId::new("tc-2"),
            name: "Nomad Tours".to_string(),
            region_id: RegionId::new("reg-1"),
            prefix: "NMD".to_string(),
            general_contracts: vec![general_contract("gc-3", "GD-2024/003", PRODUCT_TRAVEL, false)],
            paper_blanks: blanks("B", 6, &[], 2),
            allow_local_user_admin: false,
        },
        Company {
            id: CompanyId::new("tc-3"),
            name: "Astana Travel".to_string(),
            region_id: RegionId::new("reg-2"),
            prefix: "AST".to_string(),
            general_contracts: vec![
                general_contract("gc-4", "GD-2024/004", PRODUCT_TRAVEL, true),
                general_contract("gc-5", "GD-2024/005", PRODUCT_MANDATORY, false),
            ],
            paper_blanks: blanks("V", 8, &[(2, "cnt-3")], 3),
            allow_local_user_admin: true,
        },
        Company {
            id: CompanyId::new("tc-4"),
            name: "Capital Voyages".to_string(),
            region_id: RegionId::new("reg-2"),
            prefix: "CVY".to_string(),
            general_contracts: vec![general_contract("gc-6", "GD-2024/006", PRODUCT_TRAVEL, false)],
            paper_blanks: blanks("G", 11, &[], 1),
            allow_local_user_admin: false,
        },
        Company {
            id: CompanyId::new("tc-5"),
            name: "South Wind".to_string(),
            region_id: RegionId::new("reg-3"),
            prefix: "SWD".to_string(),
            general_contracts: vec![
                general_contract("gc-7", "GD-2024/007", PRODUCT_TRAVEL, false),
                general_contract("gc-8", "GD-2024/008", PRODUCT_MANDATORY, false),
            ],
            paper_blanks: blanks("D", 12, &[], 3),
            allow_local_user_admin: true,
        },
        Company {
            id: CompanyId::new("tc-6"),
            name: "Desert Star".to_string(),
            region_id: RegionId::new("reg-3"),
            prefix: "DST".to_string(),
            general_contracts: vec![general_contract("gc-9", "GD-2024/009", PRODUCT_TRAVEL, false)],
            paper_blanks: blanks("E", 15, &[(2, "cnt-4")], 2),
            allow_local_user_admin: false,
        },
    ]
}

const BASE_CAPABILITIES: [Capability; 13] = [
    Capability::Create,
    Capability::Activate,
    Capability::ViewOwn,
    Capability::ViewCompany,
    Capability::ViewRegion,
    Capability::ViewAll,
    Capability::Reports,
    Capability::ReportsExport,
    Capability::AdminUsers,
    Capability::AdminSettings,
    Capability::AdminBlanks,
    Capability::VoidBeforeStart,
    Capability::CancelBeforeStart,
];

fn role(
    id: &str,
    name: &str,
    description: &str,
    scope: Scope,
    allowed: &[Capability],
    conditional: &[(Capability, PredicateId)],
) -> Role {
    let mut permissions: BTreeMap<Capability, PermissionGrant> = BASE_CAPABILITIES
        .into_iter()
        .map(|capability| (capability, PermissionGrant::Denied))
        .collect();
    for capability in allowed {
        permissions.insert(*capability, PermissionGrant::Allowed);
    }
    for (capability, predicate) in conditional {
        permissions.insert(*capability, PermissionGrant::ConditionalOn(*predicate));
    }

    Role {
        id: RoleId::new(id),
        name: name.to_string(),
        description: description.to_string(),
        scope: Some(scope),
        permissions,
    }
}

pub fn roles() -> BTreeMap<RoleId, Role> {
    use Capability::*;

    [
        role(
            ROLE_OPERATOR,
            "Partner operator",
            "Drafts and activates contracts, sees own company",
            Scope::Company,
            &[Create, Activate, ViewOwn, ViewCompany, VoidBeforeStart, CancelBeforeStart],
            &[],
        ),
        role(
            ROLE_PARTNER_ADMIN,
            "Partner administrator",
            "Manages own company and its reports",
            Scope::Company,
            &[
                Create,
                Activate,
                ViewOwn,
                ViewCompany,
                Reports,
                ReportsExport,
                VoidBeforeStart,
                CancelBeforeStart,
            ],
            &[(AdminUsers, PredicateId::CompanyAllowsLocalUserAdmin)],
        ),
        role(
            ROLE_REGION_CURATOR,
            "Region curator",
            "Views and reports on a region, manages blanks",
            Scope::Region,
            &[ViewOwn, ViewCompany, ViewRegion, Reports, ReportsExport, AdminBlanks],
            &[],
        ),
        role(
            ROLE_REGION_ADMIN,
            "Region administrator",
            "Full control over a region",
            Scope::Region,
            &[
                ViewOwn,
                ViewCompany,
                ViewRegion,
                Reports,
                ReportsExport,
                AdminUsers,
                AdminSettings,
                AdminBlanks,
                VoidBeforeStart,
                CancelBeforeStart,
            ],
            &[],
        ),
        role(
            ROLE_OWNER,
            "Insurer owner",
            "Full access to the whole system",
            Scope::Global,
            &BASE_CAPABILITIES,
            &[],
        ),
        role(
            ROLE_OBSERVER,
            "Observer / assistance",
            "Search and validity checks only",
            Scope::Global,
            &[ViewAll, SearchOnly, MaskSensitive],
            &[],
        ),
    ]
    .into_iter()
    .map(|role| (role.id.clone(), role))
    .collect()
}

pub fn users() -> Vec<User> {
    let rows: [(&str, &str, &str, &str, Option<&str>, Option<&str>, Option<&str>); 20] = [
        ("u-1", "operator1@silkroad.kz", "Айгуль Сериккызы", ROLE_OPERATOR, Some("tc-1"), Some("reg-1"), Some("+7 701 100 0001")),
        ("u-2", "operator2@silkroad.kz", "Бауыржан Касымов", ROLE_OPERATOR, Some("tc-1"), Some("reg-1"), Some("+7 701 100 0002")),
        ("u-3", "admin@silkroad.kz", "Динара Ахметова", ROLE_PARTNER_ADMIN, Some("tc-1"), Some("reg-1"), Some("+7 701 100 0003")),
        ("u-4", "operator@nomad.kz", "Ерлан Нурланов", ROLE_OPERATOR, Some("tc-2"), Some("reg-1"), Some("+7 702 200 0004")),
        ("u-5", "admin@nomad.kz", "Жанна Темирова", ROLE_PARTNER_ADMIN, Some("tc-2"), Some("reg-1"), Some("+7 702 200 0005")),
        ("u-6", "operator1@astanatravel.kz", "Зарина Бекетова", ROLE_OPERATOR, Some("tc-3"), Some("reg-2"), Some("+7 705 300 0006")),
        ("u-7", "operator2@astanatravel.kz", "Ильяс Муратов", ROLE_OPERATOR, Some("tc-3"), Some("reg-2"), Some("+7 705 300 0007")),
        ("u-8", "admin@astanatravel.kz", "Камила Жумагулова", ROLE_PARTNER_ADMIN, Some("tc-3"), Some("reg-2"), Some("+7 705 300 0008")),
        ("u-9", "operator@capitalvoyages.kz", "Лаура Сагинбаева", ROLE_OPERATOR, Some("tc-4"), Some("reg-2"), Some("+7 707 400 0009")),
        ("u-10", "admin@capitalvoyages.kz", "Марат Оспанов", ROLE_PARTNER_ADMIN, Some("tc-4"), Some("reg-2"), Some("+7 707 400 0010")),
        ("u-11", "operator1@southwind.kz", "Нурай Калиева", ROLE_OPERATOR, Some("tc-5"), Some("reg-3"), Some("+7 708 500 0011")),
        ("u-12", "operator2@southwind.kz", "Олжас Турсынбеков", ROLE_OPERATOR, Some("tc-5"), Some("reg-3"), Some("+7 708 500 0012")),
        ("u-13", "admin@southwind.kz", "Перизат Аманкулова", ROLE_PARTNER_ADMIN, Some("tc-5"), Some("reg-3"), Some("+7 708 500 0013")),
        ("u-14", "operator@desertstar.kz", "Рустем Ибрагимов", ROLE_OPERATOR, Some("tc-6"), Some("reg-3"), Some("+7 747 600 0014")),
        ("u-15", "admin@desertstar.kz", "Сауле Нурмуханова", ROLE_PARTNER_ADMIN, Some("tc-6"), Some("reg-3"), Some("+7 747 600 0015")),
        ("u-16", "curator.almaty@insurance.kz", "Талғат Жүнісов", ROLE_REGION_CURATOR, None, Some("reg-1"), None),
        ("u-17", "admin.almaty@insurance.kz", "Улан Серікбаев", ROLE_REGION_ADMIN, None, Some("reg-1"), None),
        ("u-18", "curator.astana@insurance.kz", "Фариза Ералиева", ROLE_REGION_CURATOR, None, Some("reg-2"), None),
        ("u-19", "owner@insurance.kz", "Хан Болатов", ROLE_OWNER, None, None, None),
        ("u-20", "assistance@insurance.kz", "Шынар Қасымқызы", ROLE_OBSERVER, None, None, None),
    ];

    rows.into_iter()
        .map(|(id, email, name, role, company, region, phone)| User {
            id: UserId::new(id),
            email: email.to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            role: RoleId::new(role),
            company_id: company.map(CompanyId::new),
            region_id: region.map(RegionId::new),
        })
        .collect()
}

pub fn products() -> Vec<Product> {
    vec![
        Product {
            id: PRODUCT_TRAVEL.to_string(),
            code: "ВЗР".to_string(),
            policy_code: "VZR".to_string(),
            name: "Travel abroad".to_string(),
            layout: ProductLayout::Travel,
            default_amount: 30_000,
            recommended: true,
        },
        Product {
            id: PRODUCT_MANDATORY.to_string(),
            code: "ОСТ".to_string(),
            policy_code: "OST".to_string(),
            name: "Mandatory tourist insurance".to_string(),
            layout: ProductLayout::Basic,
            default_amount: 30_000,
            recommended: false,
        },
    ]
}

pub fn countries() -> Vec<Country> {
    [
        ("TR", "Turkey", true),
        ("AE", "United Arab Emirates", true),
        ("TH", "Thailand", true),
        ("EG", "Egypt", true),
        ("GE", "Georgia", true),
        ("IT", "Italy", false),
        ("ES", "Spain", false),
        ("FR", "France", false),
        ("DE", "Germany", false),
        ("GR", "Greece", false),
        ("CZ", "Czechia", false),
        ("HU", "Hungary", false),
        ("PL", "Poland", false),
        ("UK", "United Kingdom", false),
        ("US", "United States", false),
        ("CN", "China", false),
        ("JP", "Japan", false),
        ("KR", "South Korea", false),
        ("VN", "Vietnam", false),
        ("ID", "Indonesia", false),
        ("MY", "Malaysia", false),
        ("SG", "Singapore", false),
        ("MV", "Maldives", false),
        ("LK", "Sri Lanka", false),
        ("IN", "India", false),
        ("IL", "Israel", false),
        ("CY", "Cyprus", false),
        ("PT", "Portugal", false),
        ("NL", "Netherlands", false),
        ("AT", "Austria", false),
        ("BE", "Belgium", false),
        ("CH", "Switzerland", false),
        ("BG", "Bulgaria", false),
        ("ME", "Montenegro", false),
        ("HR", "Croatia", false),
        ("RS", "Serbia", false),
        ("UZ", "Uzbekistan", false),
        ("KG", "Kyrgyzstan", false),
        ("AZ", "Azerbaijan", false),
        ("AM", "Armenia", false),
        ("QA", "Qatar", false),
        ("SA", "Saudi Arabia", false),
        ("SGN", "Singapore + Malaysia", false),
        ("SCHENGEN", "Schengen area", true),
        ("WORLD", "Worldwide", false),
    ]
    .into_iter()
    .map(|(code, name, popular)| Country {
        code: code.to_string(),
        name: name.to_string(),
        popular,
    })
    .collect()
}

pub fn country_rules() -> BTreeMap<String, CountryRule> {
    [
        ("SCHENGEN", 30_000, Currency::Eur, 1.35),
        ("GE", 30_000, Currency::Usd, 1.1),
        ("US", 50_000, Currency::Usd, 1.5),
        ("WORLD", 50_000, Currency::Usd, 1.55),
    ]
    .into_iter()
    .map(|(code, min_amount, currency, rate_factor)| {
        (
            code.to_string(),
            CountryRule {
                min_amount,
                currency,
                rate_factor,
            },
        )
    })
    .collect()
}

pub fn default_country_rule() -> CountryRule {
    CountryRule {
        min_amount: 10_000,
        currency: Currency::Usd,
        rate_factor: 1.0,
    }
}

pub fn purposes() -> Vec<TripPurpose> {
    [
        ("tourism", "Tourism"),
        ("guest", "Private visit"),
        ("business", "Business trip"),
        ("education", "Education / internship"),
        ("business_tourism", "Business tourism"),
        (super::SPORT_PURPOSE, "Sport"),
    ]
    .into_iter()
    .map(|(id, name)| TripPurpose {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

pub fn sports() -> Vec<SportType> {
    [
        ("skiing", "Skiing", 1.30),
        ("snowboarding", "Snowboarding", 1.35),
        ("diving", "Diving", 1.40),
        ("mountaineering", "Mountaineering", 1.60),
        ("cycling", "Cycling", 1.20),
        ("water_sports", "Water sports", 1.25),
    ]
    .into_iter()
    .map(|(id, name, factor)| SportType {
        id: id.to_string(),
        name: name.to_string(),
        factor,
    })
    .collect()
}

pub fn programs() -> Vec<Program> {
    let mut programs = vec![Program {
        id: "base".to_string(),
        name: "Base".to_string(),
        multi_trip: false,
        max_days_per_trip: None,
        hint: None,
    }];
    programs.extend([30u16, 60, 90].into_iter().map(|days| Program {
        id: format!("multi_{days}"),
        name: format!("Multi Trip {days}"),
        multi_trip: true,
        max_days_per_trip: Some(days),
        hint: Some(format!(
            "Repeated trips during the year, up to {days} days each"
        )),
    }));
    programs
}

pub fn variants() -> Vec<ProgramVariant> {
    [
        ("standard", "Standard", false),
        ("plus", "Plus", false),
        ("sport_light", "Sport Light", false),
        ("sport_pro", "Sport Pro", false),
        ("covid", "+COVID", true),
        ("covid_only", "COVID-only", true),
    ]
    .into_iter()
    .map(|(id, name, includes_covid)| ProgramVariant {
        id: id.to_string(),
        name: name.to_string(),
        includes_covid,
    })
    .collect()
}

pub fn amounts() -> Vec<AmountPreset> {
    [
        (10_000, Currency::Usd),
        (30_000, Currency::Usd),
        (30_000, Currency::Eur),
        (50_000, Currency::Usd),
    ]
    .into_iter()
    .map(|(value, currency)| AmountPreset {
        value,
        currency,
        label: format!("{} 000 {}", value / 1000, currency.code()),
    })
    .collect()
}

pub fn reasons() -> BTreeMap<ReasonCode, ReasonInfo> {
    [
        (
            ReasonCode::AmlHit,
            "AML check failed",
            "The client is listed by the AML prime source. Compliance must review the case.",
        ),
        (
            ReasonCode::SanctionMatch,
            "Sanctions restriction",
            "The client or a related party is on a sanctions list. Insurance is not possible.",
        ),
        (
            ReasonCode::KdpMissing,
            "Personal data consent missing",
            "No personal data processing consent was received from the insured person.",
        ),
        (
            ReasonCode::InvalidIin,
            "Invalid IIN",
            "The IIN failed validation or was not found in the registry.",
        ),
        (
            ReasonCode::Duplicate,
            "Duplicate contract",
            "An active contract with the same parameters exists for this insured person.",
        ),
        (
            ReasonCode::DateInvalid,
            "Invalid dates",
            "The insurance period is invalid or outside the allowed range.",
        ),
        (
            ReasonCode::LimitExceeded,
            "Limit exceeded",
            "The number of insured persons or covered territories exceeds the limit.",
        ),
        (
            ReasonCode::CrmValidationError,
            "CRM validation error",
            "The data failed internal CRM validation. Check the form fields.",
        ),
        (
            ReasonCode::IntegrationTimeout,
            "Integration timeout",
            "The external system did not answer in time. Try again later.",
        ),
    ]
    .into_iter()
    .map(|(code, title, description)| {
        (
            code,
            ReasonInfo {
                code,
                title: title.to_string(),
                description: description.to_string(),
            },
        )
    })
    .collect()
}

pub fn registry() -> BTreeMap<String, RegistryPerson> {
    [
        ("850315300123", "Қасымов", "Арман", "Бекетович", date(1985, 3, 15), "M", "id_card", "012345678"),
        ("900722400234", "Нұрланова", "Айгерім", "Сәкенқызы", date(1990, 7, 22), "F", "passport", "N12345678"),
        ("781103500345", "Сериков", "Болат", "Маратович", date(1978, 11, 3), "M", "id_card", "034567890"),
        ("150510600456", "Қасымов", "Алихан", "Арманұлы", date(2015, 5, 10), "M", "birth_cert", "I-АА 123456"),
        ("820918700567", "Темірова", "Дана", "Қайратқызы", date(1982, 9, 18), "F", "id_card", "056789012"),
        ("950425800678", "Ахметов", "Руслан", "Қайратұлы", date(1995, 4, 25), "M", "id_card", "067890123"),
        ("880612900789", "Жумабаева", "Гульнар", "Сейтқызы", date(1988, 6, 12), "F", "passport", "N23456789"),
    ]
    .into_iter()
    .map(
        |(iin, last, first, middle, birth_date, gender, doc_type, doc_number)| {
            (
                iin.to_string(),
                RegistryPerson {
                    last_name: last.to_string(),
                    first_name: first.to_string(),
                    middle_name: middle.to_string(),
                    birth_date,
                    gender: gender.to_string(),
                    doc_type: doc_type.to_string(),
                    doc_number: doc_number.to_string(),
                },
            )
        },
    )
    .collect()
}
