//! Contracts present on a fresh start, dated relative to `today`.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use super::domain::{
    BlankType, ContractId, ContractRecord, ContractStatus, InsuredAmount, InsuredPerson,
    KdpStatus, TravelTerms,
};
use super::intake::registry_person;
use crate::integrations::crm::Rejection;
use crate::integrations::registry::{LookupSource, RegistryLookup};
use crate::reference::{CompanyId, Currency, ReasonCode, ReferenceData, UserId};

const SEED_PERSONS: [&str; 5] = [
    "850315300123",
    "900722400234",
    "781103500345",
    "150510600456",
    "820918700567",
];

struct SeedRow {
    id: &'static str,
    product: &'static str,
    status: ContractStatus,
    company: &'static str,
    author: &'static str,
    created: i64,
    general_contract: &'static str,
    blank: Option<&'static str>,
    policy: Option<(&'static str, &'static str)>,
    territories: &'static [&'static str],
    travel: Option<(&'static str, &'static str, &'static str, u32)>,
    period: (i64, i64),
    persons: &'static [usize],
    premium: u64,
}

static ROWS: [SeedRow; 10] = [
    SeedRow {
        id: "cnt-1",
        product: "travel",
        status: ContractStatus::Active,
        company: "tc-1",
        author: "u-1",
        created: -30,
        general_contract: "gc-1",
        blank: Some("pb-3"),
        policy: Some(("SRT-VZR-2024-00001", "CRM-123456")),
        territories: &["TR"],
        travel: Some(("base", "standard", "tourism", 30_000)),
        period: (-25, 5),
        persons: &[0, 1],
        premium: 12_500,
    },
    SeedRow {
        id: "cnt-2",
        product: "travel",
        status: ContractStatus::Active,
        company: "tc-1",
        author: "u-2",
        created: -15,
        general_contract: "gc-1",
        blank: Some("pb-5"),
        policy: Some(("SRT-VZR-2024-00002", "CRM-123457")),
        territories: &["AE", "TH"],
        travel: Some(("base", "plus", "tourism", 50_000)),
        period: (5, 20),
        persons: &[2],
        premium: 18_750,
    },
    SeedRow {
        id: "cnt-3",
        product: "mandatory",
        status: ContractStatus::Active,
        company: "tc-3",
        author: "u-6",
        created: -10,
        general_contract: "gc-5",
        blank: Some("pb-9"),
        policy: Some(("AST-OST-2024-00001", "CRM-123458")),
        territories: &["SCHENGEN"],
        travel: None,
        period: (-5, 25),
        persons: &[3],
        premium: 8_500,
    },
    SeedRow {
        id: "cnt-4",
        product: "travel",
        status: ContractStatus::Active,
        company: "tc-6",
        author: "u-14",
        created: -5,
        general_contract: "gc-9",
        blank: Some("pb-16"),
        policy: Some(("DST-VZR-2024-00001", "CRM-123459")),
        territories: &["EG"],
        travel: Some(("base", "covid", "tourism", 30_000)),
        period: (10, 24),
        persons: &[4],
        premium: 14_200,
    },
    SeedRow {
        id: "cnt-5",
        product: "travel",
        status: ContractStatus::Draft,
        company: "tc-1",
        author: "u-1",
        created: 0,
        general_contract: "gc-1",
        blank: None,
        policy: None,
        territories: &["GE"],
        travel: Some(("base", "standard", "guest", 30_000)),
        period: (7, 14),
        persons: &[],
        premium: 0,
    },
    SeedRow {
        id: "cnt-6",
        product: "travel",
        status: ContractStatus::Draft,
        company: "tc-2",
        author: "u-4",
        created: -1,
        general_contract: "gc-3",
        blank: None,
        policy: None,
        territories: &["TR"],
        travel: Some(("base", "standard", "tourism", 30_000)),
        period: (3, 10),
        persons: &[0],
        premium: 5_200,
    },
    SeedRow {
        id: "cnt-7",
        product: "travel",
        status: ContractStatus::Rejected,
        company: "tc-3",
        author: "u-7",
        created: -3,
        general_contract: "gc-4",
        blank: None,
        policy: None,
        territories: &["US"],
        travel: Some(("base", "standard", "business", 50_000)),
        period: (10, 25),
        persons: &[2],
        premium: 22_500,
    },
    SeedRow {
        id: "cnt-8",
        product: "travel",
        status: ContractStatus::Rejected,
        company: "tc-5",
        author: "u-11",
        created: -2,
        general_contract: "gc-7",
        blank: None,
        policy: None,
        territories: &["SCHENGEN"],
        travel: Some(("multi_90", "plus", "tourism", 30_000)),
        period: (5, 370),
        persons: &[1],
        premium: 45_000,
    },
    SeedRow {
        id: "cnt-9",
        product: "travel",
        status: ContractStatus::Cancelled,
        company: "tc-4",
        author: "u-9",
        created: -20,
        general_contract: "gc-6",
        blank: None,
        policy: Some(("CVY-VZR-2024-00001", "CRM-123460")),
        territories: &["IT", "ES", "FR"],
        travel: Some(("base", "standard", "tourism", 30_000)),
        period: (-10, 4),
        persons: &[0, 1, 3],
        premium: 28_500,
    },
    SeedRow {
        id: "cnt-10",
        product: "travel",
        status: ContractStatus::Pending,
        company: "tc-1",
        author: "u-2",
        created: 0,
        general_contract: "gc-1",
        blank: None,
        policy: None,
        territories: &["TH", "VN"],
        travel: Some(("base", "covid", "tourism", 30_000)),
        period: (14, 28),
        persons: &[4],
        premium: 16_800,
    },
];

fn at(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(10, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now)
}

fn seed_person(reference: &ReferenceData, index: usize, kdp_status: KdpStatus) -> Option<InsuredPerson> {
    let iin = SEED_PERSONS.get(index)?;
    let lookup = RegistryLookup {
        person: reference.registry_person(iin)?.clone(),
        source: LookupSource::Seeded,
    };
    Some(registry_person(iin, &lookup, kdp_status))
}

fn rejection(reference: &ReferenceData, code: ReasonCode) -> Rejection {
    let info = reference.reason(code.as_str());
    Rejection {
        code: code.as_str().to_string(),
        title: info.title,
        description: info.description,
    }
}

pub fn seed_contracts(reference: &ReferenceData, today: NaiveDate) -> Vec<ContractRecord> {
    ROWS.iter()
        .enumerate()
        .map(|(position, row)| {
            let created_at = at(today + Duration::days(row.created));
            let kdp_confirmed = row.status != ContractStatus::Draft;
            let kdp_status = if kdp_confirmed {
                KdpStatus::Confirmed
            } else {
                KdpStatus::Pending
            };
            let persons: Vec<InsuredPerson> = row
                .persons
                .iter()
                .filter_map(|index| seed_person(reference, *index, kdp_status))
                .collect();
            let activated = matches!(row.status, ContractStatus::Active | ContractStatus::Cancelled);

            ContractRecord {
                id: ContractId::new(row.id),
                external_id: format!("ext-{:03}", position + 1),
                product: row.product.to_string(),
                status: row.status,
                company_id: CompanyId::new(row.company),
                created_by: UserId::new(row.author),
                created_at,
                activated_at: activated.then_some(created_at),
                rejected_at: (row.status == ContractStatus::Rejected).then_some(created_at),
                voided_at: None,
                cancelled_at: (row.status == ContractStatus::Cancelled)
                    .then(|| created_at + Duration::days(2)),
                general_contract_id: row.general_contract.to_string(),
                blank_type: if row.blank.is_some() {
                    BlankType::Paper
                } else {
                    BlankType::Electronic
                },
                blank_id: row.blank.map(str::to_string),
                policy_number: row.policy.map(|(policy, _)| policy.to_string()),
                crm_id: row.policy.map(|(_, crm)| crm.to_string()),
                territories: row.territories.iter().map(|code| code.to_string()).collect(),
                travel: row.travel.map(|(program, variant, purpose, amount)| TravelTerms {
                    program: program.to_string(),
                    variant: variant.to_string(),
                    purpose: purpose.to_string(),
                    sport: None,
                    amount: InsuredAmount {
                        value: amount,
                        currency: Currency::Usd,
                    },
                }),
                start_date: today + Duration::days(row.period.0),
                end_date: today + Duration::days(row.period.1),
                persons,
                corporate: None,
                kdp_confirmed,
                premium: row.premium,
                rejection: match row.id {
                    "cnt-7" => Some(rejection(reference, ReasonCode::AmlHit)),
                    "cnt-8" => Some(rejection(reference, ReasonCode::SanctionMatch)),
                    _ => None,
                },
                cancellation_reason: (row.status == ContractStatus::Cancelled)
                    .then(|| "Trip cancelled at the client's request".to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_ten_contracts_with_registry_persons() {
        let reference = ReferenceData::standard();
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date");
        let contracts = seed_contracts(&reference, today);

        assert_eq!(contracts.len(), 10);
        assert_eq!(contracts[0].persons.len(), 2);
        assert_eq!(contracts[8].persons.len(), 3);
        assert!(contracts[0].consumes_blank());
        assert!(!contracts[0].coverage_not_started(today));
        assert!(contracts[1].coverage_not_started(today));
        assert_eq!(
            contracts[6].rejection.as_ref().map(|rejection| rejection.code.as_str()),
            Some("AML_HIT")
        );
    }
}
