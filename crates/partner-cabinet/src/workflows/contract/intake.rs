//! Person intake paths and the readiness predicate each path must satisfy before activation.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{
    ConsentFile, DraftError, InsuredPerson, KdpStatus, Residency, VerificationMode,
};
use crate::integrations::registry::{is_well_formed_iin, RegistryLookup};
use crate::random::RandomSource;

/// Completed years between `birth_date` and `on`.
pub fn full_years(birth_date: NaiveDate, on: NaiveDate) -> i32 {
    let mut years = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    UnderOne,
    Standard,
    OverSixtyFour,
}

impl AgeBand {
    pub fn from_age(age: i32) -> Self {
        if age < 1 {
            Self::UnderOne
        } else if age > 64 {
            Self::OverSixtyFour
        } else {
            Self::Standard
        }
    }
}

/// Age band requested for a calculator batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorBand {
    UnderOne,
    Standard,
    Senior,
}

impl CalculatorBand {
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::UnderOne => "Infant",
            Self::Standard => "Adult",
            Self::Senior => "Senior",
        }
    }

    /// Random birth date whose age on `today` falls inside the band.
    pub fn synthesize_birth_date(self, today: NaiveDate, rng: &mut dyn RandomSource) -> NaiveDate {
        match self {
            Self::UnderOne => today - Duration::days(rng.between(30, 330) as i64),
            Self::Standard => aged(today, rng.between(18, 60), rng),
            Self::Senior => aged(today, rng.between(65, 85), rng),
        }
    }
}

fn aged(today: NaiveDate, years: u64, rng: &mut dyn RandomSource) -> NaiveDate {
    let anniversary = u32::try_from(years * 12)
        .ok()
        .and_then(|months| today.checked_sub_months(Months::new(months)))
        .unwrap_or(today);
    anniversary - Duration::days(rng.between(0, 364) as i64)
}

/// Hand-entered identity for the paths without a registry lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPerson {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub document_number: String,
}

fn checked_identity(input: &ManualPerson, today: NaiveDate) -> Result<NaiveDate, DraftError> {
    if input.last_name.trim().is_empty() || input.first_name.trim().is_empty() {
        return Err(DraftError::MissingName);
    }
    let birth_date = input.birth_date.ok_or(DraftError::MissingBirthDate)?;
    if birth_date > today {
        return Err(DraftError::BirthDateInFuture);
    }
    Ok(birth_date)
}

fn manual_person(
    input: ManualPerson,
    birth_date: NaiveDate,
    residency: Residency,
    verification: VerificationMode,
) -> InsuredPerson {
    InsuredPerson {
        last_name: input.last_name.trim().to_string(),
        first_name: input.first_name.trim().to_string(),
        middle_name: input.middle_name.trim().to_string(),
        iin: String::new(),
        birth_date: Some(birth_date),
        document_type: input.document_type,
        document_number: input.document_number,
        residency,
        verification,
        kdp_status: KdpStatus::NotRequired,
        consent_file: None,
        calculation_only: false,
        premium: 0,
    }
}

/// Residents without an IIN are accepted only under 1 or over 64 years old.
pub fn resident_without_iin(
    input: ManualPerson,
    today: NaiveDate,
) -> Result<InsuredPerson, DraftError> {
    let birth_date = checked_identity(&input, today)?;
    let age = full_years(birth_date, today);
    if AgeBand::from_age(age) == AgeBand::Standard {
        return Err(DraftError::AgeBandNotEligible { age });
    }
    Ok(manual_person(
        input,
        birth_date,
        Residency::Resident,
        VerificationMode::ResidentNoIin,
    ))
}

/// Non-residents carry the paper consent uploaded for them.
pub fn nonresident(
    input: ManualPerson,
    consent_file: Option<ConsentFile>,
    today: NaiveDate,
) -> Result<InsuredPerson, DraftError> {
    let birth_date = checked_identity(&input, today)?;
    let consent_file = consent_file.ok_or(DraftError::ConsentFileMissing)?;
    let mut person = manual_person(
        input,
        birth_date,
        Residency::Nonresident,
        VerificationMode::NonresidentMin,
    );
    person.consent_file = Some(consent_file);
    Ok(person)
}

pub fn validate_consent_file(file: &ConsentFile, max_bytes: u64) -> Result<(), DraftError> {
    if file.file_name.trim().is_empty() {
        return Err(DraftError::ConsentFileUnnamed);
    }
    if file.size_bytes > max_bytes {
        return Err(DraftError::ConsentFileTooLarge {
            size: file.size_bytes,
            max: max_bytes,
        });
    }
    Ok(())
}

pub fn validate_iin(iin: &str) -> Result<(), DraftError> {
    if is_well_formed_iin(iin) {
        Ok(())
    } else {
        Err(DraftError::InvalidIin(iin.to_string()))
    }
}

pub fn registry_person(iin: &str, lookup: &RegistryLookup, kdp_status: KdpStatus) -> InsuredPerson {
    let found = &lookup.person;
    InsuredPerson {
        last_name: found.last_name.clone(),
        first_name: found.first_name.clone(),
        middle_name: found.middle_name.clone(),
        iin: iin.to_string(),
        birth_date: Some(found.birth_date),
        document_type: found.doc_type.clone(),
        document_number: found.doc_number.clone(),
        residency: Residency::Resident,
        verification: VerificationMode::IinKdp,
        kdp_status,
        consent_file: None,
        calculation_only: false,
        premium: 0,
    }
}

/// Anonymous persons for a quick price estimate. The whole batch must fit.
pub fn calculator_persons(
    band: CalculatorBand,
    count: usize,
    current: usize,
    max_persons: usize,
    today: NaiveDate,
    rng: &mut dyn RandomSource,
) -> Result<Vec<InsuredPerson>, DraftError> {
    if count == 0 {
        return Err(DraftError::InvalidCount);
    }
    if current + count > max_persons {
        return Err(DraftError::PersonLimit { max: max_persons });
    }

    Ok((1..=count)
        .map(|position| InsuredPerson {
            last_name: "Calculation".to_string(),
            first_name: format!("{} {}", band.display_name(), current + position),
            middle_name: String::new(),
            iin: String::new(),
            birth_date: Some(band.synthesize_birth_date(today, rng)),
            document_type: String::new(),
            document_number: String::new(),
            residency: Residency::Resident,
            verification: VerificationMode::Calculator,
            kdp_status: KdpStatus::NotRequired,
            consent_file: None,
            calculation_only: true,
            premium: 0,
        })
        .collect())
}

/// Activation readiness; `bypass` is the corporate consent exemption of the draft.
pub fn is_person_ready(person: &InsuredPerson, bypass: bool, today: NaiveDate) -> bool {
    match person.verification {
        VerificationMode::IinKdp => {
            is_well_formed_iin(&person.iin)
                && (person.kdp_status == KdpStatus::Confirmed || bypass)
        }
        VerificationMode::ResidentNoIin => {
            person.has_name()
                && person.birth_date.is_some_and(|birth_date| {
                    AgeBand::from_age(full_years(birth_date, today)) != AgeBand::Standard
                })
        }
        VerificationMode::NonresidentMin => {
            person.has_name() && person.birth_date.is_some() && person.consent_file.is_some()
        }
        VerificationMode::Calculator => person.birth_date.is_some(),
    }
}

/// Draft-level consent flag.
pub fn kdp_aggregate(persons: &[InsuredPerson], bypass: bool) -> bool {
    bypass
        || persons
            .iter()
            .filter(|person| person.verification == VerificationMode::IinKdp)
            .all(|person| person.kdp_status == KdpStatus::Confirmed)
}
