//! Simulated national person registry (ESBD), keyed by IIN.

use std::sync::Arc;

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::random::RandomSource;
use crate::reference::{ReferenceData, RegistryPerson};

const LAST_NAMES: [&str; 6] = ["Ахметов", "Жумабаев", "Ибраев", "Касымов", "Нурланов", "Сериков"];
const MALE_NAMES: [&str; 4] = ["Арман", "Ерлан", "Нурлан", "Даурен"];
const FEMALE_NAMES: [&str; 4] = ["Айгерим", "Дана", "Сауле", "Алия"];
const MALE_PATRONYMICS: [&str; 3] = ["Бекетович", "Маратович", "Серикович"];
const FEMALE_PATRONYMICS: [&str; 3] = ["Бекетовна", "Маратовна", "Сериковна"];

/// Twelve ASCII digits.
pub fn is_well_formed_iin(iin: &str) -> bool {
    iin.len() == 12 && iin.bytes().all(|byte| byte.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    Seeded,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLookup {
    pub person: RegistryPerson,
    pub source: LookupSource,
}

#[derive(Debug, Clone)]
pub struct PersonRegistry {
    reference: Arc<ReferenceData>,
}

impl PersonRegistry {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    /// Seeded entry when present, otherwise a plausible identity derived from the IIN.
    pub fn lookup(
        &self,
        iin: &str,
        today: NaiveDate,
        rng: &mut dyn RandomSource,
    ) -> RegistryLookup {
        if let Some(person) = self.reference.registry_person(iin) {
            return RegistryLookup {
                person: person.clone(),
                source: LookupSource::Seeded,
            };
        }

        let decoded = decode_iin(iin).filter(|(birth_date, _)| *birth_date <= today);
        let (birth_date, male) = match decoded {
            Some(decoded) => decoded,
            None => (random_adult_birth_date(today, rng), rng.chance(0.5)),
        };

        let mut last_name = pick(rng, &LAST_NAMES);
        let (first_name, middle_name) = if male {
            (pick(rng, &MALE_NAMES), pick(rng, &MALE_PATRONYMICS))
        } else {
            last_name.push('а');
            (pick(rng, &FEMALE_NAMES), pick(rng, &FEMALE_PATRONYMICS))
        };

        RegistryLookup {
            person: RegistryPerson {
                last_name,
                first_name,
                middle_name,
                birth_date,
                gender: if male { "M" } else { "F" }.to_string(),
                doc_type: "id_card".to_string(),
                doc_number: format!("{:09}", rng.between(0, 999_999_999)),
            },
            source: LookupSource::Synthesized,
        }
    }
}

fn pick(rng: &mut dyn RandomSource, pool: &[&str]) -> String {
    let index = rng.between(0, pool.len() as u64 - 1) as usize;
    pool.get(index).copied().unwrap_or_default().to_string()
}

/// Birth date and sex from `YYMMDD` plus the century digit (1-6).
fn decode_iin(iin: &str) -> Option<(NaiveDate, bool)> {
    if !is_well_formed_iin(iin) {
        return None;
    }
    let digits: Vec<u32> = iin.bytes().map(|byte| u32::from(byte - b'0')).collect();
    let century = match digits[6] {
        1 | 2 => 1800,
        3 | 4 => 1900,
        5 | 6 => 2000,
        _ => return None,
    };
    let year = century + (digits[0] * 10 + digits[1]) as i32;
    let month = digits[2] * 10 + digits[3];
    let day = digits[4] * 10 + digits[5];
    let birth_date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((birth_date, digits[6] % 2 == 1))
}

fn random_adult_birth_date(today: NaiveDate, rng: &mut dyn RandomSource) -> NaiveDate {
    let years = rng.between(18, 70) as u32;
    let extra_days = rng.between(0, 364) as i64;
    today
        .checked_sub_months(Months::new(years * 12))
        .map(|date| date - Duration::days(extra_days))
        .unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    #[test]
    fn iin_format_is_twelve_digits() {
        assert!(is_well_formed_iin("850315300123"));
        assert!(!is_well_formed_iin("85031530012"));
        assert!(!is_well_formed_iin("85031530012a"));
        assert!(!is_well_formed_iin("８５０３１５３００１２３"));
    }

    #[test]
    fn seeded_entries_are_returned_verbatim() {
        let registry = PersonRegistry::new(Arc::new(ReferenceData::standard()));
        let lookup = registry.lookup("850315300123", today(), &mut ScriptedRandom::new());
        assert_eq!(lookup.source, LookupSource::Seeded);
        assert_eq!(lookup.person.first_name, "Арман");
    }

    #[test]
    fn synthesized_identity_decodes_birth_date_and_sex() {
        let registry = PersonRegistry::new(Arc::new(ReferenceData::standard()));
        let lookup = registry.lookup("920101400555", today(), &mut ScriptedRandom::new());
        assert_eq!(lookup.source, LookupSource::Synthesized);
        assert_eq!(
            lookup.person.birth_date,
            NaiveDate::from_ymd_opt(1992, 1, 1).expect("valid date")
        );
        assert_eq!(lookup.person.gender, "F");
        assert_eq!(lookup.person.last_name, "Ахметова");
    }

    #[test]
    fn undecodable_iin_gets_adult_birth_date() {
        let registry = PersonRegistry::new(Arc::new(ReferenceData::standard()));
        let mut rng = ScriptedRandom::new().with_numbers([30, 0]).with_chances([true]);
        let lookup = registry.lookup("991399900000", today(), &mut rng);
        assert_eq!(
            lookup.person.birth_date,
            NaiveDate::from_ymd_opt(1996, 3, 2).expect("valid date")
        );
        assert_eq!(lookup.person.gender, "M");
    }
}
