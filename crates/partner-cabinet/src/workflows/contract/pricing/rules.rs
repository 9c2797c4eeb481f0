use chrono::NaiveDate;

use super::super::country_rules::resolve_country_rules;
use super::super::domain::{DraftContract, InsuredPerson, Residency, VerificationMode};
use super::super::intake::{full_years, AgeBand};
use super::config::PricingConfig;
use crate::reference::{Product, ReferenceData, SPORT_PURPOSE};

/// Per-policy rate shared by every insured person, before individual loadings.
pub(crate) fn unit_rate(
    draft: &DraftContract,
    product: &Product,
    reference: &ReferenceData,
    config: &PricingConfig,
) -> f64 {
    let travel = product.is_travel();
    let base = if travel {
        config.travel_base_rate
    } else {
        config.basic_base_rate
    };
    let amount = f64::from(draft.travel.amount.value) / config.amount_unit;
    let days = draft.day_count().max(1) as f64 / config.reference_days;
    let rate_factor = resolve_country_rules(&draft.territories, reference).rate_factor;
    let markup = if travel {
        config.travel_currency_markup
    } else {
        1.0
    };
    let currency = config.usd_rate * markup / config.reference_usd_rate;

    base * amount
        * days
        * rate_factor
        * currency
        * sport_factor(draft, travel, reference, config)
        * discount_factor(draft, reference)
}

fn sport_factor(
    draft: &DraftContract,
    travel: bool,
    reference: &ReferenceData,
    config: &PricingConfig,
) -> f64 {
    if !travel || draft.travel.purpose != SPORT_PURPOSE {
        return 1.0;
    }
    draft
        .travel
        .sport
        .as_deref()
        .and_then(|id| reference.sport(id))
        .map_or(config.default_sport_factor, |sport| sport.factor)
}

fn discount_factor(draft: &DraftContract, reference: &ReferenceData) -> f64 {
    if !draft.corporate_discount_active(reference) {
        return 1.0;
    }
    let discount = draft.corporate.discount_percent.unwrap_or(0.0);
    1.0 - discount / 100.0
}

/// Individual loadings compound multiplicatively.
pub(crate) fn person_factor(person: &InsuredPerson, today: NaiveDate, config: &PricingConfig) -> f64 {
    let mut factor = 1.0;
    if let Some(birth_date) = person.birth_date {
        match AgeBand::from_age(full_years(birth_date, today)) {
            AgeBand::UnderOne => factor *= config.infant_loading,
            AgeBand::OverSixtyFour => factor *= config.senior_loading,
            AgeBand::Standard => {}
        }
    }
    if person.residency == Residency::Nonresident {
        factor *= config.nonresident_loading;
    }
    if person.verification == VerificationMode::Calculator {
        factor *= config.calculator_loading;
    }
    factor
}
