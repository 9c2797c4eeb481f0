use serde::{Deserialize, Serialize};

use super::domain::{InsuredAmount, TravelTerms};
use crate::reference::{Currency, ReferenceData};

/// Minimum insured amount applied even with no territory selected.
pub const BASELINE_MIN_AMOUNT: u32 = 10_000;

/// Combined rule for a territory selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCountryRules {
    pub min_amount: u32,
    pub currency: Currency,
    pub rate_factor: f64,
}

impl Default for ResolvedCountryRules {
    fn default() -> Self {
        Self {
            min_amount: BASELINE_MIN_AMOUNT,
            currency: Currency::Usd,
            rate_factor: 1.0,
        }
    }
}

impl ResolvedCountryRules {
    pub fn minimum(&self) -> InsuredAmount {
        InsuredAmount {
            value: self.min_amount,
            currency: self.currency,
        }
    }

    pub fn hint(&self) -> String {
        format!(
            "Minimum insured amount for the selected territories: {} {}",
            self.min_amount, self.currency
        )
    }
}

/// Highest minimum (with its currency) and highest rate factor across the selection.
pub fn resolve_country_rules(territories: &[String], reference: &ReferenceData) -> ResolvedCountryRules {
    territories
        .iter()
        .map(|code| reference.country_rule(code))
        .fold(ResolvedCountryRules::default(), |mut resolved, rule| {
            if rule.min_amount > resolved.min_amount {
                resolved.min_amount = rule.min_amount;
                resolved.currency = rule.currency;
            }
            resolved.rate_factor = resolved.rate_factor.max(rule.rate_factor);
            resolved
        })
}

/// Forced change of the insured amount after a territory or amount edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountCorrection {
    pub from: InsuredAmount,
    pub to: InsuredAmount,
}

impl AmountCorrection {
    pub fn notice(&self) -> String {
        format!(
            "Insured amount raised from {} to {} to satisfy the territory minimum",
            self.from, self.to
        )
    }
}

/// Raises an amount below the minimum, or at the minimum in the wrong currency.
/// Does nothing while no territory is selected.
pub fn apply_country_rules(
    travel: &mut TravelTerms,
    territories: &[String],
    reference: &ReferenceData,
) -> Option<AmountCorrection> {
    if territories.is_empty() {
        return None;
    }

    let resolved = resolve_country_rules(territories, reference);
    let amount = travel.amount;
    let too_low = amount.value < resolved.min_amount;
    let wrong_currency = amount.value == resolved.min_amount && amount.currency != resolved.currency;
    if !too_low && !wrong_currency {
        return None;
    }

    travel.amount = resolved.minimum();
    Some(AmountCorrection {
        from: amount,
        to: travel.amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|code| code.to_string()).collect()
    }

    #[test]
    fn empty_selection_resolves_to_the_baseline() {
        let reference = ReferenceData::standard();
        let resolved = resolve_country_rules(&[], &reference);
        assert_eq!(resolved.min_amount, 10_000);
        assert_eq!(resolved.currency, Currency::Usd);
        assert_eq!(resolved.rate_factor, 1.0);
    }

    #[test]
    fn adding_territories_never_lowers_the_rule() {
        let reference = ReferenceData::standard();
        let mut selection = Vec::new();
        let mut previous = resolve_country_rules(&selection, &reference);
        for code in ["TR", "GE", "SCHENGEN", "TH", "US", "AE"] {
            selection.push(code.to_string());
            let next = resolve_country_rules(&selection, &reference);
            assert!(next.min_amount >= previous.min_amount, "min dropped after {code}");
            assert!(next.rate_factor >= previous.rate_factor, "rate dropped after {code}");
            previous = next;
        }
        assert_eq!(previous.min_amount, 50_000);
        assert_eq!(previous.rate_factor, 1.5);
    }

    #[test]
    fn the_first_highest_minimum_keeps_its_currency() {
        let reference = ReferenceData::standard();
        let resolved = resolve_country_rules(&codes(&["SCHENGEN", "GE"]), &reference);
        assert_eq!(resolved.min_amount, 30_000);
        assert_eq!(resolved.currency, Currency::Eur);
        assert_eq!(resolved.rate_factor, 1.35);
    }

    #[test]
    fn amount_at_the_minimum_in_the_wrong_currency_is_corrected() {
        let reference = ReferenceData::standard();
        let mut travel = TravelTerms::default();
        let correction = apply_country_rules(&mut travel, &codes(&["SCHENGEN"]), &reference)
            .expect("currency mismatch should be corrected");
        assert_eq!(correction.from.currency, Currency::Usd);
        assert_eq!(travel.amount.value, 30_000);
        assert_eq!(travel.amount.currency, Currency::Eur);
    }

    #[test]
    fn amount_above_the_minimum_is_left_alone() {
        let reference = ReferenceData::standard();
        let mut travel = TravelTerms::default();
        assert!(apply_country_rules(&mut travel, &codes(&["TR"]), &reference).is_none());
        assert_eq!(travel.amount.value, 30_000);
        assert!(apply_country_rules(&mut travel, &[], &reference).is_none());
    }
}
