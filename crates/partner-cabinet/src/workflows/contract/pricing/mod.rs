mod config;
mod rules;

pub use config::PricingConfig;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::DraftContract;
use crate::reference::ReferenceData;

/// Stateless premium calculator over a draft snapshot.
#[derive(Debug, Clone, Default)]
pub struct PremiumCalculator {
    config: PricingConfig,
}

impl PremiumCalculator {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Each person's share is rounded on its own; the total is the sum of the rounded shares.
    pub fn calculate(
        &self,
        draft: &DraftContract,
        reference: &ReferenceData,
        today: NaiveDate,
    ) -> PremiumBreakdown {
        let Some(product) = draft.product.as_deref().and_then(|id| reference.product(id)) else {
            return PremiumBreakdown::empty(draft.persons.len());
        };

        let unit_rate = rules::unit_rate(draft, product, reference, &self.config);
        let per_person: Vec<u64> = draft
            .persons
            .iter()
            .map(|person| {
                let share = unit_rate * rules::person_factor(person, today, &self.config);
                share.max(0.0).round() as u64
            })
            .collect();

        PremiumBreakdown {
            total: per_person.iter().sum(),
            per_person,
            unit_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumBreakdown {
    pub total: u64,
    pub per_person: Vec<u64>,
    pub unit_rate: f64,
}

impl PremiumBreakdown {
    fn empty(persons: usize) -> Self {
        Self {
            total: 0,
            per_person: vec![0; persons],
            unit_rate: 0.0,
        }
    }
}
