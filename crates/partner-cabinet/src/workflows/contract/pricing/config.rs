use serde::{Deserialize, Serialize};

/// Rate table of the premium calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub travel_base_rate: f64,
    pub basic_base_rate: f64,
    pub amount_unit: f64,
    pub reference_days: f64,
    pub usd_rate: f64,
    pub reference_usd_rate: f64,
    pub travel_currency_markup: f64,
    pub default_sport_factor: f64,
    pub infant_loading: f64,
    pub senior_loading: f64,
    pub nonresident_loading: f64,
    pub calculator_loading: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            travel_base_rate: 5000.0,
            basic_base_rate: 3000.0,
            amount_unit: 10_000.0,
            reference_days: 7.0,
            usd_rate: 475.50,
            reference_usd_rate: 475.0,
            travel_currency_markup: 1.03,
            default_sport_factor: 1.15,
            infant_loading: 1.45,
            senior_loading: 1.40,
            nonresident_loading: 1.08,
            calculator_loading: 1.05,
        }
    }
}

impl PricingConfig {
    pub fn with_usd_rate(mut self, usd_rate: f64) -> Self {
        self.usd_rate = usd_rate;
        self
    }
}
