use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the simulated CRM decides an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseMode {
    #[serde(rename = "auto")]
    Automatic,
    #[serde(rename = "ok")]
    ForcedSuccess,
    #[serde(rename = "fail")]
    ForcedFailure,
}

impl ResponseMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Some(Self::Automatic),
            "ok" | "success" => Some(Self::ForcedSuccess),
            "fail" | "failure" => Some(Self::ForcedFailure),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Automatic => "auto",
            Self::ForcedSuccess => "ok",
            Self::ForcedFailure => "fail",
        }
    }
}

/// Tunable simulation parameters. Probabilities are in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmSettings {
    pub mode: ResponseMode,
    pub fail_reason: String,
    pub latency_ms: u64,
    pub timeout_probability: f64,
    pub aml_enabled: bool,
    pub aml_hit_probability: f64,
    pub validation_error_probability: f64,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            mode: ResponseMode::Automatic,
            fail_reason: "AML_HIT".to_string(),
            latency_ms: 500,
            timeout_probability: 0.05,
            aml_enabled: true,
            aml_hit_probability: 0.10,
            validation_error_probability: 0.05,
            deadline_ms: None,
        }
    }
}

impl CrmSettings {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("timeout_probability", self.timeout_probability),
            ("aml_hit_probability", self.aml_hit_probability),
            ("validation_error_probability", self.validation_error_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::InvalidProbability { field, value });
            }
        }
        if self.fail_reason.trim().is_empty() {
            return Err(SettingsError::MissingFailReason);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be between 0 and 1, got {value}")]
    InvalidProbability { field: &'static str, value: f64 },
    #[error("fail_reason must not be empty")]
    MissingFailReason,
}
