//! Simulated CRM activation protocol.
//!
//! `activate` never fails: business rejections and timeouts are returned as
//! [`ActivationOutcome::Rejected`] values and every call leaves a journal entry.

mod log;
mod settings;

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::random::RandomSource;
use crate::reference::{ReasonCode, ReferenceData};

pub use log::{
    seed_entries, IntegrationLog, IntegrationLogEntry, LogStatus, RequestSnapshot,
    ResponseSnapshot,
};
pub use settings::{CrmSettings, ResponseMode, SettingsError};

/// Payload sent to the CRM for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub contract_id: String,
    pub external_id: String,
    pub product: String,
    pub policy_code: String,
    pub company_prefix: Option<String>,
    pub person_count: usize,
    pub territories: Vec<String>,
    pub kdp_confirmed: bool,
    pub year: i32,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReceipt {
    pub crm_id: String,
    pub policy_number: String,
    pub pdf_link: String,
}

/// Rejection with the requested machine code and the catalog wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub title: String,
    pub description: String,
}

impl Rejection {
    pub fn is_timeout(&self) -> bool {
        self.code == ReasonCode::IntegrationTimeout.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActivationOutcome {
    Activated(ActivationReceipt),
    Rejected(Rejection),
}

pub struct CrmSimulator {
    reference: Arc<ReferenceData>,
    clock: Arc<dyn Clock>,
    settings: RwLock<CrmSettings>,
    log: Mutex<IntegrationLog>,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl CrmSimulator {
    pub fn new(
        reference: Arc<ReferenceData>,
        clock: Arc<dyn Clock>,
        settings: CrmSettings,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            reference,
            clock,
            settings: RwLock::new(settings),
            log: Mutex::new(IntegrationLog::default()),
            rng: Mutex::new(rng),
        }
    }

    pub fn with_log(self, entries: Vec<IntegrationLogEntry>) -> Self {
        *self.lock_log() = IntegrationLog::with_entries(entries);
        self
    }

    pub fn settings(&self) -> CrmSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_settings(&self, settings: CrmSettings) -> Result<CrmSettings, SettingsError> {
        settings.validate()?;
        let mut guard = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = settings.clone();
        info!(mode = settings.mode.label(), "crm simulator settings updated");
        Ok(settings)
    }

    pub fn log_entries(&self) -> Vec<IntegrationLogEntry> {
        self.lock_log().entries().to_vec()
    }

    pub fn clear_log(&self) {
        self.lock_log().clear();
    }

    pub async fn activate(&self, request: ActivationRequest) -> ActivationOutcome {
        let settings = self.settings();
        let snapshot = RequestSnapshot {
            external_id: request.external_id.clone(),
            product: request.product.clone(),
            person_count: request.person_count,
            territories: request.territories.clone(),
        };
        let entry_id = self
            .lock_log()
            .open(&request.contract_id, snapshot, self.clock.now());
        info!(
            contract_id = %request.contract_id,
            persons = request.person_count,
            mode = settings.mode.label(),
            "crm activation requested"
        );

        let started = Instant::now();
        let latency = settings.latency();
        let deadline_passed = match settings.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, tokio::time::sleep(latency))
                .await
                .is_err(),
            None => {
                tokio::time::sleep(latency).await;
                false
            }
        };

        let timed_out = self.draw(|rng| rng.chance(settings.timeout_probability)) || deadline_passed;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if timed_out {
            warn!(contract_id = %request.contract_id, elapsed_ms, "crm activation timed out");
            self.lock_log().close(
                &entry_id,
                LogStatus::Timeout,
                ResponseSnapshot::timed_out(),
                elapsed_ms,
            );
            return ActivationOutcome::Rejected(
                self.rejection(ReasonCode::IntegrationTimeout.as_str()),
            );
        }

        match self.decide(&settings, &request) {
            None => {
                let receipt = self.receipt(&request);
                self.lock_log().close(
                    &entry_id,
                    LogStatus::Ok,
                    ResponseSnapshot::active(&receipt.crm_id, &receipt.policy_number),
                    elapsed_ms,
                );
                info!(
                    contract_id = %request.contract_id,
                    policy_number = %receipt.policy_number,
                    "crm activation succeeded"
                );
                ActivationOutcome::Activated(receipt)
            }
            Some(code) => {
                let rejection = self.rejection(&code);
                self.lock_log().close(
                    &entry_id,
                    LogStatus::Fail,
                    ResponseSnapshot::rejected(&rejection.code, &rejection.title),
                    elapsed_ms,
                );
                warn!(
                    contract_id = %request.contract_id,
                    reason = %rejection.code,
                    "crm activation rejected"
                );
                ActivationOutcome::Rejected(rejection)
            }
        }
    }

    /// Failure reason code, or `None` when the CRM accepts the contract.
    fn decide(&self, settings: &CrmSettings, request: &ActivationRequest) -> Option<String> {
        match settings.mode {
            ResponseMode::ForcedSuccess => None,
            ResponseMode::ForcedFailure => Some(settings.fail_reason.clone()),
            ResponseMode::Automatic => {
                if settings.aml_enabled
                    && self.draw(|rng| rng.chance(settings.aml_hit_probability))
                {
                    Some(ReasonCode::AmlHit.as_str().to_string())
                } else if !request.kdp_confirmed {
                    Some(ReasonCode::KdpMissing.as_str().to_string())
                } else if self.draw(|rng| rng.chance(settings.validation_error_probability)) {
                    Some(ReasonCode::CrmValidationError.as_str().to_string())
                } else {
                    None
                }
            }
        }
    }

    fn receipt(&self, request: &ActivationRequest) -> ActivationReceipt {
        let crm_id = format!("CRM-{}", 100_000 + self.draw(|rng| rng.between(0, 899_999)));
        let prefix = request.company_prefix.as_deref().unwrap_or("POL");
        let policy_number = format!(
            "{prefix}-{}-{}-{:05}",
            request.policy_code, request.year, request.sequence
        );
        ActivationReceipt {
            crm_id,
            policy_number,
            pdf_link: format!("/documents/{}.pdf", request.contract_id),
        }
    }

    fn rejection(&self, code: &str) -> Rejection {
        let info = self.reference.reason(code);
        Rejection {
            code: code.to_string(),
            title: info.title,
            description: info.description,
        }
    }

    fn draw<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> T {
        let mut guard = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(guard.as_mut())
    }

    fn lock_log(&self) -> MutexGuard<'_, IntegrationLog> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
