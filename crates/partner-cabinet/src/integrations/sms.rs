//! Simulated SMS round trip used to collect personal-data consent (KDP).

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentReply {
    Confirmed,
    Declined,
}

pub struct SmsConsentGateway {
    latency: Duration,
    decline_probability: f64,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl SmsConsentGateway {
    pub fn new(latency: Duration, decline_probability: f64, rng: Box<dyn RandomSource>) -> Self {
        Self {
            latency,
            decline_probability,
            rng: Mutex::new(rng),
        }
    }

    /// Sends the consent SMS for `iin` and waits for the simulated reply.
    pub async fn request_consent(&self, iin: &str) -> ConsentReply {
        debug!(iin_len = iin.len(), "consent sms sent");
        tokio::time::sleep(self.latency).await;

        let declined = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .chance(self.decline_probability);
        let reply = if declined {
            ConsentReply::Declined
        } else {
            ConsentReply::Confirmed
        };
        info!(?reply, "consent sms answered");
        reply
    }
}
