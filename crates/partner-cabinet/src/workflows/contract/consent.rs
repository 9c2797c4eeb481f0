use serde::{Deserialize, Serialize};

use super::domain::KdpStatus;
use crate::integrations::registry::RegistryLookup;
use crate::integrations::sms::ConsentReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Declined,
    DraftChanged,
}

/// Consent-then-lookup sequence for one IIN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConsentFlow {
    ConsentPending {
        iin: String,
    },
    ConsentConfirmed {
        iin: String,
        bypassed: bool,
    },
    LookupComplete {
        iin: String,
        bypassed: bool,
        lookup: RegistryLookup,
    },
    Cancelled {
        iin: String,
        reason: CancelReason,
    },
}

impl ConsentFlow {
    pub fn start(iin: impl Into<String>) -> Self {
        Self::ConsentPending { iin: iin.into() }
    }

    /// Corporate exemption: the SMS round trip is skipped.
    pub fn bypassed(iin: impl Into<String>) -> Self {
        Self::ConsentConfirmed {
            iin: iin.into(),
            bypassed: true,
        }
    }

    pub fn iin(&self) -> &str {
        match self {
            Self::ConsentPending { iin }
            | Self::ConsentConfirmed { iin, .. }
            | Self::LookupComplete { iin, .. }
            | Self::Cancelled { iin, .. } => iin,
        }
    }

    pub const fn state_label(&self) -> &'static str {
        match self {
            Self::ConsentPending { .. } => "consent_pending",
            Self::ConsentConfirmed { .. } => "consent_confirmed",
            Self::LookupComplete { .. } => "lookup_complete",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn receive_reply(self, reply: ConsentReply) -> Result<Self, ConsentError> {
        match self {
            Self::ConsentPending { iin } => Ok(match reply {
                ConsentReply::Confirmed => Self::ConsentConfirmed {
                    iin,
                    bypassed: false,
                },
                ConsentReply::Declined => Self::Cancelled {
                    iin,
                    reason: CancelReason::Declined,
                },
            }),
            other => Err(ConsentError::InvalidTransition {
                from: other.state_label(),
                event: "consent_reply",
            }),
        }
    }

    pub fn complete_lookup(self, lookup: RegistryLookup) -> Result<Self, ConsentError> {
        match self {
            Self::ConsentConfirmed { iin, bypassed } => Ok(Self::LookupComplete {
                iin,
                bypassed,
                lookup,
            }),
            other => Err(ConsentError::InvalidTransition {
                from: other.state_label(),
                event: "registry_lookup",
            }),
        }
    }

    pub fn cancel(self, reason: CancelReason) -> Self {
        match self {
            Self::Cancelled { .. } => self,
            other => Self::Cancelled {
                iin: other.iin().to_string(),
                reason,
            },
        }
    }

    /// Status the new person is recorded with once the lookup has completed.
    pub fn kdp_status(&self) -> Option<KdpStatus> {
        match self {
            Self::LookupComplete { bypassed: true, .. } => Some(KdpStatus::NotRequired),
            Self::LookupComplete { bypassed: false, .. } => Some(KdpStatus::Confirmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsentError {
    #[error("cannot apply {event} in state {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::integrations::registry::LookupSource;
    use crate::reference::RegistryPerson;

    fn lookup() -> RegistryLookup {
        RegistryLookup {
            person: RegistryPerson {
                last_name: "Сериков".to_string(),
                first_name: "Болат".to_string(),
                middle_name: "Маратович".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1978, 11, 3).expect("valid date"),
                gender: "M".to_string(),
                doc_type: "id_card".to_string(),
                doc_number: "034567890".to_string(),
            },
            source: LookupSource::Seeded,
        }
    }

    #[test]
    fn confirmed_consent_allows_the_lookup() {
        let flow = ConsentFlow::start("781103500345")
            .receive_reply(ConsentReply::Confirmed)
            .and_then(|flow| flow.complete_lookup(lookup()))
            .expect("flow completes");
        assert_eq!(flow.state_label(), "lookup_complete");
        assert_eq!(flow.kdp_status(), Some(KdpStatus::Confirmed));
    }

    #[test]
    fn declined_consent_is_a_cancelled_state() {
        let flow = ConsentFlow::start("781103500345")
            .receive_reply(ConsentReply::Declined)
            .expect("reply accepted");
        assert!(matches!(
            flow,
            ConsentFlow::Cancelled {
                reason: CancelReason::Declined,
                ..
            }
        ));
        assert!(flow.complete_lookup(lookup()).is_err());
    }

    #[test]
    fn lookup_before_consent_is_rejected() {
        let err = ConsentFlow::start("781103500345")
            .complete_lookup(lookup())
            .expect_err("consent missing");
        assert_eq!(
            err,
            ConsentError::InvalidTransition {
                from: "consent_pending",
                event: "registry_lookup"
            }
        );
    }

    #[test]
    fn bypassed_flow_records_consent_as_not_required() {
        let flow = ConsentFlow::bypassed("781103500345")
            .complete_lookup(lookup())
            .expect("bypass skips the reply");
        assert_eq!(flow.kdp_status(), Some(KdpStatus::NotRequired));
    }
}
