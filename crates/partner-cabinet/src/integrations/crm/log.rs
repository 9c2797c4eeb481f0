use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Pending,
    Ok,
    Fail,
    Timeout,
}

/// Snapshot of what was sent to the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub external_id: String,
    pub product: String,
    pub person_count: usize,
    pub territories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
}

impl ResponseSnapshot {
    pub fn active(crm_id: &str, policy_number: &str) -> Self {
        Self {
            status: "Active".to_string(),
            crm_id: Some(crm_id.to_string()),
            policy_number: Some(policy_number.to_string()),
            reason_code: None,
            reason_text: None,
        }
    }

    pub fn rejected(reason_code: &str, reason_text: &str) -> Self {
        Self {
            status: "Rejected".to_string(),
            crm_id: None,
            policy_number: None,
            reason_code: Some(reason_code.to_string()),
            reason_text: Some(reason_text.to_string()),
        }
    }

    pub fn timed_out() -> Self {
        Self {
            status: "Timeout".to_string(),
            crm_id: None,
            policy_number: None,
            reason_code: None,
            reason_text: Some("Integration timeout".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub contract_id: String,
    pub action: String,
    pub request: RequestSnapshot,
    pub status: LogStatus,
    pub response: Option<ResponseSnapshot>,
    pub latency_ms: Option<u64>,
}

/// CRM request/response journal, newest entry first.
#[derive(Debug, Clone, Default)]
pub struct IntegrationLog {
    entries: Vec<IntegrationLogEntry>,
    sequence: u64,
}

impl IntegrationLog {
    pub fn with_entries(entries: Vec<IntegrationLogEntry>) -> Self {
        let sequence = entries.len() as u64;
        Self { entries, sequence }
    }

    /// Records a `PENDING` entry and returns its id.
    pub fn open(
        &mut self,
        contract_id: &str,
        request: RequestSnapshot,
        timestamp: DateTime<Utc>,
    ) -> String {
        self.sequence += 1;
        let id = format!("crm-{}", self.sequence);
        self.entries.insert(
            0,
            IntegrationLogEntry {
                id: id.clone(),
                timestamp,
                request_id: format!("req-{:03}", self.sequence),
                contract_id: contract_id.to_string(),
                action: "activate".to_string(),
                request,
                status: LogStatus::Pending,
                response: None,
                latency_ms: None,
            },
        );
        id
    }

    pub fn close(
        &mut self,
        id: &str,
        status: LogStatus,
        response: ResponseSnapshot,
        latency_ms: u64,
    ) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.status = status;
            entry.response = Some(response);
            entry.latency_ms = Some(latency_ms);
        }
    }

    pub fn entries(&self) -> &[IntegrationLogEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn at(day: NaiveDate, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    day.and_hms_opt(hour, minute, second)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now)
}

/// Journal shown on a fresh start, newest first.
pub fn seed_entries(today: NaiveDate) -> Vec<IntegrationLogEntry> {
    let request = |external_id: &str, persons: usize, territories: &[&str]| RequestSnapshot {
        external_id: external_id.to_string(),
        product: "travel".to_string(),
        person_count: persons,
        territories: territories.iter().map(|code| code.to_string()).collect(),
    };

    vec![
        IntegrationLogEntry {
            id: "crm-3".to_string(),
            timestamp: at(today, 8, 40, 15),
            request_id: "req-003".to_string(),
            contract_id: "cnt-10".to_string(),
            action: "activate".to_string(),
            request: request("ext-010", 1, &["TH", "VN"]),
            status: LogStatus::Pending,
            response: None,
            latency_ms: None,
        },
        IntegrationLogEntry {
            id: "crm-2".to_string(),
            timestamp: at(today - Duration::days(3), 14, 22, 10),
            request_id: "req-002".to_string(),
            contract_id: "cnt-7".to_string(),
            action: "activate".to_string(),
            request: request("ext-007", 1, &["US"]),
            status: LogStatus::Fail,
            response: Some(ResponseSnapshot::rejected("AML_HIT", "AML check failed")),
            latency_ms: Some(1250),
        },
        IntegrationLogEntry {
            id: "crm-1".to_string(),
            timestamp: at(today - Duration::days(30), 10, 15, 32),
            request_id: "req-001".to_string(),
            contract_id: "cnt-1".to_string(),
            action: "activate".to_string(),
            request: request("ext-001", 2, &["TR"]),
            status: LogStatus::Ok,
            response: Some(ResponseSnapshot::active("CRM-123456", "SRT-VZR-2024-00001")),
            latency_ms: Some(450),
        },
    ]
}
