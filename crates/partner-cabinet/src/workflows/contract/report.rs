use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ContractRecord, ContractStatus};
use crate::access::{Redactable, EMAIL_MASK, PHONE_MASK};
use crate::reference::{CompanyId, ReferenceData};

/// Optional constraints; every absent field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product: Option<String>,
    pub status: Option<ContractStatus>,
    pub company: Option<CompanyId>,
}

impl ReportFilter {
    pub fn matches(&self, record: &ContractRecord) -> bool {
        let created = record.created_at.date_naive();
        self.from.map_or(true, |from| created >= from)
            && self.to.map_or(true, |to| created <= to)
            && self
                .product
                .as_ref()
                .map_or(true, |product| &record.product == product)
            && self.status.map_or(true, |status| record.status == status)
            && self
                .company
                .as_ref()
                .map_or(true, |company| &record.company_id == company)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_contracts: usize,
    pub total_premium: u64,
    pub average_premium: u64,
    pub rejected: usize,
    pub rejection_rate_percent: f64,
}

pub fn summarize<'a>(records: impl IntoIterator<Item = &'a ContractRecord>) -> ReportSummary {
    let mut summary = ReportSummary::default();
    for record in records {
        summary.total_contracts += 1;
        summary.total_premium += record.premium;
        if record.status == ContractStatus::Rejected {
            summary.rejected += 1;
        }
    }
    if summary.total_contracts > 0 {
        let count = summary.total_contracts as f64;
        summary.average_premium = (summary.total_premium as f64 / count).round() as u64;
        let rate = summary.rejected as f64 * 100.0 / count;
        summary.rejection_rate_percent = (rate * 10.0).round() / 10.0;
    }
    summary
}

/// One exported line, with the author's contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub contract_id: String,
    pub policy_number: Option<String>,
    pub created_on: NaiveDate,
    pub product: String,
    pub company: String,
    pub status: ContractStatus,
    pub persons: usize,
    pub premium: u64,
    pub author_email: String,
    pub author_phone: Option<String>,
}

impl ReportRow {
    pub fn from_record(record: &ContractRecord, reference: &ReferenceData) -> Self {
        let author = reference.user(&record.created_by);
        Self {
            contract_id: record.id.to_string(),
            policy_number: record.policy_number.clone(),
            created_on: record.created_at.date_naive(),
            product: reference
                .product(&record.product)
                .map_or_else(|| record.product.clone(), |product| product.name.clone()),
            company: reference
                .company(&record.company_id)
                .map_or_else(|| record.company_id.to_string(), |company| company.name.clone()),
            status: record.status,
            persons: record.persons.len(),
            premium: record.premium,
            author_email: author.map(|user| user.email.clone()).unwrap_or_default(),
            author_phone: author.and_then(|user| user.phone.clone()),
        }
    }
}

impl Redactable for ReportRow {
    fn redact_contacts(&mut self) {
        self.author_email = EMAIL_MASK.to_string();
        self.author_phone = Some(PHONE_MASK.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSummary {
    pub id: String,
    pub product: String,
    pub status: ContractStatus,
    pub status_name: &'static str,
    pub start_date: NaiveDate,
    pub premium: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub active: usize,
    pub pending: usize,
    pub draft: usize,
    pub active_premium: u64,
    pub recent: Vec<ContractSummary>,
}

/// `records` are expected newest first.
pub fn dashboard(records: &[ContractRecord]) -> DashboardStats {
    let mut stats = DashboardStats::default();
    for record in records {
        match record.status {
            ContractStatus::Active => {
                stats.active += 1;
                stats.active_premium += record.premium;
            }
            ContractStatus::Pending => stats.pending += 1,
            ContractStatus::Draft => stats.draft += 1,
            _ => {}
        }
    }
    stats.recent = records
        .iter()
        .take(5)
        .map(|record| ContractSummary {
            id: record.id.to_string(),
            product: record.product.clone(),
            status: record.status,
            status_name: record.status.display_name(),
            start_date: record.start_date,
            premium: record.premium,
        })
        .collect();
    stats
}
