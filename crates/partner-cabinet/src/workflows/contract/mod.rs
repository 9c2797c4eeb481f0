//! Contract drafting, pricing, consent-gated person intake, activation, and reporting.
//!
//! `editor` owns every rule of the in-progress form, `lifecycle` every status change of a
//! committed contract, and `service` wires both to the permission engine, the repository,
//! the audit trail, and the simulated external systems.

pub mod consent;
pub mod country_rules;
pub mod domain;
pub mod editor;
pub mod intake;
pub mod lifecycle;
pub mod pricing;
pub mod report;
pub mod repository;
pub mod router;
pub mod seed;
pub mod service;

#[cfg(test)]
mod tests;

pub use consent::{CancelReason, ConsentError, ConsentFlow};
pub use country_rules::{AmountCorrection, ResolvedCountryRules};
pub use domain::{
    BlankType, ConsentFile, ContractId, ContractRecord, ContractStatus, CorporateTerms,
    DraftContract, DraftError, InsuredAmount, InsuredPerson, KdpStatus, Residency, TravelTerms,
    VerificationMode,
};
pub use editor::{
    ActivationBlocker, DraftCommand, DraftEditor, DraftEnvironment, DraftEvent, DraftLimits,
    DraftView,
};
pub use intake::{CalculatorBand, ManualPerson};
pub use lifecycle::{ClosingAction, LifecycleError, StatusInfo};
pub use pricing::{PremiumBreakdown, PremiumCalculator, PricingConfig};
pub use report::{DashboardStats, ReportFilter, ReportRow, ReportSummary};
pub use repository::{ContractRepository, RepositoryError};
pub use router::contract_router;
pub use seed::seed_contracts;
pub use service::{
    ActivationResult, CatalogView, ContractWorkflowService, ContractWorkflowServiceBuilder,
    IinIntakeOutcome, LimitsUpdate, RegistryStep, ServiceError, SessionView,
};
