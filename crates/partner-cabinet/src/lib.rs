//! Partner cabinet core: permissions, contract drafting, premium calculation, and the
//! simulated CRM activation protocol used by travel agencies to issue insurance policies.

pub mod access;
pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod integrations;
pub mod random;
pub mod reference;
pub mod telemetry;
pub mod workflows;
