//! Simulated external systems: the CRM policy backend, the national person registry,
//! and the SMS consent gateway.

pub mod crm;
pub mod registry;
pub mod sms;
