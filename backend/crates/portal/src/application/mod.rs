//! Application Layer - Use cases
//!
//! Orchestrates portal domain logic: document records, messaging,
//! invoicing and payment-webhook processing.

pub mod config;
pub mod documents;
pub mod invoices;
pub mod messages;
