//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Document, Message, Invoice)
//! - Domain value objects (InvoiceStatus, ClientContact)
//! - Domain services (invoice numbering, webhook signature verification)
//! - Repository traits (interfaces)

pub mod entities;
pub mod services;
pub mod repository;
pub mod value_objects;
