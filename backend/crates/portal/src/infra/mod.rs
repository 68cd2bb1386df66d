//! Infrastructure Layer
//!
//! Database implementations for the portal repositories.

pub mod postgres;

pub use postgres::PgPortalRepository;
