//! Portal Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Business logic, entities, repository traits
//! - `application/` - Use cases
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP handlers, DTOs, routers
//!
//! ## Features
//! - Document records: upload metadata scoped to its owner, readable by
//!   admins
//! - Secure messaging between portal users, visible only to the two
//!   participants
//! - Invoicing with a draft/sent/paid/void lifecycle and email
//!   notification on send
//! - Payment webhook with HMAC-SHA256 signature verification and
//!   idempotent paid handling
//!
//! ## Security Model
//! - Every client and admin route sits behind the auth crate's
//!   access-token middleware; admin routes add a role check
//! - Resources outside the caller's scope answer 404, identical to a
//!   missing row, so ids cannot be probed
//! - The webhook is unauthenticated but verifies a constant-time HMAC
//!   signature over the raw body before parsing it
//! - Invoice status changes are conditional single-row updates; a racing
//!   webhook and admin action cannot double-apply

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::PortalConfig;
pub use error::{PortalError, PortalResult};
pub use infra::postgres::PgPortalRepository;
pub use presentation::router::{payment_webhook_router, portal_admin_router, portal_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
