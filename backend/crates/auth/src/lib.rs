//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Business logic, entities, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Login with email or username + password
//! - TOTP-based 2FA (Google Authenticator compatible) with backup codes
//! - Stateless sessions: short-lived access tokens, long-lived refresh
//!   tokens in an HTTP-only cookie, refresh rotation
//! - Email verification and password reset over single-use tokens
//! - Role-based access (Client, Admin) with admin user management
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Uniform failure responses on login and the reset/resend request
//!   phases (no account enumeration)
//! - Only token digests stored for reset/verification; raw tokens exist
//!   in the email link alone
//! - Per-IP fixed-window rate limits on login, 2FA and token-request
//!   routes

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::{PgAuthRepository, PgRateLimitStore};
pub use presentation::router::{admin_router, auth_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod store {
    pub use crate::infra::postgres::PgAuthRepository as AuthStore;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
