//! Auth Router

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, patch, post},
};
use sqlx::PgPool;
use std::sync::Arc;

use platform::mail::Mailer;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::domain::repository::UserRepository;
use crate::infra::postgres::{PgAuthRepository, PgRateLimitStore};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{self, AuthMiddlewareState};

/// Create the auth router (`/api/auth`) with PostgreSQL-backed stores
pub fn auth_router<M>(pool: PgPool, mailer: M, config: AuthConfig) -> Router
where
    M: Mailer + Send + Sync + 'static,
{
    let state = AuthAppState {
        repo: Arc::new(PgAuthRepository::new(pool.clone())),
        limiter: Arc::new(PgRateLimitStore::new(pool)),
        mailer: Arc::new(mailer),
        config: Arc::new(config),
    };

    auth_router_generic(state)
}

/// Create the admin router (`/api/admin`) with PostgreSQL-backed stores
pub fn admin_router<M>(pool: PgPool, mailer: M, config: AuthConfig) -> Router
where
    M: Mailer + Send + Sync + 'static,
{
    let state = AuthAppState {
        repo: Arc::new(PgAuthRepository::new(pool.clone())),
        limiter: Arc::new(PgRateLimitStore::new(pool)),
        mailer: Arc::new(mailer),
        config: Arc::new(config),
    };

    admin_router_generic(state)
}

/// Create a generic auth router for any store implementations
pub fn auth_router_generic<R, L, M>(state: AuthAppState<R, L, M>) -> Router
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let auth_state = AuthMiddlewareState {
        config: state.config.clone(),
    };

    let protected = Router::new()
        .route("/me", get(handlers::me::<R, L, M>))
        .route("/2fa/setup", post(handlers::totp_setup::<R, L, M>))
        .route("/2fa/confirm", post(handlers::totp_confirm::<R, L, M>))
        .route("/2fa/disable", post(handlers::totp_disable::<R, L, M>))
        .route(
            "/2fa/backup-codes",
            post(handlers::regenerate_backup_codes::<R, L, M>),
        )
        .layer(from_fn(move |req, next| {
            middleware::require_auth(auth_state.clone(), req, next)
        }));

    Router::new()
        .route("/register", post(handlers::register::<R, L, M>))
        .route("/login", post(handlers::login::<R, L, M>))
        .route("/2fa/verify", post(handlers::two_factor_verify::<R, L, M>))
        .route("/refresh", post(handlers::refresh::<R, L, M>))
        .route("/logout", post(handlers::logout::<R, L, M>))
        .route("/forgot-password", post(handlers::forgot_password::<R, L, M>))
        .route("/reset-password", post(handlers::reset_password::<R, L, M>))
        .route("/verify-email", post(handlers::verify_email::<R, L, M>))
        .route(
            "/resend-verification",
            post(handlers::resend_verification::<R, L, M>),
        )
        .merge(protected)
        .with_state(state)
}

/// Create a generic admin router for any store implementations
///
/// Admin checks run outside the handlers: `require_auth` first, then
/// `require_admin` over the caller it stored.
pub fn admin_router_generic<R, L, M>(state: AuthAppState<R, L, M>) -> Router
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let auth_state = AuthMiddlewareState {
        config: state.config.clone(),
    };

    Router::new()
        .route(
            "/users",
            get(handlers::list_users::<R, L, M>).post(handlers::provision_user::<R, L, M>),
        )
        .route("/users/{id}/role", patch(handlers::change_role::<R, L, M>))
        .route(
            "/users/{id}/deactivate",
            post(handlers::deactivate_user::<R, L, M>),
        )
        .route(
            "/users/{id}/reactivate",
            post(handlers::reactivate_user::<R, L, M>),
        )
        .layer(from_fn(middleware::require_admin))
        .layer(from_fn(move |req, next| {
            middleware::require_auth(auth_state.clone(), req, next)
        }))
        .with_state(state)
}
