//! Portal Router
//!
//! Client and admin surfaces sit behind the access-token middleware from
//! the auth crate; the payment webhook stays open and relies on its
//! signature check instead.

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use sqlx::PgPool;
use std::sync::Arc;

use auth::AuthConfig;
use auth::middleware::{AuthMiddlewareState, require_admin, require_auth};
use platform::mail::Mailer;

use crate::application::config::PortalConfig;
use crate::domain::repository::{
    DocumentRepository, InvoiceRepository, MessageRepository, UserDirectory,
};
use crate::infra::postgres::PgPortalRepository;
use crate::presentation::handlers::{self, PortalAppState};

/// Create the portal router (`/api/portal`) with a PostgreSQL repository
pub fn portal_router<M>(
    pool: PgPool,
    mailer: M,
    config: PortalConfig,
    auth_config: AuthConfig,
) -> Router
where
    M: Mailer + Send + Sync + 'static,
{
    let state = PortalAppState {
        repo: Arc::new(PgPortalRepository::new(pool)),
        mailer: Arc::new(mailer),
        config: Arc::new(config),
    };

    portal_router_generic(state, Arc::new(auth_config))
}

/// Create the portal admin router (`/api/portal/admin`) with a PostgreSQL
/// repository
pub fn portal_admin_router<M>(
    pool: PgPool,
    mailer: M,
    config: PortalConfig,
    auth_config: AuthConfig,
) -> Router
where
    M: Mailer + Send + Sync + 'static,
{
    let state = PortalAppState {
        repo: Arc::new(PgPortalRepository::new(pool)),
        mailer: Arc::new(mailer),
        config: Arc::new(config),
    };

    portal_admin_router_generic(state, Arc::new(auth_config))
}

/// Create the payment webhook router (`/api/portal/webhooks`) with a
/// PostgreSQL repository
pub fn payment_webhook_router<M>(pool: PgPool, mailer: M, config: PortalConfig) -> Router
where
    M: Mailer + Send + Sync + 'static,
{
    let state = PortalAppState {
        repo: Arc::new(PgPortalRepository::new(pool)),
        mailer: Arc::new(mailer),
        config: Arc::new(config),
    };

    payment_webhook_router_generic(state)
}

/// Create a generic portal router for any repository implementation
pub fn portal_router_generic<P, M>(
    state: PortalAppState<P, M>,
    auth_config: Arc<AuthConfig>,
) -> Router
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let auth_state = AuthMiddlewareState {
        config: auth_config,
    };

    Router::new()
        .route(
            "/documents",
            post(handlers::record_document::<P, M>).get(handlers::list_documents::<P, M>),
        )
        .route(
            "/documents/{id}",
            get(handlers::get_document::<P, M>).delete(handlers::delete_document::<P, M>),
        )
        .route(
            "/messages",
            post(handlers::send_message::<P, M>).get(handlers::list_messages::<P, M>),
        )
        .route("/messages/{id}", get(handlers::get_message::<P, M>))
        .route(
            "/messages/{id}/read",
            post(handlers::mark_message_read::<P, M>),
        )
        .route("/invoices", get(handlers::list_invoices::<P, M>))
        .route("/invoices/{id}", get(handlers::get_invoice::<P, M>))
        .layer(from_fn(move |req, next| {
            require_auth(auth_state.clone(), req, next)
        }))
        .with_state(state)
}

/// Create a generic portal admin router for any repository implementation
///
/// Admin checks run outside the handlers: `require_auth` first, then
/// `require_admin` over the caller it stored.
pub fn portal_admin_router_generic<P, M>(
    state: PortalAppState<P, M>,
    auth_config: Arc<AuthConfig>,
) -> Router
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let auth_state = AuthMiddlewareState {
        config: auth_config,
    };

    Router::new()
        .route(
            "/invoices",
            post(handlers::create_invoice::<P, M>).get(handlers::admin_list_invoices::<P, M>),
        )
        .route("/invoices/{id}/send", post(handlers::send_invoice::<P, M>))
        .route("/invoices/{id}/void", post(handlers::void_invoice::<P, M>))
        .layer(from_fn(require_admin))
        .layer(from_fn(move |req, next| {
            require_auth(auth_state.clone(), req, next)
        }))
        .with_state(state)
}

/// Create a generic payment webhook router for any repository
/// implementation
pub fn payment_webhook_router_generic<P, M>(state: PortalAppState<P, M>) -> Router
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    Router::new()
        .route("/payment", post(handlers::payment_webhook::<P, M>))
        .with_state(state)
}
