//! API Server Entry Point
//!
//! Application entry point and server initialization. Uses `anyhow`
//! for startup errors; request-level errors are rendered by the
//! domain crates.

use auth::{AuthConfig, PgRateLimitStore, admin_router, auth_router};
use axum::{
    Router, http,
    http::{Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use platform::mail::{AnyMailer, HttpMailer, LogMailer};
use portal::{PortalConfig, payment_webhook_router, portal_admin_router, portal_router};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between background rate limit sweeps
const RATE_LIMIT_SWEEP_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,portal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Startup cleanup: drop rate limit rows from windows that are over.
    // Errors here should not prevent server startup
    let limiter_for_cleanup = PgRateLimitStore::new(pool.clone());
    match limiter_for_cleanup.cleanup_expired().await {
        Ok(deleted) => {
            tracing::info!(windows_deleted = deleted, "Rate limit cleanup completed");
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Rate limit cleanup failed, continuing anyway"
            );
        }
    }

    // Periodic sweep. Window arithmetic enforces the limits; the sweep
    // only keeps the table from growing.
    let limiter_for_sweep = PgRateLimitStore::new(pool.clone());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(RATE_LIMIT_SWEEP_SECS));
        // The first tick fires immediately and would repeat the startup pass
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match limiter_for_sweep.cleanup_expired().await {
                Ok(deleted) => {
                    tracing::debug!(windows_deleted = deleted, "Rate limit sweep completed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Rate limit sweep failed");
                }
            }
        }
    });

    // Links in outgoing email point at the frontend
    let frontend_base_url =
        env::var("FRONTEND_BASE_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

    // Auth configuration
    let auth_config = if cfg!(debug_assertions) {
        AuthConfig {
            frontend_base_url: frontend_base_url.clone(),
            ..AuthConfig::development()
        }
    } else {
        // In production, load signing secrets from environment
        AuthConfig {
            access_token_secret: secret_from_env("AUTH_ACCESS_TOKEN_SECRET")?,
            refresh_token_secret: secret_from_env("AUTH_REFRESH_TOKEN_SECRET")?,
            password_pepper: env::var("PASSWORD_PEPPER").ok().map(String::into_bytes),
            frontend_base_url: frontend_base_url.clone(),
            ..AuthConfig::default()
        }
    };

    // Portal configuration
    let portal_config = if cfg!(debug_assertions) {
        PortalConfig {
            frontend_base_url: frontend_base_url.clone(),
            ..PortalConfig::with_random_secret()
        }
    } else {
        // The provider hands out the signing secret as an opaque string
        let webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET")
            .expect("PAYMENT_WEBHOOK_SECRET must be set in production");
        PortalConfig {
            webhook_secret: webhook_secret.into_bytes(),
            frontend_base_url: frontend_base_url.clone(),
            ..PortalConfig::default()
        }
    };

    // Mail dispatch: HTTP provider when configured, log sink otherwise
    let mailer = match (
        env::var("MAIL_API_URL"),
        env::var("MAIL_API_TOKEN"),
        env::var("MAIL_FROM_ADDRESS"),
    ) {
        (Ok(api_url), Ok(api_token), Ok(from_address)) => {
            let from_name = env::var("MAIL_FROM_NAME")
                .unwrap_or_else(|_| "Hartwell Estate Planning".to_string());
            tracing::info!("Mail dispatch via HTTP provider");
            AnyMailer::Http(HttpMailer::new(api_url, api_token, from_address, from_name))
        }
        _ => {
            tracing::info!("Mail provider not configured, logging outgoing mail");
            AnyMailer::Log(LogMailer)
        }
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router. The admin and webhook routers are nested after
    // portal_router so its auth layer does not wrap them; each carries
    // its own middleware.
    let portal = portal_router(
        pool.clone(),
        mailer.clone(),
        portal_config.clone(),
        auth_config.clone(),
    )
    .nest(
        "/admin",
        portal_admin_router(
            pool.clone(),
            mailer.clone(),
            portal_config.clone(),
            auth_config.clone(),
        ),
    )
    .nest(
        "/webhooks",
        payment_webhook_router(pool.clone(), mailer.clone(), portal_config),
    );

    let app = Router::new()
        .nest(
            "/api/auth",
            auth_router(pool.clone(), mailer.clone(), auth_config.clone()),
        )
        .nest("/api/admin", admin_router(pool.clone(), mailer, auth_config))
        .nest("/api/portal", portal)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Decode a base64 32-byte secret from the environment
fn secret_from_env(name: &str) -> anyhow::Result<[u8; 32]> {
    let encoded = env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set in production"))?;
    let bytes = Engine::decode(&general_purpose::STANDARD, encoded.trim())?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("{name} must decode to exactly 32 bytes"))
}
