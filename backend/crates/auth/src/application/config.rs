//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::cookie::CookieConfig;
use platform::password::HashingCost;
use platform::rate_limit::RateLimitConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

use crate::domain::token::TokenIssuer;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Access token signing secret (32 bytes)
    pub access_token_secret: [u8; 32],
    /// Refresh token signing secret (32 bytes), distinct from access
    pub refresh_token_secret: [u8; 32],
    /// Access token lifetime (15 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (1 week)
    pub refresh_token_ttl: Duration,
    /// Refresh cookie name
    pub refresh_cookie_name: String,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Argon2id cost parameters
    pub hashing_cost: HashingCost,
    /// Password reset token lifetime (1 hour)
    pub reset_token_ttl: Duration,
    /// Email verification token lifetime (24 hours)
    pub verification_token_ttl: Duration,
    /// Issuer label shown in authenticator apps
    pub totp_issuer: String,
    /// Base URL for links in outgoing email
    pub frontend_base_url: String,
    /// Login attempts per client IP
    pub login_limit: RateLimitConfig,
    /// 2FA verification attempts per client IP
    pub two_factor_limit: RateLimitConfig,
    /// Password reset requests per client IP
    pub reset_request_limit: RateLimitConfig,
    /// Verification resend requests per client IP
    pub resend_limit: RateLimitConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: [0u8; 32],
            refresh_token_secret: [0u8; 32],
            access_token_ttl: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600), // 1 week
            refresh_cookie_name: "refreshToken".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
            hashing_cost: HashingCost::default(),
            reset_token_ttl: Duration::from_secs(3600), // 1 hour
            verification_token_ttl: Duration::from_secs(24 * 3600), // 24 hours
            totp_issuer: "Hartwell Estate Planning".to_string(),
            frontend_base_url: "http://localhost:5173".to_string(),
            login_limit: RateLimitConfig::new(5, 60),
            two_factor_limit: RateLimitConfig::new(5, 60),
            reset_request_limit: RateLimitConfig::new(3, 3600),
            resend_limit: RateLimitConfig::new(3, 3600),
        }
    }
}

impl AuthConfig {
    /// Create config with random signing secrets (for development)
    pub fn with_random_secrets() -> Self {
        use rand::RngCore;
        let mut access = [0u8; 32];
        let mut refresh = [0u8; 32];
        rand::rng().fill_bytes(&mut access);
        rand::rng().fill_bytes(&mut refresh);
        Self {
            access_token_secret: access,
            refresh_token_secret: refresh,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secrets()
        }
    }

    /// Build a token issuer over these secrets and lifetimes
    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(
            &self.access_token_secret,
            &self.refresh_token_secret,
            self.access_token_ttl.as_secs() as i64,
            self.refresh_token_ttl.as_secs() as i64,
        )
    }

    /// Cookie settings for the refresh token
    pub fn refresh_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.refresh_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age_secs: Some(self.refresh_token_ttl.as_secs() as i64),
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}
