//! Password Reset Use Case
//!
//! Two-phase flow: the request phase answers identically whether or not
//! the address has an account, and the confirmation phase consumes the
//! emailed token and replaces the hash in one update.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use platform::client::client_ip_label;
use platform::mail::{MailMessage, Mailer};
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::domain::entity::user::{User, UserPatch};
use crate::domain::repository::UserRepository;
use crate::domain::token::OpaqueToken;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Password reset use case
pub struct PasswordResetUseCase<R, L, M>
where
    R: UserRepository,
    L: RateLimitStore,
    M: Mailer,
{
    repo: Arc<R>,
    limiter: Arc<L>,
    mailer: Arc<M>,
    config: Arc<AuthConfig>,
}

impl<R, L, M> PasswordResetUseCase<R, L, M>
where
    R: UserRepository,
    L: RateLimitStore,
    M: Mailer + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, limiter: Arc<L>, mailer: Arc<M>, config: Arc<AuthConfig>) -> Self {
        Self {
            repo,
            limiter,
            mailer,
            config,
        }
    }

    /// Request phase
    ///
    /// Issues a 1-hour single-use token when the account exists and is
    /// active. Unknown, deactivated and malformed addresses all take the
    /// same success path.
    pub async fn request(&self, email: String, client_ip: Option<IpAddr>) -> AuthResult<()> {
        self.check_rate_limit(client_ip).await?;

        let Ok(email) = Email::new(email) else {
            return Ok(());
        };

        let Some(user) = self.repo.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        if !user.is_active {
            tracing::debug!(user_id = %user.user_id, "Password reset requested for deactivated account");
            return Ok(());
        }

        let token = OpaqueToken::generate();
        let expires_at =
            Utc::now() + Duration::seconds(self.config.reset_token_ttl.as_secs() as i64);

        let patch = UserPatch {
            password_reset_token: Some(Some(token.digest.clone())),
            password_reset_expires_at: Some(Some(expires_at)),
            ..Default::default()
        };
        self.repo.update(user.user_id, &patch).await?;

        self.send_reset_email(&user, token.raw);

        tracing::info!(user_id = %user.user_id, "Password reset token issued");

        Ok(())
    }

    /// Confirmation phase
    ///
    /// The expiry check is explicit against the current time; hash
    /// replacement and token clearing land in the same update so there is
    /// no window where the token is still live.
    pub async fn confirm(&self, token: &str, new_password: String) -> AuthResult<()> {
        let digest = OpaqueToken::digest_of(token.trim());

        let user = self
            .repo
            .find_by_reset_token(&digest)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        if user.reset_token_expired(Utc::now()) {
            return Err(AuthError::InvalidResetToken);
        }

        let raw_password = RawPassword::new(new_password)?;
        let password_hash =
            UserPassword::from_raw(&raw_password, self.config.pepper(), self.config.hashing_cost)?;

        let patch = UserPatch {
            password_hash: Some(password_hash),
            password_reset_token: Some(None),
            password_reset_expires_at: Some(None),
            ..Default::default()
        };
        self.repo
            .update(user.user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "Password reset completed");

        Ok(())
    }

    /// Request-phase throttle, applied before any store lookup
    async fn check_rate_limit(&self, client_ip: Option<IpAddr>) -> AuthResult<()> {
        let key = format!("reset:{}", client_ip_label(client_ip));

        match self
            .limiter
            .check_and_increment(&key, &self.config.reset_request_limit)
            .await
        {
            Ok(result) if !result.allowed => Err(AuthError::RateLimited),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit check failed, allowing request");
                Ok(())
            }
        }
    }

    /// Background dispatch; delivery failures are logged, never surfaced
    fn send_reset_email(&self, user: &User, token: String) {
        let link = format!(
            "{}/reset-password?token={}",
            self.config.frontend_base_url, token
        );
        let message = MailMessage {
            to: user.email.as_str().to_string(),
            to_name: user.user_name.original().to_string(),
            subject: "Reset your password".to_string(),
            text_body: format!(
                "A password reset was requested for your account.\n\n\
                 This link is valid for one hour:\n\n\
                 {}\n\n\
                 If you did not request a reset, you can ignore this message; \
                 your password has not changed.",
                link
            ),
        };

        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&message).await {
                tracing::warn!(error = %e, "Password reset email dispatch failed");
            }
        });
    }
}
