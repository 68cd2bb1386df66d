//! Email Verification Use Case
//!
//! Confirms the 24-hour emailed token and opens a first session, and
//! rotates the token for unverified accounts on request.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use platform::client::client_ip_label;
use platform::mail::{MailMessage, Mailer};
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::session::{SessionBundle, issue_session};
use crate::domain::entity::user::{User, UserPatch};
use crate::domain::repository::UserRepository;
use crate::domain::token::{OpaqueToken, TokenIssuer};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Email verification use case
pub struct EmailVerificationUseCase<R, L, M>
where
    R: UserRepository,
    L: RateLimitStore,
    M: Mailer,
{
    repo: Arc<R>,
    limiter: Arc<L>,
    mailer: Arc<M>,
    config: Arc<AuthConfig>,
    tokens: TokenIssuer,
}

impl<R, L, M> EmailVerificationUseCase<R, L, M>
where
    R: UserRepository,
    L: RateLimitStore,
    M: Mailer + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, limiter: Arc<L>, mailer: Arc<M>, config: Arc<AuthConfig>) -> Self {
        let tokens = config.token_issuer();
        Self {
            repo,
            limiter,
            mailer,
            config,
            tokens,
        }
    }

    /// Confirm the emailed token
    ///
    /// Flips the flag, clears the token and records the login in one
    /// update; verification doubles as the first sign-in.
    pub async fn verify(&self, token: &str) -> AuthResult<SessionBundle> {
        let digest = OpaqueToken::digest_of(token.trim());

        let user = self
            .repo
            .find_by_verification_token(&digest)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        if user.verification_token_expired(Utc::now()) {
            return Err(AuthError::InvalidVerificationToken);
        }

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        let patch = UserPatch {
            email_verified: Some(true),
            email_verification_token: Some(None),
            email_verification_expires_at: Some(None),
            last_login_at: Some(Utc::now()),
            ..Default::default()
        };
        let user = self
            .repo
            .update(user.user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "Email verified");

        issue_session(&self.tokens, user)
    }

    /// Rotate and resend the verification token
    ///
    /// Uniform success response; only an existing, active, unverified
    /// account actually gets a new token.
    pub async fn resend(&self, email: String, client_ip: Option<IpAddr>) -> AuthResult<()> {
        self.check_rate_limit(client_ip).await?;

        let Ok(email) = Email::new(email) else {
            return Ok(());
        };

        let Some(user) = self.repo.find_by_email(&email).await? else {
            tracing::debug!("Verification resend requested for unknown email");
            return Ok(());
        };

        if user.email_verified || !user.is_active {
            tracing::debug!(user_id = %user.user_id, "Verification resend skipped");
            return Ok(());
        }

        let token = OpaqueToken::generate();
        let expires_at =
            Utc::now() + Duration::seconds(self.config.verification_token_ttl.as_secs() as i64);

        let patch = UserPatch {
            email_verification_token: Some(Some(token.digest.clone())),
            email_verification_expires_at: Some(Some(expires_at)),
            ..Default::default()
        };
        self.repo.update(user.user_id, &patch).await?;

        self.send_verification_email(&user, token.raw);

        tracing::info!(user_id = %user.user_id, "Verification email resent");

        Ok(())
    }

    /// Resend throttle, same fail-open policy as the other guards
    async fn check_rate_limit(&self, client_ip: Option<IpAddr>) -> AuthResult<()> {
        let key = format!("resend:{}", client_ip_label(client_ip));

        match self
            .limiter
            .check_and_increment(&key, &self.config.resend_limit)
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
    fn send_verification_email(&self, user: &User, token: String) {
        let link = format!(
            "{}/verify-email?token={}",
            self.config.frontend_base_url, token
        );
        let message = MailMessage {
            to: user.email.as_str().to_string(),
            to_name: user.user_name.original().to_string(),
            subject: "Verify your email address".to_string(),
            text_body: format!(
                "Here is the new verification link you requested.\n\n\
                 Please confirm your email address within 24 hours:\n\n\
                 {}\n\n\
                 If you did not request this, you can ignore this message.",
                link
            ),
        };

        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&message).await {
                tracing::warn!(error = %e, "Verification email dispatch failed");
            }
        });
    }
}
