//! Two-Factor Verification Use Case
//!
//! Second transition of the login state machine. Accepts a TOTP code or
//! a single-use backup code and finishes the sign-in started by the
//! password check.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use platform::client::client_ip_label;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::session::{SessionBundle, issue_session};
use crate::domain::entity::user::{User, UserPatch};
use crate::domain::repository::UserRepository;
use crate::domain::token::TokenIssuer;
use crate::domain::value_object::{backup_codes, user_id::UserId};
use crate::error::{AuthError, AuthResult};

/// Two-factor verification input
pub struct TwoFactorVerifyInput {
    /// User returned by the pending-2FA login response
    pub user_id: i64,
    /// Submitted TOTP or backup code
    pub code: String,
    /// Whether the code is a backup code
    pub is_backup_code: bool,
}

/// Two-factor verification use case
pub struct TwoFactorVerifyUseCase<R, L>
where
    R: UserRepository,
    L: RateLimitStore,
{
    repo: Arc<R>,
    limiter: Arc<L>,
    config: Arc<AuthConfig>,
    tokens: TokenIssuer,
}

impl<R, L> TwoFactorVerifyUseCase<R, L>
where
    R: UserRepository,
    L: RateLimitStore,
{
    pub fn new(repo: Arc<R>, limiter: Arc<L>, config: Arc<AuthConfig>) -> Self {
        let tokens = config.token_issuer();
        Self {
            repo,
            limiter,
            config,
            tokens,
        }
    }

    pub async fn execute(
        &self,
        input: TwoFactorVerifyInput,
        client_ip: Option<IpAddr>,
    ) -> AuthResult<SessionBundle> {
        self.check_rate_limit(client_ip).await?;

        let code = input.code.trim();
        if code.is_empty() {
            return Err(AuthError::Validation(
                "Verification code is required".to_string(),
            ));
        }

        let user = self
            .repo
            .find_by_id(UserId::from_i64(input.user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        if !user.has_two_factor() {
            return Err(AuthError::TwoFactorNotEnabled);
        }

        if input.is_backup_code {
            self.consume_backup_code(&user, code).await?;
        } else {
            let secret = user
                .two_factor_secret
                .as_ref()
                .ok_or(AuthError::TwoFactorNotEnabled)?;

            let valid = secret.verify(code, &self.config.totp_issuer, user.email.as_str())?;
            if !valid {
                return Err(AuthError::InvalidTwoFactorCode);
            }
        }

        let user = self
            .repo
            .update(user.user_id, &UserPatch::record_login(Utc::now()))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(
            user_id = %user.user_id,
            backup_code = input.is_backup_code,
            "Two-factor verification passed"
        );

        issue_session(&self.tokens, user)
    }

    /// Per-IP attempt throttle, same fail-open policy as login
    async fn check_rate_limit(&self, client_ip: Option<IpAddr>) -> AuthResult<()> {
        let key = format!("2fa:{}", client_ip_label(client_ip));

        match self
            .limiter
            .check_and_increment(&key, &self.config.two_factor_limit)
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

    /// Match and atomically remove one backup code
    ///
    /// The store removes the entry only while it is still present, so two
    /// requests racing on the same code cannot both succeed.
    async fn consume_backup_code(&self, user: &User, code: &str) -> AuthResult<()> {
        let matched = backup_codes::find_match(code, &user.two_factor_backup_codes)
            .ok_or(AuthError::InvalidTwoFactorCode)?;

        let removed = self.repo.remove_backup_code(user.user_id, &matched).await?;
        if !removed {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        Ok(())
    }
}
