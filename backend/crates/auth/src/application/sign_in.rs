//! Sign In Use Case
//!
//! First transition of the login state machine: credential check, then
//! either direct issuance or a pending-2FA handoff.

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
use crate::domain::value_object::{
    email::Email,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// PHC string verified when no stored hash is available, so an unknown
/// identifier or a password-less account costs the same as a wrong
/// password. Never matches a real submission.
const DUMMY_PASSWORD_PHC: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY";

/// Sign in input
pub struct SignInInput {
    /// Email or username
    pub identifier: String,
    /// Password
    pub password: String,
}

/// Sign in result
pub enum SignInOutcome {
    /// Credentials fully verified; session issued
    Authenticated(SessionBundle),
    /// Password accepted but a 2FA code must follow
    TwoFactorRequired { temp_token: String, user_id: i64 },
}

/// Sign in use case
pub struct SignInUseCase<R, L>
where
    R: UserRepository,
    L: RateLimitStore,
{
    repo: Arc<R>,
    limiter: Arc<L>,
    config: Arc<AuthConfig>,
    tokens: TokenIssuer,
}

impl<R, L> SignInUseCase<R, L>
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
        input: SignInInput,
        client_ip: Option<IpAddr>,
    ) -> AuthResult<SignInOutcome> {
        self.check_rate_limit(client_ip).await?;

        let identifier = input.identifier.trim();
        if identifier.is_empty() {
            return Err(AuthError::Validation(
                "Email or username is required".to_string(),
            ));
        }
        if input.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        // Policy checks apply only to newly chosen passwords; a login
        // attempt verifies whatever was submitted.
        let password = RawPassword::for_verification(input.password);

        // Resolve by email or username. A malformed identifier gets the
        // same response as an unknown one.
        let user = if identifier.contains('@') {
            match Email::new(identifier) {
                Ok(email) => self.repo.find_by_email(&email).await?,
                Err(_) => None,
            }
        } else {
            match UserName::new(identifier) {
                Ok(user_name) => self.repo.find_by_user_name(&user_name).await?,
                Err(_) => None,
            }
        };

        let Some(user) = user else {
            self.burn_password_check(&password);
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        if !user.email_verified {
            return Err(AuthError::EmailUnverified {
                email: user.email.as_str().to_string(),
            });
        }

        // Provisioned accounts may have no password yet; indistinguishable
        // from a wrong password.
        let Some(password_hash) = user.password_hash.as_ref() else {
            self.burn_password_check(&password);
            return Err(AuthError::InvalidCredentials);
        };

        if !password_hash.verify(&password, self.config.pepper()) {
            return Err(AuthError::InvalidCredentials);
        }

        if password_hash.needs_rehash(self.config.hashing_cost) {
            self.rehash(&user, &password).await;
        }

        if user.has_two_factor() {
            let temp_token = self
                .tokens
                .issue_pending_2fa(user.user_id.value(), user.email.as_str())?;

            tracing::info!(user_id = %user.user_id, "Password accepted, awaiting 2FA");

            return Ok(SignInOutcome::TwoFactorRequired {
                temp_token,
                user_id: user.user_id.value(),
            });
        }

        let user = self
            .repo
            .update(user.user_id, &UserPatch::record_login(Utc::now()))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "User signed in");

        issue_session(&self.tokens, user).map(SignInOutcome::Authenticated)
    }

    /// Per-IP attempt throttle. A failing limiter store logs and lets the
    /// request through; the counter is shared best-effort state.
    async fn check_rate_limit(&self, client_ip: Option<IpAddr>) -> AuthResult<()> {
        let key = format!("login:{}", client_ip_label(client_ip));

        match self
            .limiter
            .check_and_increment(&key, &self.config.login_limit)
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

    /// Burn one hash verification against the dummy hash
    fn burn_password_check(&self, password: &RawPassword) {
        if let Ok(hash) = UserPassword::from_phc_string(DUMMY_PASSWORD_PHC) {
            let _ = hash.verify(password, self.config.pepper());
        }
    }

    /// Upgrade the stored hash after a successful verification when the
    /// cost parameters changed. Failure only loses the upgrade.
    async fn rehash(&self, user: &User, password: &RawPassword) {
        let new_hash =
            match UserPassword::from_raw(password, self.config.pepper(), self.config.hashing_cost) {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::warn!(user_id = %user.user_id, error = %e, "Password rehash failed");
                    return;
                }
            };

        let patch = UserPatch {
            password_hash: Some(new_hash),
            ..Default::default()
        };

        if let Err(e) = self.repo.update(user.user_id, &patch).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "Password rehash update failed");
        }
    }
}
